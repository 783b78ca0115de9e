//! Process-wide actor identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

// 0 belongs to the workload itself.
static NEXT_ACTOR_ID: AtomicU64 = AtomicU64::new(1);

/// Unique, never reused id of one actor instance.
///
/// Used as the correlation key for everything the actor reports to the
/// metrics sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(u64);

impl ActorId {
    /// Id reserved for workload-level metrics
    pub const WORKLOAD: ActorId = ActorId(0);

    /// Allocate a fresh id
    pub fn next() -> Self {
        Self(NEXT_ACTOR_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id value
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<ActorId> for u64 {
    fn from(id: ActorId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::{Arc, Barrier};
    use std::thread;

    #[test]
    fn test_ids_are_never_workload() {
        for _ in 0..100 {
            assert_ne!(ActorId::next(), ActorId::WORKLOAD);
        }
    }

    #[test]
    fn test_ids_increase() {
        let a = ActorId::next();
        let b = ActorId::next();
        assert!(b > a);
    }

    #[test]
    fn test_concurrent_ids_are_unique() {
        const THREADS: usize = 1000;
        let gate = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let gate = Arc::clone(&gate);
                thread::spawn(move || {
                    gate.wait();
                    ActorId::next()
                })
            })
            .collect();

        let ids: HashSet<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(ids.len(), THREADS);
    }

    #[test]
    fn test_display() {
        assert_eq!(ActorId::WORKLOAD.to_string(), "0");
        assert_eq!(ActorId::WORKLOAD.get(), 0);
    }
}
