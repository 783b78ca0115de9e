//! Result aggregation from multiple actors

use std::time::Duration;

use crate::actor::{ActorId, ActorStats};

/// What one actor thread reported when it finished
#[derive(Debug, Clone)]
pub struct ActorReport {
    /// Actor id
    pub actor_id: ActorId,
    /// Actor name
    pub actor_name: String,
    /// Statistics, empty if the actor failed before reporting any
    pub stats: ActorStats,
    /// Error or panic message, if the actor failed
    pub error: Option<String>,
}

impl ActorReport {
    /// Whether the actor ended without error
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregated statistics from all actors
#[derive(Debug, Clone, Default)]
pub struct AggregatedStats {
    /// Number of actors that reported
    pub total_actors: usize,

    /// Total iterations executed
    pub total_iterations: u64,

    /// Iterations that failed after all retries
    pub total_failed: u64,

    /// Total attempts, retries included
    pub total_attempts: u64,

    /// Maximum duration across all actors
    pub total_duration: Duration,

    /// Overall iterations per second
    pub iterations_per_second: f64,
}

impl AggregatedStats {
    /// Iterations that succeeded
    pub fn total_succeeded(&self) -> u64 {
        self.total_iterations - self.total_failed
    }

    /// Get the success rate (0.0 - 1.0)
    pub fn success_rate(&self) -> f64 {
        if self.total_iterations > 0 {
            self.total_succeeded() as f64 / self.total_iterations as f64
        } else {
            0.0
        }
    }

    /// Get the error rate (0.0 - 1.0)
    pub fn error_rate(&self) -> f64 {
        if self.total_iterations > 0 {
            1.0 - self.success_rate()
        } else {
            0.0
        }
    }
}

/// Aggregate statistics from multiple actors
pub fn aggregate_actor_stats<'a>(stats: impl IntoIterator<Item = &'a ActorStats>) -> AggregatedStats {
    let mut total = ActorStats::default();
    let mut total_actors = 0;
    let mut total_duration = Duration::ZERO;

    for s in stats {
        total.merge(s);
        total_actors += 1;
        // Use the maximum elapsed time across all actors
        if let Some(elapsed) = s.elapsed() {
            total_duration = total_duration.max(elapsed);
        }
    }

    let secs = total_duration.as_secs_f64();
    let iterations_per_second = if secs > 0.0 {
        total.iterations as f64 / secs
    } else {
        0.0
    };

    AggregatedStats {
        total_actors,
        total_iterations: total.iterations,
        total_failed: total.failed,
        total_attempts: total.attempts,
        total_duration,
        iterations_per_second,
    }
}
