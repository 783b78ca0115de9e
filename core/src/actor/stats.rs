//! Actor statistics tracking

use std::time::{Duration, Instant};

use crate::execution::ExecutionResult;

/// Statistics tracked by each actor
#[derive(Debug, Default, Clone)]
pub struct ActorStats {
    /// Iterations executed, successful or not
    pub iterations: u64,

    /// Iterations whose operation failed after all retries
    pub failed: u64,

    /// Attempts made across all iterations
    pub attempts: u64,

    /// Phases in which the actor did work
    pub active_phases: u32,

    /// Actor start time
    pub started_at: Option<Instant>,

    /// Actor end time
    pub ended_at: Option<Instant>,
}

impl ActorStats {
    /// Create new empty stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking (records start time)
    pub fn start(&mut self) {
        self.started_at = Some(Instant::now());
    }

    /// Stop tracking (records end time)
    pub fn stop(&mut self) {
        self.ended_at = Some(Instant::now());
    }

    /// Record the outcome of one iteration
    pub fn record(&mut self, result: &ExecutionResult) {
        self.iterations += 1;
        self.attempts += u64::from(result.attempts);
        if !result.succeeded {
            self.failed += 1;
        }
    }

    /// Iterations that succeeded
    pub fn succeeded(&self) -> u64 {
        self.iterations - self.failed
    }

    /// Attempts beyond the first of each iteration
    pub fn retries(&self) -> u64 {
        self.attempts.saturating_sub(self.iterations)
    }

    /// Get success rate as a fraction (0.0 - 1.0)
    pub fn success_rate(&self) -> f64 {
        if self.iterations == 0 {
            0.0
        } else {
            self.succeeded() as f64 / self.iterations as f64
        }
    }

    /// Get elapsed time since start
    pub fn elapsed(&self) -> Option<Duration> {
        self.started_at.map(|start| {
            self.ended_at
                .map(|end| end.duration_since(start))
                .unwrap_or_else(|| start.elapsed())
        })
    }

    /// Get iterations per second
    pub fn iterations_per_second(&self) -> f64 {
        self.elapsed()
            .map(|d| {
                let secs = d.as_secs_f64();
                if secs > 0.0 {
                    self.iterations as f64 / secs
                } else {
                    0.0
                }
            })
            .unwrap_or(0.0)
    }

    /// Merge stats from another actor
    pub fn merge(&mut self, other: &ActorStats) {
        self.iterations += other.iterations;
        self.failed += other.failed;
        self.attempts += other.attempts;
        self.active_phases = self.active_phases.max(other.active_phases);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::ErrorInfo;

    fn outcome(attempts: u32, succeeded: bool) -> ExecutionResult {
        ExecutionResult {
            attempts,
            succeeded,
            last_error: (!succeeded).then(|| ErrorInfo {
                message: "boom".into(),
                retryable: true,
            }),
        }
    }

    #[test]
    fn test_actor_stats_defaults() {
        let stats = ActorStats::default();
        assert_eq!(stats.iterations, 0);
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.attempts, 0);
        assert!(stats.started_at.is_none());
        assert!(stats.ended_at.is_none());
        assert_eq!(stats.success_rate(), 0.0);
    }

    #[test]
    fn test_actor_stats_record() {
        let mut stats = ActorStats::new();
        stats.record(&outcome(1, true));
        stats.record(&outcome(3, true));
        stats.record(&outcome(4, false));

        assert_eq!(stats.iterations, 3);
        assert_eq!(stats.succeeded(), 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.attempts, 8);
        assert_eq!(stats.retries(), 5);
        assert!((stats.success_rate() - 2.0 / 3.0).abs() < 0.001);
    }

    #[test]
    fn test_actor_stats_merge() {
        let mut stats1 = ActorStats::new();
        stats1.record(&outcome(1, true));
        stats1.active_phases = 2;

        let mut stats2 = ActorStats::new();
        stats2.record(&outcome(2, false));
        stats2.active_phases = 3;

        stats1.merge(&stats2);

        assert_eq!(stats1.iterations, 2);
        assert_eq!(stats1.failed, 1);
        assert_eq!(stats1.attempts, 3);
        assert_eq!(stats1.active_phases, 3);
    }

    #[test]
    fn test_actor_stats_start_stop() {
        let mut stats = ActorStats::new();
        assert!(stats.elapsed().is_none());

        stats.start();
        assert!(stats.started_at.is_some());
        assert!(stats.elapsed().is_some());

        std::thread::sleep(Duration::from_millis(10));
        stats.stop();

        let elapsed = stats.elapsed().unwrap();
        assert!(elapsed >= Duration::from_millis(10));
    }
}
