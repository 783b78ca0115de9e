//! Actor execution loop

use crate::error::{BenchError, BenchResult, OperationError};
use crate::execution::ExecutionStrategy;
use crate::metrics::{MetricsSink, ITERATIONS};
use crate::orchestrator::PhaseNumber;
use crate::phase::{PhaseDescriptor, PhaseLoop};

use super::id::ActorId;
use super::rate_limiter::RateLimiter;
use super::stats::ActorStats;

use std::collections::HashMap;
use std::sync::Arc;

/// One worker of a workload, run on its own OS thread
///
/// `run` returns when the workload has no more phases or was aborted.
pub trait Actor: Send {
    /// Unique id, also the metrics key
    fn id(&self) -> ActorId;

    /// Name from the workload file
    fn name(&self) -> &str;

    /// Drive the actor through every phase
    fn run(&mut self) -> BenchResult<ActorStats>;
}

/// The unit of work an actor repeats each iteration
///
/// Closures `FnMut(PhaseNumber, u64) -> Result<(), OperationError>` are `Work`.
pub trait Work: Send {
    /// Called once when a phase in which this actor is active begins
    fn on_phase_start(&mut self, _phase: PhaseNumber, _descriptor: &PhaseDescriptor) -> Result<(), OperationError> {
        Ok(())
    }

    /// Execute one attempt of one iteration
    fn execute(&mut self, phase: PhaseNumber, iteration: u64) -> Result<(), OperationError>;
}

impl<F> Work for F
where
    F: FnMut(PhaseNumber, u64) -> Result<(), OperationError> + Send,
{
    fn execute(&mut self, phase: PhaseNumber, iteration: u64) -> Result<(), OperationError> {
        self(phase, iteration)
    }
}

/// Actor that runs a [`Work`] through a [`PhaseLoop`]
///
/// Per iteration: `rate_limiter.run(|| strategy.execute(work))`. A result the
/// phase's retry policy deems fatal aborts the whole workload.
///
/// Strategies are kept per operation name for the actor's lifetime, so
/// phases sharing an operation accumulate into the same gauges.
pub struct PhasedActor<W> {
    id: ActorId,
    name: String,
    operation: String,
    phase_loop: PhaseLoop,
    work: W,
    metrics: Arc<dyn MetricsSink>,
    strategies: HashMap<String, ExecutionStrategy>,
}

impl<W: Work> PhasedActor<W> {
    /// Create a new actor
    pub fn new(
        id: ActorId,
        name: impl Into<String>,
        operation: impl Into<String>,
        phase_loop: PhaseLoop,
        work: W,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            operation: operation.into(),
            phase_loop,
            work,
            metrics,
            strategies: HashMap::new(),
        }
    }

    /// The wrapped work
    pub fn work(&self) -> &W {
        &self.work
    }

    fn fail(&self, stats: &mut ActorStats, phase: PhaseNumber, message: String) -> BenchError {
        tracing::error!(
            actor_id = %self.id,
            actor = %self.name,
            phase,
            error = %message,
            "Actor failed, aborting workload"
        );
        self.phase_loop.orchestrator().abort();
        stats.stop();
        BenchError::ActorFailed {
            actor_id: self.id.get(),
            actor_name: self.name.clone(),
            phase,
            message,
        }
    }
}

impl<W: Work> Actor for PhasedActor<W> {
    fn id(&self) -> ActorId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn run(&mut self) -> BenchResult<ActorStats> {
        let mut stats = ActorStats::new();
        stats.start();

        tracing::debug!(actor_id = %self.id, actor = %self.name, "Actor started");

        while let Some(mut phase) = self.phase_loop.next_phase() {
            let number = phase.number();
            let descriptor = phase.descriptor();
            if descriptor.nop {
                continue;
            }

            if let Err(e) = self.work.on_phase_start(number, descriptor) {
                return Err(self.fail(&mut stats, number, e.to_string()));
            }

            let limiter = RateLimiter::new(descriptor.rate_limit);
            let operation = descriptor.operation.as_deref().unwrap_or(&self.operation);
            let id = self.id;
            let metrics = &self.metrics;
            let strategy = self
                .strategies
                .entry(operation.to_string())
                .or_insert_with(|| ExecutionStrategy::new(id, operation, Arc::clone(metrics)));
            let work = &mut self.work;

            tracing::debug!(
                actor_id = %self.id,
                phase = number,
                blocking = phase.is_blocking(),
                "Phase running"
            );

            while let Some(iteration) = phase.next() {
                let result = limiter.run(|| {
                    strategy.execute(&descriptor.execution, || work.execute(number, iteration))
                });
                stats.record(&result);
                self.metrics.increment_counter(self.id, ITERATIONS, 1);

                if result.is_fatal(&descriptor.execution) {
                    let message = result
                        .last_error
                        .map(|e| e.message)
                        .unwrap_or_else(|| "operation failed".to_string());
                    // Abort before `phase` drops so its end barrier cannot block.
                    return Err(self.fail(&mut stats, number, message));
                }
            }

            stats.active_phases += 1;
            tracing::debug!(
                actor_id = %self.id,
                phase = number,
                iterations = phase.iterations(),
                "Phase done"
            );
        }

        stats.stop();
        tracing::debug!(
            actor_id = %self.id,
            actor = %self.name,
            iterations = stats.iterations,
            failed = stats.failed,
            elapsed_ms = ?stats.elapsed().map(|d| d.as_millis()),
            "Actor finished"
        );

        Ok(stats)
    }
}

impl<W> std::fmt::Debug for PhasedActor<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhasedActor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("operation", &self.operation)
            .field("phase_loop", &self.phase_loop)
            .finish()
    }
}
