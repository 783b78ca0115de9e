//! Tests for the Actor module

use super::*;
use crate::error::{BenchError, OperationError};
use crate::execution::ExecutionOptions;
use crate::metrics::{MetricsSink, Registry, ITERATIONS};
use crate::orchestrator::{Orchestrator, PhaseNumber};
use crate::phase::PhaseDescriptor;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

// ============================================================================
// Mock Work
// ============================================================================

/// Fails the first `failures_per_iteration` attempts of every iteration
struct FlakyWork {
    failures_per_iteration: u32,
    failures_left: u32,
    fatal: bool,
    phases_started: Vec<PhaseNumber>,
    executed: Vec<(PhaseNumber, u64)>,
}

impl FlakyWork {
    fn reliable() -> Self {
        Self::failing(0)
    }

    fn failing(failures_per_iteration: u32) -> Self {
        Self {
            failures_per_iteration,
            failures_left: failures_per_iteration,
            fatal: false,
            phases_started: Vec::new(),
            executed: Vec::new(),
        }
    }

    fn fatal() -> Self {
        Self {
            fatal: true,
            ..Self::failing(u32::MAX)
        }
    }
}

impl Work for FlakyWork {
    fn on_phase_start(&mut self, phase: PhaseNumber, _descriptor: &PhaseDescriptor) -> Result<(), OperationError> {
        self.phases_started.push(phase);
        Ok(())
    }

    fn execute(&mut self, phase: PhaseNumber, iteration: u64) -> Result<(), OperationError> {
        if self.failures_left > 0 {
            self.failures_left -= 1;
            return Err(if self.fatal {
                OperationError::fatal("constraint violated")
            } else {
                OperationError::transient("write conflict")
            });
        }
        self.failures_left = self.failures_per_iteration;
        self.executed.push((phase, iteration));
        Ok(())
    }
}

// ============================================================================
// Helper functions
// ============================================================================

fn orchestrator(tokens: usize, max_phase: PhaseNumber) -> Arc<Orchestrator> {
    let orchestrator = Arc::new(Orchestrator::new());
    orchestrator.add_required_tokens(tokens).unwrap();
    orchestrator.phases_at_least_to(max_phase);
    orchestrator
}

fn build<W: Work>(
    work: W,
    orchestrator: Arc<Orchestrator>,
    phases: BTreeMap<PhaseNumber, PhaseDescriptor>,
    registry: &Arc<Registry>,
) -> PhasedActor<W> {
    let sink: Arc<dyn MetricsSink> = registry.clone();
    ActorBuilder::new(work)
        .name("Tester")
        .operation("Op")
        .orchestrator(orchestrator)
        .phases(phases)
        .metrics(sink)
        .build()
        .unwrap()
}

// ============================================================================
// Integration Tests
// ============================================================================

#[test]
fn test_actor_runs_all_phases() {
    let registry = Arc::new(Registry::new());
    let phases = BTreeMap::from([
        (0, PhaseDescriptor::iterations(3)),
        (1, PhaseDescriptor::nop()),
        (2, PhaseDescriptor::iterations(2)),
    ]);
    let mut actor = build(FlakyWork::reliable(), orchestrator(1, 2), phases, &registry);

    let stats = actor.run().unwrap();

    assert_eq!(stats.iterations, 5);
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.active_phases, 2);
    assert_eq!(actor.work().phases_started, vec![0, 2]);
    assert_eq!(
        actor.work().executed,
        vec![(0, 0), (0, 1), (0, 2), (2, 0), (2, 1)]
    );
    assert_eq!(registry.counter(actor.id(), ITERATIONS), 5);
    assert_eq!(registry.timer_count(actor.id(), "Op"), 5);
}

#[test]
fn test_actor_uses_phase_operation_name() {
    let registry = Arc::new(Registry::new());
    let phases = BTreeMap::from([(0, PhaseDescriptor::iterations(2).with_operation("Insert"))]);
    let mut actor = build(FlakyWork::reliable(), orchestrator(1, 0), phases, &registry);

    actor.run().unwrap();

    assert_eq!(registry.timer_count(actor.id(), "Insert"), 2);
    assert_eq!(registry.timer_count(actor.id(), "Op"), 0);
}

#[test]
fn test_operation_gauges_span_phases() {
    let registry = Arc::new(Registry::new());
    let phases = BTreeMap::from([
        (0, PhaseDescriptor::iterations(7).with_execution(ExecutionOptions::retries(0))),
        (1, PhaseDescriptor::iterations(3).with_execution(ExecutionOptions::retries(0))),
        (2, PhaseDescriptor::iterations(2).with_operation("Insert")),
    ]);
    let mut actor = build(FlakyWork::failing(1), orchestrator(1, 2), phases, &registry);

    let stats = actor.run().unwrap();

    // Every other iteration fails without retries: 7 + 3 iterations as "Op".
    assert_eq!(stats.iterations, 12);
    assert_eq!(registry.gauge(actor.id(), "Op.Ops"), Some(10.0));
    assert_eq!(registry.gauge(actor.id(), "Op.Failures"), Some(5.0));
    assert_eq!(registry.counter(actor.id(), "Op.Errors"), 5);
    assert_eq!(registry.timer_count(actor.id(), "Op"), 10);
    assert_eq!(registry.gauge(actor.id(), "Insert.Ops"), Some(2.0));
}

#[test]
fn test_actor_with_rate_limit() {
    let registry = Arc::new(Registry::new());
    let phases = BTreeMap::from([(
        0,
        PhaseDescriptor::iterations(5)
            .with_rate_limit(RateLimitOptions::min_period(Duration::from_millis(20))),
    )]);
    let mut actor = build(FlakyWork::reliable(), orchestrator(1, 0), phases, &registry);

    let start = Instant::now();
    let stats = actor.run().unwrap();

    assert_eq!(stats.iterations, 5);
    assert!(start.elapsed() >= Duration::from_millis(80));
}

#[test]
fn test_actor_retries_transient_failures() {
    let registry = Arc::new(Registry::new());
    let phases = BTreeMap::from([(
        0,
        PhaseDescriptor::iterations(3).with_execution(ExecutionOptions::retries(3)),
    )]);
    let mut actor = build(FlakyWork::failing(2), orchestrator(1, 0), phases, &registry);

    let stats = actor.run().unwrap();

    assert_eq!(stats.iterations, 3);
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.attempts, 9);
    assert_eq!(stats.retries(), 6);
    assert_eq!(registry.timer_count(actor.id(), "Op"), 9);
}

#[test]
fn test_actor_tolerates_exhaustion_without_throw() {
    let registry = Arc::new(Registry::new());
    let phases = BTreeMap::from([(
        0,
        PhaseDescriptor::iterations(2).with_execution(ExecutionOptions::retries(1)),
    )]);
    let orchestrator = orchestrator(1, 0);
    let mut actor = build(FlakyWork::failing(5), Arc::clone(&orchestrator), phases, &registry);

    let stats = actor.run().unwrap();

    assert_eq!(stats.iterations, 2);
    assert_eq!(stats.failed, 2);
    assert_eq!(registry.counter(actor.id(), "Op.Errors"), 2);
    assert!(!orchestrator.is_aborted());
}

#[test]
fn test_actor_throw_on_failure_aborts() {
    let registry = Arc::new(Registry::new());
    let phases = BTreeMap::from([(
        0,
        PhaseDescriptor::iterations(10).with_execution(
            ExecutionOptions::retries(1).with_throw_on_failure(true),
        ),
    )]);
    let orchestrator = orchestrator(1, 0);
    let mut actor = build(FlakyWork::failing(5), Arc::clone(&orchestrator), phases, &registry);

    let err = actor.run().unwrap_err();

    match err {
        BenchError::ActorFailed {
            actor_name,
            phase,
            message,
            ..
        } => {
            assert_eq!(actor_name, "Tester");
            assert_eq!(phase, 0);
            assert_eq!(message, "write conflict");
        }
        other => panic!("Expected ActorFailed, got {other:?}"),
    }
    assert!(orchestrator.is_aborted());
    assert!(!orchestrator.more_phases());
}

#[test]
fn test_fatal_error_releases_other_actors() {
    let registry = Arc::new(Registry::new());
    let orchestrator = orchestrator(2, 1);

    // This one would keep iterating for a minute if nobody aborted.
    let survivor = {
        let orchestrator = Arc::clone(&orchestrator);
        let registry = Arc::clone(&registry);
        thread::spawn(move || {
            let phases = BTreeMap::from([
                (0, PhaseDescriptor::duration(Duration::from_secs(60))),
                (1, PhaseDescriptor::iterations(1)),
            ]);
            let work = |_: PhaseNumber, _: u64| -> Result<(), OperationError> {
                thread::sleep(Duration::from_millis(1));
                Ok(())
            };
            let mut actor = build(work, orchestrator, phases, &registry);
            actor.run()
        })
    };

    let phases = BTreeMap::from([(0, PhaseDescriptor::iterations(5))]);
    let mut failing = build(FlakyWork::fatal(), Arc::clone(&orchestrator), phases, &registry);

    let start = Instant::now();
    assert!(failing.run().is_err());

    // Aborted actors end cleanly; only the failing one reports an error.
    assert!(survivor.join().unwrap().is_ok());
    assert!(start.elapsed() < Duration::from_secs(10));
    assert!(orchestrator.is_aborted());
}
