//! Per-actor iteration over phases

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::orchestrator::{Orchestrator, PhaseNumber};

use super::descriptor::PhaseDescriptor;

/// Drives one actor thread through the workload's phases
///
/// ```
/// use std::collections::BTreeMap;
/// use std::sync::Arc;
/// use phased_bench_core::{Orchestrator, PhaseDescriptor, PhaseLoop};
///
/// let orchestrator = Arc::new(Orchestrator::new());
/// orchestrator.add_required_tokens(1).unwrap();
///
/// let phases = BTreeMap::from([(0, PhaseDescriptor::iterations(3))]);
/// let phase_loop = PhaseLoop::new(orchestrator, phases);
///
/// let mut total = 0;
/// while let Some(phase) = phase_loop.next_phase() {
///     total += phase.count();
/// }
/// assert_eq!(total, 3);
/// ```
pub struct PhaseLoop {
    orchestrator: Arc<Orchestrator>,
    phases: BTreeMap<PhaseNumber, PhaseDescriptor>,
    nop: PhaseDescriptor,
}

impl PhaseLoop {
    /// Create a loop over `phases`; phases missing from the map are Nop
    pub fn new(orchestrator: Arc<Orchestrator>, phases: BTreeMap<PhaseNumber, PhaseDescriptor>) -> Self {
        Self {
            orchestrator,
            phases,
            nop: PhaseDescriptor::nop(),
        }
    }

    /// Wait for the next phase to start
    ///
    /// Returns `None` once there are no phases left or the workload aborted.
    /// The returned phase crosses the end barrier when finished or dropped.
    pub fn next_phase(&self) -> Option<ActivePhase<'_>> {
        if !self.orchestrator.more_phases() {
            return None;
        }
        let number = self.orchestrator.await_phase_start();
        if self.orchestrator.is_aborted() {
            return None;
        }
        let descriptor = self.phases.get(&number).unwrap_or(&self.nop);
        Some(ActivePhase::begin(&self.orchestrator, number, descriptor))
    }

    /// Descriptor configured for `phase`, if any
    pub fn descriptor(&self, phase: PhaseNumber) -> Option<&PhaseDescriptor> {
        self.phases.get(&phase)
    }

    /// The shared orchestrator
    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }
}

impl std::fmt::Debug for PhaseLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseLoop")
            .field("phases", &self.phases.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// One running phase: an iterator over iteration indices
///
/// Non-blocking phases leave the end barrier as soon as they begin and keep
/// yielding until the phase changes (or their own bound is met).
pub struct ActivePhase<'a> {
    orchestrator: &'a Orchestrator,
    number: PhaseNumber,
    descriptor: &'a PhaseDescriptor,
    started_at: Instant,
    yielded: u64,
    ended: bool,
}

impl<'a> ActivePhase<'a> {
    fn begin(orchestrator: &'a Orchestrator, number: PhaseNumber, descriptor: &'a PhaseDescriptor) -> Self {
        if descriptor.nop {
            tracing::trace!(phase = number, "Nop phase");
        } else if !descriptor.blocking {
            orchestrator.arrive_phase_end();
        }
        Self {
            orchestrator,
            number,
            descriptor,
            started_at: Instant::now(),
            yielded: 0,
            ended: false,
        }
    }

    /// Phase number
    pub fn number(&self) -> PhaseNumber {
        self.number
    }

    /// Settings for this phase
    pub fn descriptor(&self) -> &'a PhaseDescriptor {
        self.descriptor
    }

    /// Whether this actor holds up the end barrier
    pub fn is_blocking(&self) -> bool {
        self.descriptor.blocking || self.descriptor.nop
    }

    /// Iterations handed out so far
    pub fn iterations(&self) -> u64 {
        self.yielded
    }

    /// Time since the phase started for this actor
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Cross the end barrier. Returns whether more phases follow.
    pub fn finish(mut self) -> bool {
        self.end()
    }

    fn end(&mut self) -> bool {
        if !self.ended {
            self.ended = true;
            if self.is_blocking() {
                self.orchestrator.await_phase_end();
            } else {
                self.orchestrator.await_phase_change(self.number);
            }
        }
        self.orchestrator.more_phases()
    }

    fn keep_going(&self) -> bool {
        if self.descriptor.nop || self.orchestrator.is_aborted() {
            return false;
        }
        if self.descriptor.blocking {
            return self.bound_unmet();
        }
        if self.orchestrator.current_phase() != self.number {
            return false;
        }
        !self.descriptor.is_bounded() || self.bound_unmet()
    }

    /// True while either configured bound still needs more work
    fn bound_unmet(&self) -> bool {
        let need_iterations = self
            .descriptor
            .iterations
            .is_some_and(|n| self.yielded < n);
        let need_time = self
            .descriptor
            .duration
            .is_some_and(|d| self.yielded == 0 || self.started_at.elapsed() < d);
        need_iterations || need_time
    }
}

impl Iterator for ActivePhase<'_> {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        if self.ended || !self.keep_going() {
            return None;
        }
        let iteration = self.yielded;
        self.yielded += 1;
        Some(iteration)
    }
}

impl Drop for ActivePhase<'_> {
    fn drop(&mut self) {
        // A panicking actor will never come back for the next phase.
        if std::thread::panicking() {
            self.ended = true;
            self.orchestrator.abort();
            return;
        }
        self.end();
    }
}

impl std::fmt::Debug for ActivePhase<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivePhase")
            .field("number", &self.number)
            .field("blocking", &self.is_blocking())
            .field("iterations", &self.yielded)
            .finish()
    }
}
