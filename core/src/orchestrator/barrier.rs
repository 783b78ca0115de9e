//! Reusable start/end barrier shared by every actor of a workload

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::{Condvar, Mutex};

use crate::error::{BenchError, BenchResult};

/// Identifies a workload phase. Phases are numbered from 0.
pub type PhaseNumber = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    /// Between phases: actors gather at the start barrier
    Ended,
    /// Inside a phase: actors work and gather at the end barrier
    Started,
}

#[derive(Debug)]
struct BarrierState {
    current_phase: PhaseNumber,
    required_tokens: usize,
    arrived_tokens: usize,
    stage: Stage,
    /// Bumped on every stage transition; waiters sleep until it moves.
    generation: u64,
    /// Set by the first start arrival; token registration is closed afterwards.
    started: bool,
}

/// Point-in-time view of the orchestrator, for logging and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorState {
    /// Phase currently running (or about to start)
    pub current_phase: PhaseNumber,
    /// Tokens needed to cross a barrier
    pub required_tokens: usize,
    /// Tokens inside the current phase
    pub arrived_tokens: usize,
    /// Whether `abort()` has been called
    pub aborted: bool,
}

/// Keeps all actors of a workload in lock-step across phases.
///
/// Every actor thread owns one token. A phase starts once every required
/// token has called [`await_phase_start`](Self::await_phase_start) and ends
/// once every token has arrived at the end barrier; only then does the phase
/// number advance. [`abort`](Self::abort) releases every waiter, current and
/// future.
pub struct Orchestrator {
    state: Mutex<BarrierState>,
    phase_change: Condvar,

    // Lock-free mirrors for hot-path reads. Only written while `state` is held.
    current_phase: AtomicU32,
    max_phase: AtomicU32,
    aborted: AtomicBool,
}

impl Orchestrator {
    /// Create an orchestrator that runs phase 0 only until told otherwise
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BarrierState {
                current_phase: 0,
                required_tokens: 0,
                arrived_tokens: 0,
                stage: Stage::Ended,
                generation: 0,
                started: false,
            }),
            phase_change: Condvar::new(),
            current_phase: AtomicU32::new(0),
            max_phase: AtomicU32::new(0),
            aborted: AtomicBool::new(false),
        }
    }

    /// Register `tokens` more participants.
    ///
    /// # Errors
    /// Registration closes when the first actor reaches the start barrier.
    pub fn add_required_tokens(&self, tokens: usize) -> BenchResult<()> {
        let mut state = self.state.lock();
        if state.started {
            return Err(BenchError::orchestration(format!(
                "cannot add {tokens} required tokens after the workload started"
            )));
        }
        state.required_tokens += tokens;
        Ok(())
    }

    /// Make sure the workload runs at least up to and including `phase`
    pub fn phases_at_least_to(&self, phase: PhaseNumber) {
        let _state = self.state.lock();
        self.max_phase.fetch_max(phase, Ordering::AcqRel);
    }

    /// Whether there are phases left to run and nobody aborted
    pub fn more_phases(&self) -> bool {
        !self.is_aborted() && self.current_phase() <= self.max_phase()
    }

    /// The current phase. May be stale by the time the caller looks at it.
    pub fn current_phase(&self) -> PhaseNumber {
        self.current_phase.load(Ordering::Acquire)
    }

    /// The last phase the workload will run
    pub fn max_phase(&self) -> PhaseNumber {
        self.max_phase.load(Ordering::Acquire)
    }

    /// Whether `abort()` has been called
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    /// Consistent snapshot of the barrier counters
    pub fn state(&self) -> OrchestratorState {
        let state = self.state.lock();
        OrchestratorState {
            current_phase: state.current_phase,
            required_tokens: state.required_tokens,
            arrived_tokens: state.arrived_tokens,
            aborted: self.is_aborted(),
        }
    }

    /// Arrive at the start barrier and wait for every other token.
    ///
    /// Returns the phase that just started. Returns immediately once the
    /// workload is aborted.
    ///
    /// # Panics
    /// If more tokens arrive than were registered.
    pub fn await_phase_start(&self) -> PhaseNumber {
        let mut state = self.state.lock();
        state.started = true;
        if self.is_aborted() {
            return state.current_phase;
        }

        assert_eq!(
            state.stage,
            Stage::Ended,
            "start barrier entered while phase {} is still running",
            state.current_phase
        );
        assert!(
            state.arrived_tokens < state.required_tokens,
            "more arrivals at the start of phase {} than the {} required tokens",
            state.current_phase,
            state.required_tokens
        );

        state.arrived_tokens += 1;
        let phase = state.current_phase;

        if state.arrived_tokens == state.required_tokens {
            state.stage = Stage::Started;
            state.generation += 1;
            tracing::debug!(phase, tokens = state.required_tokens, "Phase started");
            self.phase_change.notify_all();
        } else {
            let generation = state.generation;
            while state.generation == generation && !self.is_aborted() {
                self.phase_change.wait(&mut state);
            }
        }

        phase
    }

    /// Arrive at the end barrier and wait for every other token.
    ///
    /// Returns whether there are more phases to run.
    pub fn await_phase_end(&self) -> bool {
        self.end_phase(true);
        self.more_phases()
    }

    /// Arrive at the end barrier without waiting.
    ///
    /// Used by actors whose current phase is non-blocking: they no longer
    /// hold the phase open but keep working until it changes.
    pub fn arrive_phase_end(&self) {
        self.end_phase(false);
    }

    /// Block until the current phase is no longer `phase`
    pub fn await_phase_change(&self, phase: PhaseNumber) {
        let mut state = self.state.lock();
        while state.current_phase == phase && !self.is_aborted() {
            self.phase_change.wait(&mut state);
        }
    }

    /// Stop the workload. Idempotent; wakes every thread blocked in a barrier.
    pub fn abort(&self) {
        if self.aborted.swap(true, Ordering::AcqRel) {
            return;
        }
        // Taking the lock orders the latch against waiters that already
        // checked it but have not started waiting yet.
        let phase = self.state.lock().current_phase;
        self.phase_change.notify_all();
        tracing::warn!(phase, "Workload aborted");
    }

    fn end_phase(&self, block: bool) {
        let mut state = self.state.lock();
        if self.is_aborted() {
            return;
        }

        assert_eq!(
            state.stage,
            Stage::Started,
            "end barrier entered before phase {} started",
            state.current_phase
        );
        assert!(
            state.arrived_tokens > 0,
            "more arrivals at the end of phase {} than tokens that started it",
            state.current_phase
        );

        state.arrived_tokens -= 1;

        if state.arrived_tokens == 0 {
            let ended = state.current_phase;
            state.current_phase += 1;
            self.current_phase
                .store(state.current_phase, Ordering::Release);
            state.stage = Stage::Ended;
            state.generation += 1;
            tracing::debug!(phase = ended, "Phase ended");
            self.phase_change.notify_all();
        } else if block {
            let generation = state.generation;
            while state.generation == generation && !self.is_aborted() {
                self.phase_change.wait(&mut state);
            }
        }
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("Orchestrator")
            .field("current_phase", &state.current_phase)
            .field("max_phase", &self.max_phase())
            .field("required_tokens", &state.required_tokens)
            .field("arrived_tokens", &state.arrived_tokens)
            .field("aborted", &state.aborted)
            .finish()
    }
}
