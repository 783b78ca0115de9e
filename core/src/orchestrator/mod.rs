//! Phase orchestration
//!
//! The [`Orchestrator`] is the only object shared by every actor thread of a
//! workload. It is a reusable double barrier:
//!
//! - every actor thread registers one token before the run starts
//! - `await_phase_start` releases all tokens together once the last one arrives
//! - the phase number advances when the last token leaves through the end barrier
//! - `abort` releases every waiter and makes `more_phases` return `false`
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use phased_bench_core::Orchestrator;
//!
//! let orchestrator = Arc::new(Orchestrator::new());
//! orchestrator.add_required_tokens(1).unwrap();
//! orchestrator.phases_at_least_to(1);
//!
//! let mut phases = Vec::new();
//! while orchestrator.more_phases() {
//!     phases.push(orchestrator.await_phase_start());
//!     orchestrator.await_phase_end();
//! }
//! assert_eq!(phases, vec![0, 1]);
//! ```

mod barrier;

pub use barrier::{Orchestrator, OrchestratorState, PhaseNumber};
