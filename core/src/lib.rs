//! phased-bench-core: lock-step, phased workload execution
//!
//! This crate provides the building blocks of a phased load generator:
//!
//! - The [`Orchestrator`], a reusable start/end barrier shared by all actors
//! - [`PhaseLoop`], which turns the barrier into per-phase iteration
//! - Per-actor rate limiting and retrying execution with metrics
//! - Workload files, the actor [`Cast`] and the threaded [`WorkloadRunner`]
//! - Error handling

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod actor;
pub mod actors;
pub mod cast;
pub mod config;
pub mod error;
pub mod execution;
pub mod metrics;
pub mod orchestrator;
pub mod phase;
pub mod workload;

pub use actor::{Actor, ActorBuilder, ActorId, ActorStats, PhasedActor, RateLimitOptions, RateLimiter, Work};
pub use cast::{ActorProducer, Cast};
pub use config::{ActorConfig, ConfigError, PhaseConfig, RateLimitConfig, WorkloadConfig};
pub use error::*;
pub use execution::{ErrorInfo, ExecutionOptions, ExecutionResult, ExecutionStrategy};
pub use metrics::*;
pub use orchestrator::{Orchestrator, OrchestratorState, PhaseNumber};
pub use phase::{ActivePhase, PhaseDescriptor, PhaseLoop};
pub use workload::{
    AbortCause, ActorContext, ActorReport, AggregatedStats, RunControl, RunOutcome, RunSummary,
    WorkloadContext, WorkloadRunner,
};
