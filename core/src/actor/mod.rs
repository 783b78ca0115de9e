//! Actor module for running workload units
//!
//! An Actor is one thread of load. It owns a [`PhaseLoop`](crate::PhaseLoop)
//! and, for every iteration the loop hands out, runs its [`Work`] through a
//! per-phase [`RateLimiter`] and an
//! [`ExecutionStrategy`](crate::ExecutionStrategy):
//!
//! 1. Wait at the start barrier for the next phase
//! 2. Throttle, then execute the work with retries and timing
//! 3. Report to the metrics sink
//! 4. Repeat until the phase's bound is met
//! 5. Wait at the end barrier (or, for non-blocking phases, for the phase to change)
//!
//! A fatal failure aborts the orchestrator so every other actor unblocks.
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeMap;
//! use std::sync::Arc;
//! use phased_bench_core::{
//!     Actor, ActorBuilder, OperationError, Orchestrator, PhaseDescriptor, PhaseNumber,
//! };
//!
//! let orchestrator = Arc::new(Orchestrator::new());
//! orchestrator.add_required_tokens(1).unwrap();
//!
//! let mut actor = ActorBuilder::new(|_: PhaseNumber, _: u64| -> Result<(), OperationError> { Ok(()) })
//!     .name("Counter")
//!     .orchestrator(orchestrator)
//!     .phases(BTreeMap::from([(0, PhaseDescriptor::iterations(100))]))
//!     .build()
//!     .unwrap();
//!
//! let stats = actor.run().unwrap();
//! assert_eq!(stats.iterations, 100);
//! ```

mod builder;
mod executor;
mod id;
mod rate_limiter;
mod stats;

pub use builder::ActorBuilder;
pub use executor::{Actor, PhasedActor, Work};
pub use id::ActorId;
pub use rate_limiter::{RateLimitOptions, RateLimiter};
pub use stats::ActorStats;

#[cfg(test)]
mod tests;
