//! Workload module: from a parsed workload file to a finished run
//!
//! [`WorkloadContext`] builds one actor per declared thread through the
//! [`Cast`](crate::Cast) and registers every orchestrator token up front.
//! [`WorkloadRunner`] then gives each actor its own OS thread and collects
//! the results:
//!
//! ```
//! use std::sync::Arc;
//! use phased_bench_core::{Cast, Registry, WorkloadConfig, WorkloadContext, WorkloadRunner};
//!
//! let config = WorkloadConfig::from_yaml_str(r#"
//! SchemaVersion: 2018-07-01
//! Actors:
//!   - Name: Greeter
//!     Type: HelloWorld
//!     Threads: 2
//!     Phases:
//!       - Repeat: 5
//! "#).unwrap();
//!
//! let registry = Arc::new(Registry::new());
//! let context = WorkloadContext::new(config, &Cast::with_builtin_actors(), registry.clone()).unwrap();
//! let outcome = WorkloadRunner::new(context).run().unwrap();
//!
//! assert!(outcome.is_success());
//! assert_eq!(outcome.summary.totals.total_iterations, 10);
//! ```

mod aggregator;
mod context;
mod runner;

pub use aggregator::{aggregate_actor_stats, ActorReport, AggregatedStats};
pub use context::{ActorContext, WorkloadContext, SETUP_TIMER};
pub use runner::{
    AbortCause, RunControl, RunOutcome, RunSummary, WorkloadRunner, ACTIVE_ACTORS_GAUGE, RUN_TIMER,
};
