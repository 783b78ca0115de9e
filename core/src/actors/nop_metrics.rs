//! `NopMetrics`: an actor that only gets timed

use crate::actor::{Actor, Work};
use crate::error::{BenchResult, OperationError};
use crate::orchestrator::PhaseNumber;
use crate::workload::ActorContext;

/// Type name used in workload files
pub const NOP_METRICS: &str = "NopMetrics";

/// Does nothing each iteration; what remains is framework overhead
#[derive(Debug, Default, Clone, Copy)]
pub struct NopMetrics;

impl NopMetrics {
    /// Operation name timed by the metrics sink
    pub const OPERATION: &'static str = "Iterate";

    /// Build one instance
    pub fn produce(context: &ActorContext) -> BenchResult<Box<dyn Actor>> {
        context.actor(NopMetrics, Self::OPERATION)
    }
}

impl Work for NopMetrics {
    fn execute(&mut self, _phase: PhaseNumber, _iteration: u64) -> Result<(), OperationError> {
        Ok(())
    }
}
