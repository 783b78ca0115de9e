//! Builder pattern for actor construction

use crate::error::{BenchError, BenchResult};
use crate::metrics::{MetricsSink, NoopSink};
use crate::orchestrator::{Orchestrator, PhaseNumber};
use crate::phase::{PhaseDescriptor, PhaseLoop};

use super::executor::{PhasedActor, Work};
use super::id::ActorId;

use std::collections::BTreeMap;
use std::sync::Arc;

/// Builder for creating [`PhasedActor`] instances
///
/// # Example
/// ```
/// use std::collections::BTreeMap;
/// use std::sync::Arc;
/// use phased_bench_core::{
///     Actor, ActorBuilder, OperationError, Orchestrator, PhaseDescriptor, PhaseNumber,
/// };
///
/// let orchestrator = Arc::new(Orchestrator::new());
/// let work = |_phase: PhaseNumber, _iteration: u64| -> Result<(), OperationError> { Ok(()) };
/// let actor = ActorBuilder::new(work)
///     .name("Inserter")
///     .orchestrator(orchestrator)
///     .phases(BTreeMap::from([(0, PhaseDescriptor::iterations(10))]))
///     .build()
///     .unwrap();
/// assert_eq!(actor.name(), "Inserter");
/// ```
pub struct ActorBuilder<W> {
    work: W,
    id: Option<ActorId>,
    name: Option<String>,
    operation: Option<String>,
    orchestrator: Option<Arc<Orchestrator>>,
    phases: BTreeMap<PhaseNumber, PhaseDescriptor>,
    metrics: Option<Arc<dyn MetricsSink>>,
}

impl<W: Work> ActorBuilder<W> {
    /// Start building an actor around `work`
    pub fn new(work: W) -> Self {
        Self {
            work,
            id: None,
            name: None,
            operation: None,
            orchestrator: None,
            phases: BTreeMap::new(),
            metrics: None,
        }
    }

    /// Use a pre-allocated id (default: a fresh one)
    pub fn id(mut self, id: ActorId) -> Self {
        self.id = Some(id);
        self
    }

    /// Set the actor name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the default operation name for metrics (default: the actor name)
    pub fn operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Set the shared orchestrator
    pub fn orchestrator(mut self, orchestrator: Arc<Orchestrator>) -> Self {
        self.orchestrator = Some(orchestrator);
        self
    }

    /// Set the per-phase descriptors
    pub fn phases(mut self, phases: BTreeMap<PhaseNumber, PhaseDescriptor>) -> Self {
        self.phases = phases;
        self
    }

    /// Set the metrics sink (default: discard)
    pub fn metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the actor
    ///
    /// # Errors
    /// Returns an error if the name or orchestrator is missing.
    pub fn build(self) -> BenchResult<PhasedActor<W>> {
        let name = self.name.ok_or(BenchError::missing_config("name"))?;
        let orchestrator = self
            .orchestrator
            .ok_or(BenchError::missing_config("orchestrator"))?;

        let id = self.id.unwrap_or_else(ActorId::next);
        let operation = self.operation.unwrap_or_else(|| name.clone());
        let metrics = self
            .metrics
            .unwrap_or_else(|| Arc::new(NoopSink) as Arc<dyn MetricsSink>);
        let phase_loop = PhaseLoop::new(orchestrator, self.phases);

        Ok(PhasedActor::new(id, name, operation, phase_loop, self.work, metrics))
    }
}
