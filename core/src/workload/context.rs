//! Workload construction: configuration to actors

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use crate::actor::{Actor, ActorBuilder, ActorId, Work};
use crate::cast::Cast;
use crate::config::{ActorConfig, WorkloadConfig};
use crate::error::{BenchError, BenchResult};
use crate::metrics::MetricsSink;
use crate::orchestrator::{Orchestrator, PhaseNumber};
use crate::phase::PhaseDescriptor;

/// Timer recording how long workload construction took
pub const SETUP_TIMER: &str = "Workload.Setup";

/// Everything a producer needs to build one actor instance
pub struct ActorContext {
    name: String,
    actor_type: String,
    threads: usize,
    thread_index: usize,
    phases: BTreeMap<PhaseNumber, PhaseDescriptor>,
    orchestrator: Arc<Orchestrator>,
    metrics: Arc<dyn MetricsSink>,
}

impl ActorContext {
    /// Context for thread `thread_index` of the actor declared by `config`
    pub fn new(
        config: &ActorConfig,
        thread_index: usize,
        phases: BTreeMap<PhaseNumber, PhaseDescriptor>,
        orchestrator: Arc<Orchestrator>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            name: config.name.clone(),
            actor_type: config.actor_type.clone(),
            threads: config.threads,
            thread_index,
            phases,
            orchestrator,
            metrics,
        }
    }

    /// Actor name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registered type name
    pub fn actor_type(&self) -> &str {
        &self.actor_type
    }

    /// Instances declared for this actor
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Which of those instances is being built, from 0
    pub fn thread_index(&self) -> usize {
        self.thread_index
    }

    /// Per-phase settings
    pub fn phases(&self) -> &BTreeMap<PhaseNumber, PhaseDescriptor> {
        &self.phases
    }

    /// Shared orchestrator
    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    /// Metrics sink
    pub fn metrics(&self) -> &Arc<dyn MetricsSink> {
        &self.metrics
    }

    /// Wrap `work` in a phased actor wired to this context
    pub fn actor<W: Work + 'static>(&self, work: W, operation: &str) -> BenchResult<Box<dyn Actor>> {
        let actor = ActorBuilder::new(work)
            .name(self.name.clone())
            .operation(operation)
            .orchestrator(Arc::clone(&self.orchestrator))
            .phases(self.phases.clone())
            .metrics(Arc::clone(&self.metrics))
            .build()?;
        self.metrics.register_actor(actor.id(), &self.name);
        Ok(Box::new(actor))
    }
}

impl std::fmt::Debug for ActorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorContext")
            .field("name", &self.name)
            .field("actor_type", &self.actor_type)
            .field("thread_index", &self.thread_index)
            .field("threads", &self.threads)
            .finish()
    }
}

/// A constructed workload, ready to run
///
/// Every actor is built and every token registered before any thread runs,
/// so the orchestrator never sees a token count that is still growing.
pub struct WorkloadContext {
    config: WorkloadConfig,
    orchestrator: Arc<Orchestrator>,
    metrics: Arc<dyn MetricsSink>,
    actors: Vec<Box<dyn Actor>>,
}

impl WorkloadContext {
    /// Validate `config` and build its actors from `cast`
    pub fn new(config: WorkloadConfig, cast: &Cast, metrics: Arc<dyn MetricsSink>) -> BenchResult<Self> {
        let setup_started = Instant::now();
        config.validate()?;

        let orchestrator = Arc::new(Orchestrator::new());
        let max_phase = config.max_phase()?;
        orchestrator.phases_at_least_to(max_phase);

        let mut actors: Vec<Box<dyn Actor>> = Vec::with_capacity(config.total_threads());
        for actor_config in &config.actors {
            let producer = cast
                .producer(&actor_config.actor_type)
                .ok_or_else(|| BenchError::UnknownActorType(actor_config.actor_type.clone()))?;
            let phases = actor_config.phase_descriptors()?;

            for thread_index in 0..actor_config.threads {
                let context = ActorContext::new(
                    actor_config,
                    thread_index,
                    phases.clone(),
                    Arc::clone(&orchestrator),
                    Arc::clone(&metrics),
                );
                actors.push(producer(&context)?);
            }
        }

        orchestrator.add_required_tokens(actors.len())?;

        metrics.register_actor(ActorId::WORKLOAD, "Workload");
        metrics.record_timer(ActorId::WORKLOAD, SETUP_TIMER, setup_started.elapsed());

        tracing::info!(
            actors = actors.len(),
            phases = u64::from(max_phase) + 1,
            "Workload constructed"
        );

        Ok(Self {
            config,
            orchestrator,
            metrics,
            actors,
        })
    }

    /// The validated configuration
    pub fn config(&self) -> &WorkloadConfig {
        &self.config
    }

    /// Shared orchestrator
    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    /// Metrics sink
    pub fn metrics(&self) -> &Arc<dyn MetricsSink> {
        &self.metrics
    }

    /// Constructed actors, one per thread
    pub fn actors(&self) -> &[Box<dyn Actor>] {
        &self.actors
    }

    pub(crate) fn into_parts(self) -> (Arc<Orchestrator>, Arc<dyn MetricsSink>, Vec<Box<dyn Actor>>) {
        (self.orchestrator, self.metrics, self.actors)
    }
}

impl std::fmt::Debug for WorkloadContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkloadContext")
            .field("actors", &self.actors.len())
            .field("orchestrator", &self.orchestrator)
            .finish()
    }
}
