//! Workload execution: one OS thread per actor

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::actor::{Actor, ActorId, ActorStats};
use crate::error::{BenchError, BenchResult};
use crate::metrics::MetricsSink;
use crate::orchestrator::{Orchestrator, PhaseNumber};

use super::aggregator::{aggregate_actor_stats, ActorReport, AggregatedStats};
use super::context::WorkloadContext;

/// Gauge tracking how many actor threads are still running
pub const ACTIVE_ACTORS_GAUGE: &str = "Workload.ActiveActors";

/// Timer covering the whole run, setup excluded
pub const RUN_TIMER: &str = "Workload.Run";

/// Why a workload stopped before running every phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortCause {
    /// An actor returned an error or panicked
    ActorFailure {
        /// Failing actor
        actor_id: ActorId,
        /// Its name
        actor_name: String,
        /// Phase it failed in
        phase: PhaseNumber,
        /// What went wrong
        message: String,
    },
    /// Ctrl+C
    Interrupted,
    /// The run exceeded its time limit
    TimedOut(Duration),
}

impl AbortCause {
    /// Process exit code conventionally associated with this cause
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ActorFailure { .. } => 1,
            Self::TimedOut(_) => 124,
            Self::Interrupted => 130,
        }
    }
}

impl fmt::Display for AbortCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ActorFailure {
                actor_id,
                actor_name,
                phase,
                message,
            } => write!(f, "actor '{actor_name}' (id {actor_id}) failed in phase {phase}: {message}"),
            Self::Interrupted => write!(f, "interrupted"),
            Self::TimedOut(limit) => write!(f, "timed out after {limit:?}"),
        }
    }
}

/// Handle for stopping a running workload from another thread or task
///
/// The first recorded cause wins; later calls still abort but keep it.
#[derive(Clone)]
pub struct RunControl {
    orchestrator: Arc<Orchestrator>,
    cause: Arc<OnceLock<AbortCause>>,
}

impl RunControl {
    fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            cause: Arc::new(OnceLock::new()),
        }
    }

    /// Record `cause` (if it is the first) and abort the orchestrator
    ///
    /// Returns whether `cause` was recorded.
    pub fn abort(&self, cause: AbortCause) -> bool {
        let recorded = self.cause.set(cause).is_ok();
        self.orchestrator.abort();
        recorded
    }

    /// Abort with `cause` unless the workload already stopped on its own
    fn abort_if_running(&self, cause: AbortCause) {
        if !self.orchestrator.is_aborted() {
            self.abort(cause);
        }
    }

    /// Whether the workload was aborted, for any reason
    pub fn is_aborted(&self) -> bool {
        self.orchestrator.is_aborted()
    }

    /// The first recorded abort cause
    pub fn cause(&self) -> Option<&AbortCause> {
        self.cause.get()
    }
}

impl fmt::Debug for RunControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunControl")
            .field("aborted", &self.is_aborted())
            .field("cause", &self.cause())
            .finish()
    }
}

/// What a finished run produced
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// One report per actor thread, in construction order
    pub actors: Vec<ActorReport>,
    /// Totals over every actor
    pub totals: AggregatedStats,
    /// Phases that every actor got through
    pub phases_completed: PhaseNumber,
    /// Whether the orchestrator was aborted
    pub aborted: bool,
    /// Wall-clock start
    pub started_at: DateTime<Utc>,
    /// Run duration
    pub elapsed: Duration,
}

impl RunSummary {
    /// Reports of actors that failed
    pub fn failures(&self) -> impl Iterator<Item = &ActorReport> {
        self.actors.iter().filter(|report| !report.succeeded())
    }
}

/// Summary plus the reason the run stopped early, if it did
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Run summary
    pub summary: RunSummary,
    /// First recorded abort cause
    pub abort_cause: Option<AbortCause>,
}

impl RunOutcome {
    /// Whether every phase ran and nothing aborted
    pub fn is_success(&self) -> bool {
        !self.summary.aborted && self.abort_cause.is_none()
    }

    /// Process exit code: 0 on success, 1 on actor failure, 124 on timeout,
    /// 130 on interrupt
    pub fn exit_code(&self) -> i32 {
        match &self.abort_cause {
            Some(cause) => cause.exit_code(),
            None if self.summary.aborted => 1,
            None => 0,
        }
    }
}

/// Runs a constructed workload to completion
pub struct WorkloadRunner {
    orchestrator: Arc<Orchestrator>,
    metrics: Arc<dyn MetricsSink>,
    actors: Vec<Box<dyn Actor>>,
    control: RunControl,
}

impl WorkloadRunner {
    /// Take ownership of a constructed workload
    pub fn new(context: WorkloadContext) -> Self {
        let (orchestrator, metrics, actors) = context.into_parts();
        let control = RunControl::new(Arc::clone(&orchestrator));
        Self {
            orchestrator,
            metrics,
            actors,
            control,
        }
    }

    /// Handle for aborting the run once it is underway
    pub fn control(&self) -> RunControl {
        self.control.clone()
    }

    /// Run every actor on its own thread and wait for all of them
    ///
    /// # Errors
    /// Only if a thread cannot be spawned; actor failures are reported
    /// through the returned [`RunOutcome`].
    pub fn run(self) -> BenchResult<RunOutcome> {
        let Self {
            orchestrator,
            metrics,
            actors,
            control,
        } = self;

        let started_at = Utc::now();
        let start = Instant::now();
        let active = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::with_capacity(actors.len());

        tracing::info!(
            actors = actors.len(),
            max_phase = orchestrator.max_phase(),
            "Starting workload"
        );

        for actor in actors {
            let actor_id = actor.id();
            let actor_name = actor.name().to_string();
            let thread_control = control.clone();
            let thread_metrics = Arc::clone(&metrics);
            let thread_active = Arc::clone(&active);

            let spawned = thread::Builder::new()
                .name(format!("{actor_name}-{actor_id}"))
                .spawn(move || run_actor(actor, &thread_control, thread_metrics.as_ref(), &thread_active));

            match spawned {
                Ok(handle) => handles.push((actor_id, actor_name, handle)),
                Err(e) => {
                    tracing::error!(actor = %actor_name, error = %e, "Failed to spawn actor thread");
                    // Release the threads already waiting for the missing token.
                    orchestrator.abort();
                    for (_, _, handle) in handles {
                        let _ = handle.join();
                    }
                    return Err(BenchError::Io(e));
                }
            }
        }

        let mut reports = Vec::with_capacity(handles.len());
        for (actor_id, actor_name, handle) in handles {
            let report = handle.join().unwrap_or_else(|payload| ActorReport {
                actor_id,
                actor_name,
                stats: ActorStats::default(),
                error: Some(format!("actor thread panicked: {}", panic_message(payload.as_ref()))),
            });
            reports.push(report);
        }

        let elapsed = start.elapsed();
        // Threads publish their decrements unordered; settle the final value.
        metrics.set_gauge(ActorId::WORKLOAD, ACTIVE_ACTORS_GAUGE, 0.0);
        metrics.record_timer(ActorId::WORKLOAD, RUN_TIMER, elapsed);

        let totals = aggregate_actor_stats(reports.iter().map(|report| &report.stats));
        let summary = RunSummary {
            actors: reports,
            totals,
            phases_completed: orchestrator.current_phase(),
            aborted: orchestrator.is_aborted(),
            started_at,
            elapsed,
        };
        let abort_cause = control.cause().cloned();

        match &abort_cause {
            Some(cause) => tracing::warn!(
                elapsed_secs = elapsed.as_secs_f64(),
                phases_completed = summary.phases_completed,
                cause = %cause,
                "Workload aborted"
            ),
            None => tracing::info!(
                elapsed_secs = elapsed.as_secs_f64(),
                phases_completed = summary.phases_completed,
                total_iterations = summary.totals.total_iterations,
                total_failed = summary.totals.total_failed,
                ips = summary.totals.iterations_per_second,
                "Workload completed"
            ),
        }

        Ok(RunOutcome {
            summary,
            abort_cause,
        })
    }

    /// Run with Ctrl+C handling
    ///
    /// Ctrl+C aborts the workload with [`AbortCause::Interrupted`].
    pub async fn run_with_signal_handling(self) -> BenchResult<RunOutcome> {
        self.supervise(true, None).await
    }

    /// Run with a time limit
    ///
    /// Reaching `timeout` aborts the workload with [`AbortCause::TimedOut`].
    pub async fn run_with_timeout(self, timeout: Duration) -> BenchResult<RunOutcome> {
        self.supervise(false, Some(timeout)).await
    }

    /// Run with Ctrl+C handling and an optional time limit
    pub async fn run_supervised(self, timeout: Option<Duration>) -> BenchResult<RunOutcome> {
        self.supervise(true, timeout).await
    }

    async fn supervise(self, watch_signals: bool, timeout: Option<Duration>) -> BenchResult<RunOutcome> {
        let signal_handle = watch_signals.then(|| {
            let control = self.control();
            tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        tracing::info!("Received Ctrl+C, aborting workload...");
                        control.abort_if_running(AbortCause::Interrupted);
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                    }
                }
            })
        });

        let timeout_handle = timeout.map(|limit| {
            let control = self.control();
            tokio::spawn(async move {
                tokio::time::sleep(limit).await;
                tracing::info!(timeout = ?limit, "Timeout reached, aborting workload...");
                control.abort_if_running(AbortCause::TimedOut(limit));
            })
        });

        // Actors block on barriers, so they stay off the async workers.
        let result = tokio::task::spawn_blocking(move || self.run())
            .await
            .map_err(|e| BenchError::orchestration(format!("workload runner task failed: {e}")));

        if let Some(handle) = signal_handle {
            handle.abort();
        }
        if let Some(handle) = timeout_handle {
            handle.abort();
        }

        result?
    }
}

impl fmt::Debug for WorkloadRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkloadRunner")
            .field("actors", &self.actors.len())
            .field("orchestrator", &self.orchestrator)
            .finish()
    }
}

fn run_actor(
    mut actor: Box<dyn Actor>,
    control: &RunControl,
    metrics: &dyn MetricsSink,
    active: &AtomicUsize,
) -> ActorReport {
    let actor_id = actor.id();
    let actor_name = actor.name().to_string();

    let running = active.fetch_add(1, Ordering::AcqRel) + 1;
    metrics.set_gauge(ActorId::WORKLOAD, ACTIVE_ACTORS_GAUGE, running as f64);

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| actor.run()));

    let (stats, error) = match outcome {
        Ok(Ok(stats)) => (stats, None),
        Ok(Err(e)) => {
            let (phase, message) = match &e {
                BenchError::ActorFailed { phase, message, .. } => (*phase, message.clone()),
                other => (control.orchestrator.current_phase(), other.to_string()),
            };
            control.abort(AbortCause::ActorFailure {
                actor_id,
                actor_name: actor_name.clone(),
                phase,
                message,
            });
            (ActorStats::default(), Some(e.to_string()))
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!(actor_id = %actor_id, actor = %actor_name, panic = %message, "Actor panicked");
            control.abort(AbortCause::ActorFailure {
                actor_id,
                actor_name: actor_name.clone(),
                phase: control.orchestrator.current_phase(),
                message: format!("panicked: {message}"),
            });
            (ActorStats::default(), Some(format!("panicked: {message}")))
        }
    };

    let running = active.fetch_sub(1, Ordering::AcqRel) - 1;
    metrics.set_gauge(ActorId::WORKLOAD, ACTIVE_ACTORS_GAUGE, running as f64);

    ActorReport {
        actor_id,
        actor_name,
        stats,
        error,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
