//! Bounded retry around one unit of work

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::actor::ActorId;
use crate::error::OperationError;
use crate::metrics::MetricsSink;

/// Retry policy for one phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionOptions {
    /// Attempts allowed after the first failed one
    pub max_retries: u32,

    /// Pause between two attempts
    pub retry_delay: Duration,

    /// Treat retry exhaustion as fatal for the workload
    pub throw_on_failure: bool,
}

impl ExecutionOptions {
    /// Allow `max_retries` extra attempts
    pub fn retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Set the pause between attempts
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Abort the workload when retries are exhausted
    pub fn with_throw_on_failure(mut self, throw: bool) -> Self {
        self.throw_on_failure = throw;
        self
    }
}

/// Last error seen by an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    /// Rendered error
    pub message: String,
    /// Whether the error was worth retrying
    pub retryable: bool,
}

impl From<&OperationError> for ErrorInfo {
    fn from(err: &OperationError) -> Self {
        Self {
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}

/// Outcome of one [`ExecutionStrategy::execute`] call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Attempts made, at least 1
    pub attempts: u32,
    /// Whether the last attempt succeeded
    pub succeeded: bool,
    /// Error of the last failed attempt, `None` on success
    pub last_error: Option<ErrorInfo>,
}

impl ExecutionResult {
    /// Whether this outcome must stop the workload
    pub fn is_fatal(&self, options: &ExecutionOptions) -> bool {
        if self.succeeded {
            return false;
        }
        let non_retryable = self.last_error.as_ref().is_some_and(|e| !e.retryable);
        options.throw_on_failure || non_retryable
    }
}

/// Executes operations with retries, timing every attempt
///
/// One strategy belongs to one actor and one named operation. Each attempt
/// is reported as a timer sample under the operation name; exhausted
/// operations bump the `<operation>.Errors` counter.
pub struct ExecutionStrategy {
    actor: ActorId,
    operation: String,
    errors_metric: String,
    ops_metric: String,
    failures_metric: String,
    metrics: Arc<dyn MetricsSink>,
    ops: u64,
    failures: u64,
    last_result: ExecutionResult,
}

impl ExecutionStrategy {
    /// Create a strategy reporting as `operation` for `actor`
    pub fn new(actor: ActorId, operation: impl Into<String>, metrics: Arc<dyn MetricsSink>) -> Self {
        let operation = operation.into();
        Self {
            actor,
            errors_metric: format!("{operation}.Errors"),
            ops_metric: format!("{operation}.Ops"),
            failures_metric: format!("{operation}.Failures"),
            operation,
            metrics,
            ops: 0,
            failures: 0,
            last_result: ExecutionResult::default(),
        }
    }

    /// Run `op` until it succeeds, fails fatally or runs out of retries
    pub fn execute<F>(&mut self, options: &ExecutionOptions, mut op: F) -> ExecutionResult
    where
        F: FnMut() -> Result<(), OperationError>,
    {
        let max_attempts = options.max_retries.saturating_add(1);
        let mut result = ExecutionResult::default();

        while result.attempts < max_attempts {
            if result.attempts > 0 && !options.retry_delay.is_zero() {
                thread::sleep(options.retry_delay);
            }
            result.attempts += 1;

            let start = Instant::now();
            let outcome = op();
            self.metrics
                .record_timer(self.actor, &self.operation, start.elapsed());

            match outcome {
                Ok(()) => {
                    result.succeeded = true;
                    result.last_error = None;
                    break;
                }
                Err(e) => {
                    tracing::debug!(
                        actor_id = %self.actor,
                        operation = %self.operation,
                        attempt = result.attempts,
                        error = %e,
                        "Attempt failed"
                    );
                    let retryable = e.is_retryable();
                    result.last_error = Some(ErrorInfo::from(&e));
                    if !retryable {
                        break;
                    }
                }
            }
        }

        self.ops += 1;
        if !result.succeeded {
            self.failures += 1;
            tracing::error!(
                actor_id = %self.actor,
                operation = %self.operation,
                attempts = result.attempts,
                error = result.last_error.as_ref().map(|e| e.message.as_str()).unwrap_or(""),
                "Operation failed"
            );
            self.metrics
                .increment_counter(self.actor, &self.errors_metric, 1);
        }
        self.metrics
            .set_gauge(self.actor, &self.ops_metric, self.ops as f64);
        self.metrics
            .set_gauge(self.actor, &self.failures_metric, self.failures as f64);

        self.last_result = result.clone();
        result
    }

    /// Outcome of the most recent `execute`
    pub fn last_result(&self) -> &ExecutionResult {
        &self.last_result
    }

    /// Operations that ended unsuccessfully
    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Operations executed
    pub fn ops(&self) -> u64 {
        self.ops
    }

    /// Operation name used for metrics
    pub fn operation(&self) -> &str {
        &self.operation
    }
}

impl std::fmt::Debug for ExecutionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionStrategy")
            .field("actor", &self.actor)
            .field("operation", &self.operation)
            .field("ops", &self.ops)
            .field("failures", &self.failures)
            .finish()
    }
}
