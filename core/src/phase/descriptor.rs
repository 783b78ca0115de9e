//! Immutable per-phase settings of one actor

use std::collections::BTreeMap;
use std::time::Duration;

use crate::actor::RateLimitOptions;
use crate::execution::ExecutionOptions;

/// What an actor does during one phase
///
/// An iteration bound (`iterations`), a time bound (`duration`) or both; when
/// both are set the phase runs until both are satisfied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhaseDescriptor {
    /// Exact number of iterations
    pub iterations: Option<u64>,

    /// Keep iterating at least this long (and at least once)
    pub duration: Option<Duration>,

    /// Whether the phase waits for this actor at the end barrier
    pub blocking: bool,

    /// Sit the phase out: no iterations, both barriers still crossed
    pub nop: bool,

    /// Operation name reported to metrics
    pub operation: Option<String>,

    /// Iteration throttling
    pub rate_limit: RateLimitOptions,

    /// Retry policy for each iteration
    pub execution: ExecutionOptions,

    /// Actor-specific settings
    pub params: BTreeMap<String, serde_yaml::Value>,
}

impl PhaseDescriptor {
    /// Run exactly `count` iterations
    pub fn iterations(count: u64) -> Self {
        Self {
            iterations: Some(count),
            blocking: true,
            ..Default::default()
        }
    }

    /// Iterate until `duration` has elapsed since the phase started
    pub fn duration(duration: Duration) -> Self {
        Self {
            duration: Some(duration),
            blocking: true,
            ..Default::default()
        }
    }

    /// Iterate until the blocking actors end the phase
    pub fn background() -> Self {
        Self {
            blocking: false,
            ..Default::default()
        }
    }

    /// Do nothing this phase
    pub fn nop() -> Self {
        Self {
            blocking: true,
            nop: true,
            ..Default::default()
        }
    }

    /// Add a time bound on top of the current one
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Set whether the phase waits for this actor
    pub fn with_blocking(mut self, blocking: bool) -> Self {
        self.blocking = blocking;
        self
    }

    /// Set the operation name
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Set the throttling options
    pub fn with_rate_limit(mut self, rate_limit: RateLimitOptions) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    /// Set the retry policy
    pub fn with_execution(mut self, execution: ExecutionOptions) -> Self {
        self.execution = execution;
        self
    }

    /// Set an actor-specific parameter
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<serde_yaml::Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Whether an iteration or time bound is configured
    pub fn is_bounded(&self) -> bool {
        self.iterations.is_some() || self.duration.is_some()
    }

    /// String parameter, if present and a string
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(serde_yaml::Value::as_str)
    }
}
