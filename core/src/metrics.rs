//! Metrics collection and percentile calculation
//!
//! Actors report through the [`MetricsSink`] trait. Every call is keyed by
//! the reporting [`ActorId`] and a metric name such as `Iterations` or
//! `Insert.Errors`. [`Registry`] is the in-memory sink used by the driver.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::actor::ActorId;
use crate::error::{BenchError, BenchResult};

/// Counter incremented once per completed iteration
pub const ITERATIONS: &str = "Iterations";

/// Destination for per-actor timers, counters and gauges
///
/// Implementations must be safe to call from every actor thread at once.
pub trait MetricsSink: Send + Sync {
    /// Attach a human-readable name to an actor id
    fn register_actor(&self, _actor: ActorId, _name: &str) {}

    /// Record one timer sample
    fn record_timer(&self, actor: ActorId, name: &str, duration: Duration);

    /// Add `delta` to a counter
    fn increment_counter(&self, actor: ActorId, name: &str, delta: u64);

    /// Set a gauge to its latest value
    fn set_gauge(&self, actor: ActorId, name: &str, value: f64);
}

/// Sink that drops everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl MetricsSink for NoopSink {
    fn record_timer(&self, _actor: ActorId, _name: &str, _duration: Duration) {}

    fn increment_counter(&self, _actor: ActorId, _name: &str, _delta: u64) {}

    fn set_gauge(&self, _actor: ActorId, _name: &str, _value: f64) {}
}

/// Latency percentiles (all values in milliseconds)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct LatencyPercentiles {
    /// Minimum value
    pub min: f64,
    /// 50th percentile (median)
    pub p50: f64,
    /// 90th percentile
    pub p90: f64,
    /// 99th percentile
    pub p99: f64,
    /// Maximum value
    pub max: f64,
    /// Mean value
    pub mean: f64,
    /// Standard deviation
    pub stddev: f64,
}

/// In-memory histogram for efficient percentile calculation
/// Uses HdrHistogram for memory-efficient storage of large datasets
pub struct LatencyHistogram {
    histogram: hdrhistogram::Histogram<u64>,
}

impl LatencyHistogram {
    /// Create a new histogram
    /// Configured for microsecond precision with max 1 hour latency
    pub fn new() -> BenchResult<Self> {
        let histogram = hdrhistogram::Histogram::new_with_bounds(1, 3_600_000_000, 3)
            .map_err(|e| BenchError::metrics(format!("failed to create histogram: {e}")))?;
        Ok(Self { histogram })
    }

    /// Record a duration. Values beyond one hour are clamped.
    pub fn record(&mut self, duration: Duration) {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        self.histogram.saturating_record(micros.max(1));
    }

    /// Get the number of recorded values
    pub fn len(&self) -> u64 {
        self.histogram.len()
    }

    /// Check if the histogram is empty
    pub fn is_empty(&self) -> bool {
        self.histogram.is_empty()
    }

    /// Calculate percentiles from the histogram
    pub fn percentiles(&self) -> LatencyPercentiles {
        if self.histogram.is_empty() {
            return LatencyPercentiles::default();
        }

        LatencyPercentiles {
            min: self.histogram.min() as f64 / 1000.0,
            p50: self.histogram.value_at_quantile(0.50) as f64 / 1000.0,
            p90: self.histogram.value_at_quantile(0.90) as f64 / 1000.0,
            p99: self.histogram.value_at_quantile(0.99) as f64 / 1000.0,
            max: self.histogram.max() as f64 / 1000.0,
            mean: self.histogram.mean() / 1000.0,
            stddev: self.histogram.stdev() / 1000.0,
        }
    }
}

impl fmt::Debug for LatencyHistogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LatencyHistogram")
            .field("len", &self.len())
            .finish()
    }
}

/// Kind of a reported metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Duration samples
    Timer,
    /// Monotonic count
    Counter,
    /// Last written value
    Gauge,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Timer => "timer",
            Self::Counter => "counter",
            Self::Gauge => "gauge",
        };
        f.write_str(name)
    }
}

/// One metric of one actor in a [`MetricsReport`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricRecord {
    /// Reporting actor
    pub actor_id: ActorId,
    /// Name registered for the actor, empty if none
    pub actor_name: String,
    /// Metric name
    pub metric: String,
    /// Metric kind
    pub kind: MetricKind,
    /// Samples for timers, the value for counters, 1 for gauges
    pub count: u64,
    /// Mean in milliseconds for timers, the value otherwise
    pub value: f64,
    /// Timer distribution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<LatencyPercentiles>,
}

/// Snapshot of everything a [`Registry`] has seen
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsReport {
    /// When the registry was created
    pub started_at: DateTime<Utc>,
    /// When the snapshot was taken
    pub generated_at: DateTime<Utc>,
    /// Records sorted by actor id, then metric name
    pub records: Vec<MetricRecord>,
}

impl MetricsReport {
    /// Find a record by actor and metric name
    pub fn find(&self, actor: ActorId, metric: &str) -> Option<&MetricRecord> {
        self.records
            .iter()
            .find(|r| r.actor_id == actor && r.metric == metric)
    }

    /// Sum of one counter over every actor
    pub fn counter_total(&self, metric: &str) -> u64 {
        self.records
            .iter()
            .filter(|r| r.kind == MetricKind::Counter && r.metric == metric)
            .map(|r| r.count)
            .sum()
    }
}

type MetricKey = (ActorId, String);

#[derive(Default)]
struct RegistryInner {
    actor_names: HashMap<ActorId, String>,
    timers: HashMap<MetricKey, LatencyHistogram>,
    counters: HashMap<MetricKey, u64>,
    gauges: HashMap<MetricKey, f64>,
}

/// Thread-safe in-memory [`MetricsSink`]
pub struct Registry {
    inner: Mutex<RegistryInner>,
    started_at: DateTime<Utc>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner::default()),
            started_at: Utc::now(),
        }
    }

    /// Current counter value, 0 if never incremented
    pub fn counter(&self, actor: ActorId, name: &str) -> u64 {
        self.inner
            .lock()
            .counters
            .get(&(actor, name.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Last gauge value
    pub fn gauge(&self, actor: ActorId, name: &str) -> Option<f64> {
        self.inner
            .lock()
            .gauges
            .get(&(actor, name.to_string()))
            .copied()
    }

    /// Number of timer samples recorded
    pub fn timer_count(&self, actor: ActorId, name: &str) -> u64 {
        self.inner
            .lock()
            .timers
            .get(&(actor, name.to_string()))
            .map(LatencyHistogram::len)
            .unwrap_or(0)
    }

    /// Name registered for an actor
    pub fn actor_name(&self, actor: ActorId) -> Option<String> {
        self.inner.lock().actor_names.get(&actor).cloned()
    }

    /// Take a serializable snapshot
    pub fn report(&self) -> MetricsReport {
        let inner = self.inner.lock();
        let name_of = |actor: &ActorId| inner.actor_names.get(actor).cloned().unwrap_or_default();

        let mut records = Vec::with_capacity(
            inner.timers.len() + inner.counters.len() + inner.gauges.len(),
        );

        for ((actor, metric), histogram) in &inner.timers {
            let latency = histogram.percentiles();
            records.push(MetricRecord {
                actor_id: *actor,
                actor_name: name_of(actor),
                metric: metric.clone(),
                kind: MetricKind::Timer,
                count: histogram.len(),
                value: latency.mean,
                latency_ms: Some(latency),
            });
        }
        for ((actor, metric), count) in &inner.counters {
            records.push(MetricRecord {
                actor_id: *actor,
                actor_name: name_of(actor),
                metric: metric.clone(),
                kind: MetricKind::Counter,
                count: *count,
                value: *count as f64,
                latency_ms: None,
            });
        }
        for ((actor, metric), value) in &inner.gauges {
            records.push(MetricRecord {
                actor_id: *actor,
                actor_name: name_of(actor),
                metric: metric.clone(),
                kind: MetricKind::Gauge,
                count: 1,
                value: *value,
                latency_ms: None,
            });
        }

        records.sort_by(|a, b| {
            (a.actor_id, &a.metric, a.kind).cmp(&(b.actor_id, &b.metric, b.kind))
        });

        MetricsReport {
            started_at: self.started_at,
            generated_at: Utc::now(),
            records,
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Registry")
            .field("actors", &inner.actor_names.len())
            .field("timers", &inner.timers.len())
            .field("counters", &inner.counters.len())
            .field("gauges", &inner.gauges.len())
            .finish()
    }
}

impl MetricsSink for Registry {
    fn register_actor(&self, actor: ActorId, name: &str) {
        self.inner.lock().actor_names.insert(actor, name.to_string());
    }

    fn record_timer(&self, actor: ActorId, name: &str, duration: Duration) {
        let mut inner = self.inner.lock();
        let key = (actor, name.to_string());
        if let Some(histogram) = inner.timers.get_mut(&key) {
            histogram.record(duration);
            return;
        }
        match LatencyHistogram::new() {
            Ok(mut histogram) => {
                histogram.record(duration);
                inner.timers.insert(key, histogram);
            }
            Err(e) => tracing::warn!(actor_id = %actor, metric = name, error = %e, "Dropping timer sample"),
        }
    }

    fn increment_counter(&self, actor: ActorId, name: &str, delta: u64) {
        *self
            .inner
            .lock()
            .counters
            .entry((actor, name.to_string()))
            .or_insert(0) += delta;
    }

    fn set_gauge(&self, actor: ActorId, name: &str, value: f64) {
        self.inner
            .lock()
            .gauges
            .insert((actor, name.to_string()), value);
    }
}
