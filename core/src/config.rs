//! Workload configuration types
//!
//! A workload file is YAML with PascalCase keys:
//!
//! ```yaml
//! SchemaVersion: 2018-07-01
//! Actors:
//! - Name: Greeter
//!   Type: HelloWorld
//!   Threads: 4
//!   Phases:
//!   - Repeat: 100
//!     RateLimit: { MinPeriod: 5 milliseconds }
//!   - Operation: Nop
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

use serde::{de, Deserialize, Deserializer};

use crate::actor::RateLimitOptions;
use crate::error::BenchResult;
use crate::execution::ExecutionOptions;
use crate::orchestrator::PhaseNumber;
use crate::phase::PhaseDescriptor;

/// The only workload schema this driver understands
pub const SCHEMA_VERSION: &str = "2018-07-01";

/// `Operation` value marking a phase the actor sits out
pub const NOP_OPERATION: &str = "Nop";

/// Top-level workload file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WorkloadConfig {
    /// Must equal [`SCHEMA_VERSION`]
    #[serde(default)]
    pub schema_version: String,

    /// Actor declarations
    #[serde(default)]
    pub actors: Vec<ActorConfig>,
}

/// One `Actors:` entry
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActorConfig {
    /// Name used in logs and metrics
    pub name: String,

    /// Registered actor type
    #[serde(rename = "Type")]
    pub actor_type: String,

    /// Number of actor instances (and threads) to create
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// Per-phase settings, in phase order unless `Phase:` says otherwise
    #[serde(default)]
    pub phases: Vec<PhaseConfig>,
}

fn default_threads() -> usize {
    1
}

/// One `Phases:` entry
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PhaseConfig {
    /// Explicit phase number; defaults to the entry's index
    pub phase: Option<PhaseNumber>,

    /// Exact number of iterations
    pub repeat: Option<u64>,

    /// Minimum time to keep iterating
    #[serde(default, deserialize_with = "deserialize_duration")]
    pub duration: Option<Duration>,

    /// Whether the phase holds up the end barrier (default `true`)
    pub blocking: Option<bool>,

    /// Operation name; `Nop` makes this actor sit the phase out
    pub operation: Option<String>,

    /// Throttling of the iteration loop
    pub rate_limit: Option<RateLimitConfig>,

    /// Additional attempts after a failed one
    pub retries: Option<u32>,

    /// Pause between attempts
    #[serde(default, deserialize_with = "deserialize_duration")]
    pub retry_delay: Option<Duration>,

    /// Abort the workload when an operation exhausts its retries
    pub throw_on_failure: Option<bool>,

    /// Actor-specific keys (e.g. `Message`)
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// `RateLimit:` block
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RateLimitConfig {
    /// Minimum time between the start of two iterations
    #[serde(default, deserialize_with = "deserialize_duration")]
    pub min_period: Option<Duration>,

    /// Pause before each iteration
    #[serde(default, deserialize_with = "deserialize_duration")]
    pub pre_sleep: Option<Duration>,

    /// Pause after each iteration
    #[serde(default, deserialize_with = "deserialize_duration")]
    pub post_sleep: Option<Duration>,
}

impl WorkloadConfig {
    /// Parse a workload from YAML text. Does not validate.
    pub fn from_yaml_str(text: &str) -> BenchResult<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Read and parse a workload file. Does not validate.
    pub fn from_file(path: impl AsRef<Path>) -> BenchResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Validate the whole workload
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(ConfigError::InvalidSchemaVersion(
                self.schema_version.clone(),
            ));
        }
        if self.actors.is_empty() {
            return Err(ConfigError::NoActors);
        }
        for actor in &self.actors {
            actor.validate()?;
        }
        Ok(())
    }

    /// Highest phase number any actor configures (0 when none do)
    pub fn max_phase(&self) -> Result<PhaseNumber, ConfigError> {
        let mut max = 0;
        for actor in &self.actors {
            if let Some(last) = actor.phase_numbers()?.into_iter().max() {
                max = max.max(last);
            }
        }
        Ok(max)
    }

    /// Total number of actor threads the workload will run
    pub fn total_threads(&self) -> usize {
        self.actors.iter().map(|a| a.threads).sum()
    }
}

impl ActorConfig {
    /// Validate this actor and all of its phases
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threads == 0 {
            return Err(ConfigError::InvalidThreads {
                actor: self.name.clone(),
            });
        }
        let numbers = self.phase_numbers()?;
        for (phase, config) in numbers.into_iter().zip(&self.phases) {
            config.validate(&self.name, phase)?;
        }
        Ok(())
    }

    /// Phase number of each `Phases:` entry, rejecting duplicates
    pub fn phase_numbers(&self) -> Result<Vec<PhaseNumber>, ConfigError> {
        let mut seen = HashSet::new();
        let mut numbers = Vec::with_capacity(self.phases.len());
        for (index, config) in self.phases.iter().enumerate() {
            let phase = match config.phase {
                Some(phase) => phase,
                None => PhaseNumber::try_from(index).map_err(|_| ConfigError::TooManyPhases {
                    actor: self.name.clone(),
                })?,
            };
            if !seen.insert(phase) {
                return Err(ConfigError::DuplicatePhase {
                    actor: self.name.clone(),
                    phase,
                });
            }
            numbers.push(phase);
        }
        Ok(numbers)
    }

    /// Build the immutable per-phase descriptors for this actor
    pub fn phase_descriptors(&self) -> Result<BTreeMap<PhaseNumber, PhaseDescriptor>, ConfigError> {
        self.validate()?;
        let numbers = self.phase_numbers()?;
        Ok(numbers
            .into_iter()
            .zip(&self.phases)
            .map(|(phase, config)| (phase, config.to_descriptor()))
            .collect())
    }
}

impl PhaseConfig {
    /// Whether this phase is `Operation: Nop`
    pub fn is_nop(&self) -> bool {
        self.operation.as_deref() == Some(NOP_OPERATION)
    }

    fn validate(&self, actor: &str, phase: PhaseNumber) -> Result<(), ConfigError> {
        if self.is_nop() {
            let has_other_keys = self.repeat.is_some()
                || self.duration.is_some()
                || self.blocking.is_some()
                || self.rate_limit.is_some()
                || self.retries.is_some()
                || self.retry_delay.is_some()
                || self.throw_on_failure.is_some()
                || !self.extra.is_empty();
            if has_other_keys {
                return Err(ConfigError::NopWithOtherKeys {
                    actor: actor.to_string(),
                    phase,
                });
            }
            return Ok(());
        }

        let blocking = self.blocking.unwrap_or(true);
        if blocking && self.repeat.is_none() && self.duration.is_none() {
            return Err(ConfigError::MissingIterationBound {
                actor: actor.to_string(),
                phase,
            });
        }
        Ok(())
    }

    fn to_descriptor(&self) -> PhaseDescriptor {
        if self.is_nop() {
            return PhaseDescriptor::nop();
        }

        let rate_limit = self
            .rate_limit
            .as_ref()
            .map(|r| RateLimitOptions {
                min_period: r.min_period,
                pre_sleep: r.pre_sleep,
                post_sleep: r.post_sleep,
            })
            .unwrap_or_default();

        let defaults = ExecutionOptions::default();
        let execution = ExecutionOptions {
            max_retries: self.retries.unwrap_or(defaults.max_retries),
            retry_delay: self.retry_delay.unwrap_or(defaults.retry_delay),
            throw_on_failure: self.throw_on_failure.unwrap_or(defaults.throw_on_failure),
        };

        PhaseDescriptor {
            iterations: self.repeat,
            duration: self.duration,
            blocking: self.blocking.unwrap_or(true),
            nop: false,
            operation: self.operation.clone(),
            rate_limit,
            execution,
            params: self.extra.clone(),
        }
    }
}

/// Parse a human duration: `"250 milliseconds"`, `"3s"`, `"1 minute"`.
/// A bare number is milliseconds.
pub fn parse_duration(text: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidDuration(text.to_string());

    let trimmed = text.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);
    let value: u64 = number.parse().map_err(|_| invalid())?;

    let duration = match unit.trim() {
        "" | "ms" | "millisecond" | "milliseconds" => Duration::from_millis(value),
        "ns" | "nanosecond" | "nanoseconds" => Duration::from_nanos(value),
        "us" | "microsecond" | "microseconds" => Duration::from_micros(value),
        "s" | "second" | "seconds" => Duration::from_secs(value),
        "m" | "min" | "minute" | "minutes" => {
            Duration::from_secs(value.checked_mul(60).ok_or_else(invalid)?)
        }
        "h" | "hour" | "hours" => {
            Duration::from_secs(value.checked_mul(3600).ok_or_else(invalid)?)
        }
        _ => return Err(invalid()),
    };
    Ok(duration)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDuration {
    Millis(u64),
    Text(String),
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<RawDuration>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawDuration::Millis(ms)) => Ok(Some(Duration::from_millis(ms))),
        Some(RawDuration::Text(text)) => parse_duration(&text).map(Some).map_err(de::Error::custom),
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Unsupported `SchemaVersion`
    #[error("Invalid schema version: '{0}' (expected 2018-07-01)")]
    InvalidSchemaVersion(String),

    /// The workload declares no actors
    #[error("Workload has no actors")]
    NoActors,

    /// `Threads: 0`
    #[error("Actor '{actor}': Threads must be at least 1")]
    InvalidThreads {
        /// Actor name
        actor: String,
    },

    /// Two entries resolve to the same phase number
    #[error("Actor '{actor}': duplicate phase {phase}")]
    DuplicatePhase {
        /// Actor name
        actor: String,
        /// Phase number seen twice
        phase: PhaseNumber,
    },

    /// More phase entries than phase numbers
    #[error("Actor '{actor}': too many phases")]
    TooManyPhases {
        /// Actor name
        actor: String,
    },

    /// A blocking phase would never end
    #[error("Actor '{actor}' phase {phase}: need to specify either Repeat or Duration")]
    MissingIterationBound {
        /// Actor name
        actor: String,
        /// Offending phase
        phase: PhaseNumber,
    },

    /// `Operation: Nop` mixed with other settings
    #[error("Actor '{actor}' phase {phase}: Nop cannot be used with any other keywords")]
    NopWithOtherKeys {
        /// Actor name
        actor: String,
        /// Offending phase
        phase: PhaseNumber,
    },

    /// Unparseable duration string
    #[error("Invalid duration: '{0}'")]
    InvalidDuration(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO: &str = r#"
SchemaVersion: 2018-07-01
Actors:
- Name: Greeter
  Type: HelloWorld
  Threads: 3
  Phases:
  - Repeat: 10
    Message: hi there
    RateLimit: { MinPeriod: 5 milliseconds, PostSleep: 1 }
  - Duration: 2 seconds
    Retries: 2
    RetryDelay: 10ms
    ThrowOnFailure: true
  - Operation: Nop
"#;

    #[test]
    fn test_parse_workload() {
        let config = WorkloadConfig::from_yaml_str(HELLO).unwrap();
        config.validate().unwrap();

        assert_eq!(config.schema_version, SCHEMA_VERSION);
        assert_eq!(config.actors.len(), 1);
        assert_eq!(config.total_threads(), 3);
        assert_eq!(config.max_phase().unwrap(), 2);

        let actor = &config.actors[0];
        assert_eq!(actor.name, "Greeter");
        assert_eq!(actor.actor_type, "HelloWorld");
        assert_eq!(actor.phases[0].repeat, Some(10));
        assert!(actor.phases[0].extra.contains_key("Message"));
        assert_eq!(actor.phases[1].duration, Some(Duration::from_secs(2)));
        assert!(actor.phases[2].is_nop());
    }

    #[test]
    fn test_phase_descriptors() {
        let config = WorkloadConfig::from_yaml_str(HELLO).unwrap();
        let descriptors = config.actors[0].phase_descriptors().unwrap();

        assert_eq!(descriptors.len(), 3);

        let first = &descriptors[&0];
        assert_eq!(first.iterations, Some(10));
        assert!(first.blocking);
        assert_eq!(first.rate_limit.min_period, Some(Duration::from_millis(5)));
        assert_eq!(first.rate_limit.post_sleep, Some(Duration::from_millis(1)));
        assert_eq!(first.param_str("Message"), Some("hi there"));

        let second = &descriptors[&1];
        assert_eq!(second.execution.max_retries, 2);
        assert_eq!(second.execution.retry_delay, Duration::from_millis(10));
        assert!(second.execution.throw_on_failure);

        assert!(descriptors[&2].nop);
    }

    #[test]
    fn test_default_threads() {
        let yaml = r#"
SchemaVersion: 2018-07-01
Actors:
- Name: One
  Type: NopMetrics
  Phases:
  - Repeat: 1
"#;
        let config = WorkloadConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.actors[0].threads, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_explicit_phase_numbers() {
        let yaml = r#"
SchemaVersion: 2018-07-01
Actors:
- Name: Late
  Type: NopMetrics
  Phases:
  - Phase: 4
    Repeat: 1
"#;
        let config = WorkloadConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.max_phase().unwrap(), 4);
        let descriptors = config.actors[0].phase_descriptors().unwrap();
        assert!(descriptors.contains_key(&4));
        assert!(!descriptors.contains_key(&0));
    }

    #[test]
    fn test_duplicate_phase_rejected() {
        let yaml = r#"
SchemaVersion: 2018-07-01
Actors:
- Name: Dup
  Type: NopMetrics
  Phases:
  - Repeat: 1
  - Phase: 0
    Repeat: 2
"#;
        let config = WorkloadConfig::from_yaml_str(yaml).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicatePhase { phase: 0, .. })
        ));
    }

    #[test]
    fn test_schema_version_checked() {
        let yaml = r#"
SchemaVersion: 2017-01-01
Actors:
- Name: A
  Type: NopMetrics
"#;
        let config = WorkloadConfig::from_yaml_str(yaml).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSchemaVersion(_))
        ));
    }

    #[test]
    fn test_no_actors_rejected() {
        let config = WorkloadConfig::from_yaml_str("SchemaVersion: 2018-07-01\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::NoActors)));
    }

    #[test]
    fn test_zero_threads_rejected() {
        let yaml = r#"
SchemaVersion: 2018-07-01
Actors:
- Name: Idle
  Type: NopMetrics
  Threads: 0
"#;
        let config = WorkloadConfig::from_yaml_str(yaml).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidThreads { .. })
        ));
    }

    #[test]
    fn test_negative_values_rejected_by_types() {
        let yaml = r#"
SchemaVersion: 2018-07-01
Actors:
- Name: Neg
  Type: NopMetrics
  Phases:
  - Repeat: -1
"#;
        assert!(WorkloadConfig::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn test_blocking_phase_needs_bound() {
        let yaml = r#"
SchemaVersion: 2018-07-01
Actors:
- Name: Forever
  Type: NopMetrics
  Phases:
  - Message: never ends
"#;
        let config = WorkloadConfig::from_yaml_str(yaml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("either Repeat or Duration"));
    }

    #[test]
    fn test_non_blocking_phase_needs_no_bound() {
        let yaml = r#"
SchemaVersion: 2018-07-01
Actors:
- Name: Background
  Type: NopMetrics
  Phases:
  - Blocking: false
"#;
        let config = WorkloadConfig::from_yaml_str(yaml).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_nop_with_other_keys_rejected() {
        let yaml = r#"
SchemaVersion: 2018-07-01
Actors:
- Name: Confused
  Type: NopMetrics
  Phases:
  - Operation: Nop
    Repeat: 3
"#;
        let config = WorkloadConfig::from_yaml_str(yaml).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NopWithOtherKeys { phase: 0, .. })
        ));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("250 milliseconds").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("3 seconds").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_duration("1 minute").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_duration("15").unwrap(), Duration::from_millis(15));
        assert_eq!(parse_duration("40us").unwrap(), Duration::from_micros(40));

        assert!(parse_duration("fast").is_err());
        assert!(parse_duration("3 fortnights").is_err());
        assert!(parse_duration("-5 seconds").is_err());
    }

    #[test]
    fn test_bad_duration_fails_parse() {
        let yaml = r#"
SchemaVersion: 2018-07-01
Actors:
- Name: Typo
  Type: NopMetrics
  Phases:
  - Duration: 3 parsecs
"#;
        let err = WorkloadConfig::from_yaml_str(yaml).unwrap_err();
        assert!(err.to_string().contains("3 parsecs"));
    }
}
