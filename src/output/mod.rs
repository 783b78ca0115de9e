//! Output formats for run metrics

pub mod csv_export;
pub mod json_export;

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::ValueEnum;
use phased_bench_core::{MetricsReport, RunOutcome};

pub use csv_export::CsvExporter;
pub use json_export::JsonExporter;

/// Metrics file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MetricsFormat {
    /// One row per metric, run summary rows last
    Csv,
    /// Summary, per-actor reports and metric records in one document
    Json,
}

impl fmt::Display for MetricsFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Csv => f.write_str("csv"),
            Self::Json => f.write_str("json"),
        }
    }
}

/// Where metrics go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Stdout,
    File(PathBuf),
}

impl OutputTarget {
    /// `-` means stdout, anything else is a file path
    pub fn parse(value: &str) -> Self {
        if value == "-" {
            Self::Stdout
        } else {
            Self::File(PathBuf::from(value))
        }
    }
}

impl fmt::Display for OutputTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => f.write_str("stdout"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Write the run's metrics in `format` to `target`
pub fn write_metrics(
    outcome: &RunOutcome,
    report: &MetricsReport,
    format: MetricsFormat,
    target: &OutputTarget,
) -> Result<()> {
    match target {
        OutputTarget::Stdout => export(outcome, report, format, io::stdout().lock()),
        OutputTarget::File(path) => export(outcome, report, format, BufWriter::new(File::create(path)?)),
    }
}

fn export<W: Write>(outcome: &RunOutcome, report: &MetricsReport, format: MetricsFormat, writer: W) -> Result<()> {
    match format {
        MetricsFormat::Csv => CsvExporter::export(outcome, report, writer),
        MetricsFormat::Json => JsonExporter::export(outcome, report, writer),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use phased_bench_core::{Cast, MetricsReport, Registry, RunOutcome, WorkloadConfig, WorkloadContext, WorkloadRunner};

    /// Run a small two-actor workload and return its results
    pub fn sample_run() -> (RunOutcome, MetricsReport) {
        let yaml = r#"
SchemaVersion: 2018-07-01
Actors:
- Name: Greeter
  Type: HelloWorld
  Phases:
  - Repeat: 3
- Name: Spinner
  Type: NopMetrics
  Threads: 2
  Phases:
  - Repeat: 5
"#;
        let registry = Arc::new(Registry::new());
        let config = WorkloadConfig::from_yaml_str(yaml).unwrap();
        let context = WorkloadContext::new(config, &Cast::with_builtin_actors(), registry.clone()).unwrap();
        let outcome = WorkloadRunner::new(context).run().unwrap();
        (outcome, registry.report())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_target_parse() {
        assert_eq!(OutputTarget::parse("-"), OutputTarget::Stdout);
        assert_eq!(
            OutputTarget::parse("out/metrics.csv"),
            OutputTarget::File(PathBuf::from("out/metrics.csv"))
        );
    }

    #[test]
    fn test_write_metrics_to_file() {
        let (outcome, report) = test_support::sample_run();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.csv");

        write_metrics(&outcome, &report, MetricsFormat::Csv, &OutputTarget::File(path.clone())).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("actor_id,actor_name,metric,kind"));
        assert!(text.contains("Spinner"));
    }
}
