//! CLI argument parsing and command dispatch

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use phased_bench_core::{Cast, Registry, WorkloadConfig, WorkloadContext, WorkloadRunner};

use crate::output::{self, MetricsFormat, OutputTarget};

#[derive(Parser)]
#[command(name = "phased-bench")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a workload
    Run(RunArgs),
    /// Validate a workload file without running it
    Validate {
        /// Path to the workload file
        workload: PathBuf,
    },
    /// List the available actor types
    ListActors,
}

#[derive(Args)]
pub struct RunArgs {
    /// Path to the workload file
    pub workload: PathBuf,

    /// Metrics output format
    #[arg(long, value_enum, default_value_t = MetricsFormat::Json)]
    pub metrics_format: MetricsFormat,

    /// Write metrics to this file ("-" for stdout)
    #[arg(long, env = "PHASED_BENCH_METRICS_OUTPUT")]
    pub metrics_output_file: Option<String>,

    /// Abort the run after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

impl Cli {
    /// Execute the selected command and return the process exit code
    pub async fn run(self) -> Result<i32> {
        let cast = Cast::with_builtin_actors();
        match self.command {
            Commands::Run(args) => run_workload(args, &cast).await,
            Commands::Validate { workload } => validate(&workload, &cast),
            Commands::ListActors => {
                for name in cast.names() {
                    println!("{name}");
                }
                Ok(0)
            }
        }
    }
}

fn load(path: &Path) -> Result<WorkloadConfig> {
    WorkloadConfig::from_file(path).with_context(|| format!("failed to load workload {}", path.display()))
}

async fn run_workload(args: RunArgs, cast: &Cast) -> Result<i32> {
    let config = load(&args.workload)?;
    let registry = Arc::new(Registry::new());
    let context = WorkloadContext::new(config, cast, registry.clone())
        .with_context(|| format!("failed to construct workload {}", args.workload.display()))?;

    tracing::info!(
        workload = %args.workload.display(),
        actors = context.actors().len(),
        timeout_secs = ?args.timeout,
        "Running workload"
    );

    let outcome = WorkloadRunner::new(context)
        .run_supervised(args.timeout.map(Duration::from_secs))
        .await?;

    let totals = &outcome.summary.totals;
    tracing::info!(
        phases_completed = outcome.summary.phases_completed,
        iterations = totals.total_iterations,
        failed = totals.total_failed,
        ips = %format!("{:.1}", totals.iterations_per_second),
        elapsed_secs = %format!("{:.3}", outcome.summary.elapsed.as_secs_f64()),
        "Run summary"
    );
    for report in outcome.summary.failures() {
        tracing::error!(
            actor_id = %report.actor_id,
            actor = %report.actor_name,
            error = report.error.as_deref().unwrap_or_default(),
            "Actor failed"
        );
    }

    if let Some(path) = &args.metrics_output_file {
        let target = OutputTarget::parse(path);
        output::write_metrics(&outcome, &registry.report(), args.metrics_format, &target)
            .with_context(|| format!("failed to write metrics to {target}"))?;
        tracing::info!(output = %target, format = ?args.metrics_format, "Metrics written");
    }

    Ok(outcome.exit_code())
}

fn validate(path: &Path, cast: &Cast) -> Result<i32> {
    let config = load(path)?;
    config
        .validate()
        .with_context(|| format!("invalid workload {}", path.display()))?;

    for actor in &config.actors {
        if !cast.contains(&actor.actor_type) {
            anyhow::bail!(
                "actor '{}' uses unknown type '{}' (see list-actors)",
                actor.name,
                actor.actor_type
            );
        }
        actor.phase_descriptors()?;
    }

    println!(
        "{}: {} actors, {} threads, phases 0..={}",
        path.display(),
        config.actors.len(),
        config.total_threads(),
        config.max_phase()?
    );
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_args() {
        let cli = Cli::try_parse_from([
            "phased-bench",
            "run",
            "workload.yml",
            "--metrics-format",
            "csv",
            "--metrics-output-file",
            "-",
            "--timeout",
            "30",
            "-v",
        ])
        .unwrap();

        assert!(cli.verbose);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.workload, PathBuf::from("workload.yml"));
                assert_eq!(args.metrics_format, MetricsFormat::Csv);
                assert_eq!(args.metrics_output_file.as_deref(), Some("-"));
                assert_eq!(args.timeout, Some(30));
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_parse_list_actors() {
        let cli = Cli::try_parse_from(["phased-bench", "list-actors"]).unwrap();
        assert!(matches!(cli.command, Commands::ListActors));
    }

    #[test]
    fn test_validate_rejects_unknown_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("workload.yml");
        std::fs::write(
            &path,
            "SchemaVersion: 2018-07-01\nActors:\n- Name: X\n  Type: Missing\n  Phases:\n  - Repeat: 1\n",
        )
        .unwrap();

        let err = validate(&path, &Cast::with_builtin_actors()).unwrap_err();
        assert!(err.to_string().contains("Missing"));
    }

    #[test]
    fn test_validate_accepts_workload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("workload.yml");
        std::fs::write(
            &path,
            "SchemaVersion: 2018-07-01\nActors:\n- Name: Greeter\n  Type: HelloWorld\n  Phases:\n  - Repeat: 1\n",
        )
        .unwrap();

        assert_eq!(validate(&path, &Cast::with_builtin_actors()).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_run_writes_metrics() {
        let dir = tempfile::tempdir().unwrap();
        let workload = dir.path().join("workload.yml");
        let metrics = dir.path().join("metrics.json");
        std::fs::write(
            &workload,
            "SchemaVersion: 2018-07-01\nActors:\n- Name: Spinner\n  Type: NopMetrics\n  Threads: 2\n  Phases:\n  - Repeat: 10\n",
        )
        .unwrap();

        let args = RunArgs {
            workload,
            metrics_format: MetricsFormat::Json,
            metrics_output_file: Some(metrics.to_string_lossy().into_owned()),
            timeout: Some(60),
        };
        let code = run_workload(args, &Cast::with_builtin_actors()).await.unwrap();

        assert_eq!(code, 0);
        let written: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&metrics).unwrap()).unwrap();
        assert_eq!(written["summary"]["total_iterations"], 20);
    }
}
