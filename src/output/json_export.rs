//! JSON export functionality

use std::io::Write;

use anyhow::Result;
use phased_bench_core::{MetricsReport, RunOutcome};
use serde_json::json;

pub struct JsonExporter;

impl JsonExporter {
    /// Export the run summary, per-actor reports and metric records
    pub fn export<W: Write>(outcome: &RunOutcome, report: &MetricsReport, mut writer: W) -> Result<()> {
        let summary = &outcome.summary;
        let totals = &summary.totals;

        let actors: Vec<_> = summary
            .actors
            .iter()
            .map(|a| {
                json!({
                    "actor_id": a.actor_id,
                    "actor_name": a.actor_name,
                    "iterations": a.stats.iterations,
                    "failed": a.stats.failed,
                    "attempts": a.stats.attempts,
                    "active_phases": a.stats.active_phases,
                    "error": a.error,
                })
            })
            .collect();

        let output = json!({
            "started_at": summary.started_at,
            "elapsed_secs": summary.elapsed.as_secs_f64(),
            "exit_code": outcome.exit_code(),
            "abort_cause": outcome.abort_cause.as_ref().map(ToString::to_string),
            "summary": {
                "phases_completed": summary.phases_completed,
                "aborted": summary.aborted,
                "total_actors": totals.total_actors,
                "total_iterations": totals.total_iterations,
                "total_failed": totals.total_failed,
                "total_attempts": totals.total_attempts,
                "success_rate_percent": totals.success_rate() * 100.0,
                "iterations_per_second": totals.iterations_per_second,
            },
            "actors": actors,
            "metrics": report,
        });

        serde_json::to_writer_pretty(&mut writer, &output)?;
        writeln!(writer)?;
        writer.flush()?;

        Ok(())
    }
}
