//! CSV export functionality

use std::io::Write;

use anyhow::Result;
use csv::Writer;
use phased_bench_core::{ActorId, MetricRecord, MetricsReport, RunOutcome};

const HEADERS: [&str; 11] = [
    "actor_id",
    "actor_name",
    "metric",
    "kind",
    "count",
    "value",
    "min_ms",
    "p50_ms",
    "p90_ms",
    "p99_ms",
    "max_ms",
];

pub struct CsvExporter;

impl CsvExporter {
    /// Export metric records, then the run summary, as one CSV table
    pub fn export<W: Write>(outcome: &RunOutcome, report: &MetricsReport, writer: W) -> Result<()> {
        let mut wtr = Writer::from_writer(writer);
        wtr.write_record(HEADERS)?;

        for record in &report.records {
            wtr.write_record(Self::record_row(record))?;
        }

        let summary = &outcome.summary;
        let totals = &summary.totals;
        let rows: [(&str, u64, f64); 6] = [
            ("Summary.Actors", totals.total_actors as u64, totals.total_actors as f64),
            ("Summary.Iterations", totals.total_iterations, totals.total_iterations as f64),
            ("Summary.Failed", totals.total_failed, totals.total_failed as f64),
            ("Summary.Attempts", totals.total_attempts, totals.total_attempts as f64),
            ("Summary.IterationsPerSecond", totals.total_iterations, totals.iterations_per_second),
            (
                "Summary.PhasesCompleted",
                u64::from(summary.phases_completed),
                f64::from(summary.phases_completed),
            ),
        ];
        for (metric, count, value) in rows {
            wtr.write_record(Self::summary_row(metric, count, value))?;
        }
        wtr.write_record(Self::summary_row(
            "Summary.ExitCode",
            1,
            f64::from(outcome.exit_code()),
        ))?;

        wtr.flush()?;
        Ok(())
    }

    fn record_row(record: &MetricRecord) -> Vec<String> {
        let mut row = vec![
            record.actor_id.to_string(),
            record.actor_name.clone(),
            record.metric.clone(),
            record.kind.to_string(),
            record.count.to_string(),
            format!("{:.3}", record.value),
        ];
        match &record.latency_ms {
            Some(latency) => row.extend(
                [latency.min, latency.p50, latency.p90, latency.p99, latency.max]
                    .iter()
                    .map(|v| format!("{v:.3}")),
            ),
            None => row.extend(std::iter::repeat(String::new()).take(5)),
        }
        row
    }

    fn summary_row(metric: &str, count: u64, value: f64) -> Vec<String> {
        let mut row = vec![
            ActorId::WORKLOAD.to_string(),
            "Workload".to_string(),
            metric.to_string(),
            "summary".to_string(),
            count.to_string(),
            format!("{value:.3}"),
        ];
        row.extend(std::iter::repeat(String::new()).take(5));
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::test_support::sample_run;

    #[test]
    fn test_export_csv() {
        let (outcome, report) = sample_run();
        let mut buffer = Vec::new();

        CsvExporter::export(&outcome, &report, &mut buffer).unwrap();

        let mut reader = csv::Reader::from_reader(buffer.as_slice());
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.iter().collect::<Vec<_>>(), HEADERS.to_vec());

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), report.records.len() + 7);

        let iterations = rows
            .iter()
            .find(|r| &r[2] == "Summary.Iterations")
            .unwrap();
        assert_eq!(&iterations[4], "13");

        let greet = rows.iter().find(|r| &r[2] == "Greet").unwrap();
        assert_eq!(&greet[1], "Greeter");
        assert_eq!(&greet[3], "timer");
        assert!(!greet[7].is_empty());
    }

    #[test]
    fn test_counter_rows_have_no_latency() {
        let (outcome, report) = sample_run();
        let mut buffer = Vec::new();

        CsvExporter::export(&outcome, &report, &mut buffer).unwrap();

        let mut reader = csv::Reader::from_reader(buffer.as_slice());
        for row in reader.records() {
            let row = row.unwrap();
            if &row[3] == "counter" {
                assert!(row[6].is_empty());
            }
        }
    }
}
