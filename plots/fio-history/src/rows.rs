use std::path::Path;

use chrono::{DateTime, Local};
use eyre::{Context, Result};
use fio::{record::TestResult, report::KeyMetrics};
use serde::{Deserialize, Serialize};

/// One job of one run, the unit of the CSV export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRow {
    pub timestamp: DateTime<Local>,
    pub test_name: String,
    pub job_name: String,
    pub read_iops: f64,
    pub write_iops: f64,
    pub read_latency_p95_us: f64,
    pub write_latency_p95_us: f64,
    pub read_bw_kbps: f64,
    pub write_bw_kbps: f64,
}

impl MetricsRow {
    pub fn new(result: &TestResult, job_name: &str, metrics: &KeyMetrics) -> Self {
        MetricsRow {
            timestamp: result.timestamp,
            test_name: result.test_name.clone(),
            job_name: job_name.to_owned(),
            read_iops: metrics.read_iops,
            write_iops: metrics.write_iops,
            read_latency_p95_us: metrics.read_latency_us_p95,
            write_latency_p95_us: metrics.write_latency_us_p95,
            read_bw_kbps: metrics.read_bandwidth_kbps,
            write_bw_kbps: metrics.write_bandwidth_kbps,
        }
    }

    /// One row per job of every result, in history order
    pub fn flatten<'a>(results: impl IntoIterator<Item = &'a TestResult>) -> Vec<Self> {
        results
            .into_iter()
            .flat_map(|result| {
                KeyMetrics::per_job(result)
                    .into_iter()
                    .map(move |(job, metrics)| MetricsRow::new(result, &job, &metrics))
            })
            .collect()
    }
}

pub fn write_csv(path: &Path, rows: &[MetricsRow]) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).context(format!("Creating {}", path.display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
