use std::path::{Path, PathBuf};

use common::{config::OutputDir, util::write_json_file};
use eyre::{Context, Result, bail};
use itertools::Itertools;
use serde::Serialize;
use tokio::{fs::create_dir_all, process::Command};
use tracing::{debug, info};

use crate::{rows::MetricsRow, stats::Statistics};

pub const PLOT_SCRIPT: &str = "plots/performance_plots.py";

/// The script relative to the working directory when run from a checkout,
/// else the copy next to this crate
pub fn default_script() -> PathBuf {
    let local = PathBuf::from(PLOT_SCRIPT);
    if local.exists() {
        return local;
    }
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .map(|plots| plots.join("performance_plots.py"))
        .unwrap_or(local)
}

/// Time series of one job, bandwidth converted to MB/s
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct PlotSeries {
    pub label: String,
    pub timestamps: Vec<String>,
    pub read_iops: Vec<f64>,
    pub write_iops: Vec<f64>,
    pub read_latency_p95_us: Vec<f64>,
    pub write_latency_p95_us: Vec<f64>,
    pub read_bw_mbps: Vec<f64>,
    pub write_bw_mbps: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotData<'a> {
    pub series: Vec<PlotSeries>,
    pub statistics: &'a Statistics,
}

impl<'a> PlotData<'a> {
    pub fn new(rows: &[MetricsRow], statistics: &'a Statistics) -> Self {
        let series = rows
            .iter()
            .into_group_map_by(|row| (row.test_name.clone(), row.job_name.clone()))
            .into_iter()
            .sorted_by(|a, b| a.0.cmp(&b.0))
            .map(|((test_name, job_name), rows)| {
                let label = if test_name == job_name {
                    test_name
                } else {
                    format!("{test_name}/{job_name}")
                };
                let mut series = PlotSeries {
                    label,
                    ..Default::default()
                };
                for row in rows.into_iter().sorted_by_key(|row| row.timestamp) {
                    series.timestamps.push(row.timestamp.to_rfc3339());
                    series.read_iops.push(row.read_iops);
                    series.write_iops.push(row.write_iops);
                    series.read_latency_p95_us.push(row.read_latency_p95_us);
                    series.write_latency_p95_us.push(row.write_latency_p95_us);
                    series.read_bw_mbps.push(row.read_bw_kbps / 1024.0);
                    series.write_bw_mbps.push(row.write_bw_kbps / 1024.0);
                }
                series
            })
            .collect();

        PlotData { series, statistics }
    }
}

/// Hands the plot data to a python script that draws the charts
#[derive(Debug, Clone)]
pub struct Renderer {
    pub python: String,
    pub script: PathBuf,
}

impl Default for Renderer {
    fn default() -> Self {
        Renderer {
            python: "python3".to_owned(),
            script: default_script(),
        }
    }
}

impl Renderer {
    pub fn with_script(mut self, script: impl Into<PathBuf>) -> Self {
        self.script = script.into();
        self
    }

    pub async fn render(&self, out: &OutputDir, data: &PlotData<'_>) -> Result<PathBuf> {
        if !self.script.exists() {
            bail!("Plot script {} not found", self.script.display());
        }
        let data_dir = out.plot_data();
        create_dir_all(&data_dir).await?;
        let data_path = data_dir.join("performance_plots.json");
        write_json_file(&data_path, data).await?;

        let plot_path = out.plot();
        debug!(
            "{} {} --data {} --filepath {}",
            self.python,
            self.script.display(),
            data_path.display(),
            plot_path.display()
        );
        let status = Command::new(&self.python)
            .arg(&self.script)
            .arg("--data")
            .arg(&data_path)
            .arg("--filepath")
            .arg(&plot_path)
            .status()
            .await
            .context(format!("Running {}", self.python))?;
        if !status.success() {
            bail!("{} exited with {status}", script_name(&self.script));
        }

        info!("Plots saved to {}", plot_path.display());
        Ok(plot_path)
    }
}

fn script_name(script: &Path) -> String {
    script
        .file_name()
        .map(|x| x.to_string_lossy().into_owned())
        .unwrap_or_else(|| script.display().to_string())
}
