use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use eyre::{Context, Result};
use serde::de::DeserializeOwned;
use tokio::fs::read_to_string;

pub const HISTORY_FILE: &str = "fio_history.json";
pub const REPORT_FILE: &str = "performance_report.json";
pub const LOG_FILE: &str = "fio_monitor.log";
pub const METRICS_CSV_FILE: &str = "fio_metrics_timeseries.csv";
pub const PLOT_FILE: &str = "performance_plots.png";
pub const STATISTICS_FILE: &str = "performance_statistics.json";

/// Layout of the files written below the output directory
#[derive(Debug, Clone, PartialEq)]
pub struct OutputDir {
    root: PathBuf,
}

impl OutputDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn history(&self) -> PathBuf {
        self.root.join(HISTORY_FILE)
    }

    pub fn report(&self) -> PathBuf {
        self.root.join(REPORT_FILE)
    }

    pub fn metrics_csv(&self) -> PathBuf {
        self.root.join(METRICS_CSV_FILE)
    }

    pub fn plot(&self) -> PathBuf {
        self.root.join(PLOT_FILE)
    }

    pub fn statistics(&self) -> PathBuf {
        self.root.join(STATISTICS_FILE)
    }

    /// Intermediate data handed to the plotting script
    pub fn plot_data(&self) -> PathBuf {
        self.root.join("plot_data")
    }

    /// File holding a single run, named by the second it was taken in.
    /// The test name is appended so two tests finishing in the same second
    /// do not overwrite each other.
    pub fn run_file(&self, test_name: &str, timestamp: &DateTime<Local>) -> PathBuf {
        let test_name = test_name.replace(['/', '\\'], "_");
        self.root.join(format!(
            "fio_results_{}_{test_name}.json",
            timestamp.format("%Y%m%d_%H%M%S")
        ))
    }
}

/// Reads a config file, as YAML when the extension says so and JSON otherwise
pub async fn read_config_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = read_to_string(path)
        .await
        .context(format!("Reading config file {}", path.display()))?;
    match path.extension().and_then(|x| x.to_str()) {
        Some("yaml" | "yml") => {
            serde_yml::from_str(&content).context(format!("Parsing {}", path.display()))
        }
        _ => serde_json::from_str(&content).context(format!("Parsing {}", path.display())),
    }
}
