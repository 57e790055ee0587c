//! Offline analysis of the fio history: CSV export, per test statistics
//! and time series charts.

use common::{config::OutputDir, util::write_json_file};
use eyre::Result;
use fio::history::History;
use regex::Regex;
use tracing::{error, info, warn};

pub mod render;
pub mod rows;
pub mod stats;

use render::{PlotData, Renderer};
use rows::{MetricsRow, write_csv};
use stats::{Statistics, summarize};

#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub rows: Vec<MetricsRow>,
    pub statistics: Statistics,
}

#[derive(Debug, Clone)]
pub struct Analyzer {
    out: OutputDir,
    filter: Option<Regex>,
    renderer: Option<Renderer>,
}

impl Analyzer {
    pub fn new(out: OutputDir) -> Self {
        Analyzer {
            out,
            filter: None,
            renderer: Some(Renderer::default()),
        }
    }

    /// Only analyze tests whose name matches `filter`
    pub fn with_filter(mut self, filter: Option<Regex>) -> Self {
        self.filter = filter;
        self
    }

    /// Use `renderer` for the charts, `None` skips them
    pub fn with_renderer(mut self, renderer: Option<Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Writes the CSV export, the statistics and the charts.
    /// `None` when there is no history to analyze.
    pub async fn run(&self) -> Result<Option<Analysis>> {
        let history_path = self.out.history();
        let Some(history) = History::open(&history_path).await? else {
            warn!("History file {} not found", history_path.display());
            return Ok(None);
        };

        let results = history.results().iter().filter(|result| {
            self.filter
                .as_ref()
                .is_none_or(|filter| filter.is_match(&result.test_name))
        });
        let rows = MetricsRow::flatten(results);
        if rows.is_empty() {
            warn!("No job results to analyze in {}", history_path.display());
            return Ok(None);
        }

        let csv_path = self.out.metrics_csv();
        write_csv(&csv_path, &rows)?;
        info!("Metrics saved to {}", csv_path.display());

        let statistics = summarize(&rows);
        if let Some(renderer) = &self.renderer {
            let data = PlotData::new(&rows, &statistics);
            if let Err(err) = renderer.render(&self.out, &data).await {
                error!("Could not render plots: {err:#}");
            }
        }

        let stats_path = self.out.statistics();
        write_json_file(&stats_path, &statistics).await?;
        info!("Statistics saved to {}", stats_path.display());

        Ok(Some(Analysis { rows, statistics }))
    }
}
