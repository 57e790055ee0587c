use std::collections::BTreeMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::rows::MetricsRow;

/// Descriptive statistics of one metric, rounded to two decimals
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Describe {
    pub mean: f64,
    /// Sample standard deviation, undefined for a single value
    pub std: Option<f64>,
    pub min: f64,
    pub max: f64,
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

impl Describe {
    pub fn of(values: &[f64]) -> Self {
        if values.is_empty() {
            return Describe::default();
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let std = (values.len() > 1).then(|| {
            let var = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
            round2(var.sqrt())
        });
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Describe {
            mean: round2(mean),
            std,
            min: round2(min),
            max: round2(max),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestStatistics {
    pub samples: usize,
    pub read_iops: Describe,
    pub write_iops: Describe,
    pub read_latency_p95_us: Describe,
    pub write_latency_p95_us: Describe,
}

pub type Statistics = BTreeMap<String, TestStatistics>;

/// Per test statistics over IOPS and p95 latency
pub fn summarize(rows: &[MetricsRow]) -> Statistics {
    rows.iter()
        .into_group_map_by(|row| row.test_name.clone())
        .into_iter()
        .map(|(test_name, rows)| {
            let column = |value: fn(&MetricsRow) -> f64| {
                Describe::of(&rows.iter().map(|row| value(row)).collect::<Vec<_>>())
            };
            let stats = TestStatistics {
                samples: rows.len(),
                read_iops: column(|x| x.read_iops),
                write_iops: column(|x| x.write_iops),
                read_latency_p95_us: column(|x| x.read_latency_p95_us),
                write_latency_p95_us: column(|x| x.write_latency_p95_us),
            };
            (test_name, stats)
        })
        .collect()
}
