//! Host CPU utilization thresholds used by migration-aware placement.

use std::collections::VecDeque;

use serde::Serialize;

/// Minimal number of utilization samples required to compute dynamic threshold.
pub const MIN_HISTORY_FOR_DYNAMIC_THRESHOLD: usize = 10;

/// Statistic of host utilization history used by dynamic threshold.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub enum ThresholdMethod {
    /// Median absolute deviation.
    Mad,
    /// Interquartile range.
    Iqr,
}

/// Threshold of CPU utilization above which host is considered over-utilized.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub enum OverUtilizationThreshold {
    Static(f64),
    /// Threshold `1 - safety_parameter * statistic(history)`, adapting to utilization variability.
    /// The fallback value is used until enough history is collected.
    Dynamic {
        safety_parameter: f64,
        method: ThresholdMethod,
        fallback: f64,
    },
}

impl OverUtilizationThreshold {
    /// Returns threshold value for host with the specified utilization history.
    pub fn value(&self, history: &VecDeque<f64>) -> f64 {
        match *self {
            OverUtilizationThreshold::Static(value) => value,
            OverUtilizationThreshold::Dynamic {
                safety_parameter,
                method,
                fallback,
            } => {
                if history.len() < MIN_HISTORY_FOR_DYNAMIC_THRESHOLD {
                    return fallback;
                }
                let mut samples: Vec<f64> = history.iter().copied().collect();
                let statistic = match method {
                    ThresholdMethod::Mad => mad(&mut samples),
                    ThresholdMethod::Iqr => iqr(&mut samples),
                };
                (1. - safety_parameter * statistic).clamp(0., 1.)
            }
        }
    }
}

fn sort(samples: &mut [f64]) {
    samples.sort_by(|a, b| a.total_cmp(b));
}

/// Quantile of sorted samples with linear interpolation between closest ranks.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = (sorted.len() - 1) as f64 * q;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (pos - lower as f64)
}

/// Returns median absolute deviation of non-empty samples.
pub fn mad(samples: &mut [f64]) -> f64 {
    sort(samples);
    let median = quantile(samples, 0.5);
    let mut deviations: Vec<f64> = samples.iter().map(|x| (x - median).abs()).collect();
    sort(&mut deviations);
    quantile(&deviations, 0.5)
}

/// Returns interquartile range of non-empty samples.
pub fn iqr(samples: &mut [f64]) -> f64 {
    sort(samples);
    quantile(samples, 0.75) - quantile(samples, 0.25)
}
