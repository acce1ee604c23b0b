//! Conversion of raw simulation output into reported statistics.
//!
//! Everything here is a pure function of its inputs.

use crate::model::Trajectory;
use crate::params::SeverityBands;
use serde::{Deserialize, Serialize};

/// Ordered table mapping numeric ranges to labels.
///
/// Bands are sorted by lower bound; a value takes the label of the highest
/// band it reaches, or `below` if it reaches none.
#[derive(Debug, Clone)]
pub struct ThresholdTable<T> {
    below: T,
    bands: Vec<(f64, T)>,
    inclusive: bool,
}

impl<T: Copy> ThresholdTable<T> {
    /// Bands reached when `value >= lower`.
    pub fn at_least(below: T, bands: Vec<(f64, T)>) -> Self {
        Self::new(below, bands, true)
    }

    /// Bands reached when `value > lower`.
    pub fn above(below: T, bands: Vec<(f64, T)>) -> Self {
        Self::new(below, bands, false)
    }

    fn new(below: T, mut bands: Vec<(f64, T)>, inclusive: bool) -> Self {
        bands.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self {
            below,
            bands,
            inclusive,
        }
    }

    pub fn classify(&self, value: f64) -> T {
        self.bands
            .iter()
            .rev()
            .find(|(lower, _)| {
                if self.inclusive {
                    value >= *lower
                } else {
                    value > *lower
                }
            })
            .map_or(self.below, |&(_, label)| label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BottleneckSeverity {
    None,
    Mild,
    Moderate,
    Severe,
}

impl BottleneckSeverity {
    pub fn table(bands: &SeverityBands) -> ThresholdTable<Self> {
        ThresholdTable::at_least(
            Self::None,
            vec![
                (bands.mild, Self::Mild),
                (bands.moderate, Self::Moderate),
                (bands.severe, Self::Severe),
            ],
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum InbreedingLevel {
    None,
    Low,
    Moderate,
    High,
}

impl InbreedingLevel {
    pub fn table() -> ThresholdTable<Self> {
        ThresholdTable::above(
            Self::None,
            vec![(0.0, Self::Low), (0.05, Self::Moderate), (0.1, Self::High)],
        )
    }
}

/// Percentile of already sorted values, interpolating linearly between ranks.
///
/// Returns `None` for an empty slice.
pub fn percentile(sorted: &[f64], pct: f64) -> Option<f64> {
    let n_vals = sorted.len();
    if n_vals == 0 {
        return None;
    }
    let rank = (pct / 100.0).clamp(0.0, 1.0) * (n_vals - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Per-year percentiles across a set of trajectories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentileBands {
    pub percentiles: Vec<f64>,
    /// `values[i_pct][year]`.
    pub values: Vec<Vec<f64>>,
}

/// Selected percentiles of one sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentileSummary {
    pub percentiles: Vec<f64>,
    pub values: Vec<f64>,
}

/// Summarize already sorted values, `None` for an empty slice.
pub fn percentile_summary(sorted: &[f64], percentiles: &[f64]) -> Option<PercentileSummary> {
    let values = percentiles
        .iter()
        .map(|&pct| percentile(sorted, pct))
        .collect::<Option<Vec<f64>>>()?;
    Some(PercentileSummary {
        percentiles: percentiles.to_vec(),
        values,
    })
}

/// Compute percentile bands; trajectories are expected to share one length.
pub fn percentile_bands(traj_vec: &[Trajectory], percentiles: &[f64]) -> PercentileBands {
    let n_years = traj_vec.iter().map(|traj| traj.values().len()).min().unwrap_or(0);
    let mut values = vec![Vec::with_capacity(n_years); percentiles.len()];

    let mut column = Vec::with_capacity(traj_vec.len());
    for year in 0..n_years {
        column.clear();
        column.extend(traj_vec.iter().map(|traj| traj.values()[year]));
        column.sort_by(f64::total_cmp);

        for (i_pct, &pct) in percentiles.iter().enumerate() {
            values[i_pct].push(percentile(&column, pct).unwrap_or(f64::NAN));
        }
    }

    PercentileBands {
        percentiles: percentiles.to_vec(),
        values,
    }
}

/// Round to a fixed number of decimals for presentation.
pub fn round_to(val: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (val * scale).round() / scale
}

/// Round every floating point number of a JSON report in place.
pub fn round_report(report: &mut serde_json::Value, decimals: u32) {
    match report {
        serde_json::Value::Number(num) if num.is_f64() => {
            if let Some(rounded) = num
                .as_f64()
                .and_then(|val| serde_json::Number::from_f64(round_to(val, decimals)))
            {
                *num = rounded;
            }
        }
        serde_json::Value::Array(vec) => {
            vec.iter_mut().for_each(|val| round_report(val, decimals));
        }
        serde_json::Value::Object(map) => {
            map.values_mut().for_each(|val| round_report(val, decimals));
        }
        _ => {}
    }
}
