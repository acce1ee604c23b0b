use serde::{Deserialize, Serialize};

/// Running mean and variance (Welford's algorithm).
#[derive(Debug, Clone, Default)]
pub struct Accumulator {
    n_vals: usize,
    mean: f64,
    diff_2_sum: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccumulatorReport {
    pub n_vals: usize,
    pub mean: f64,
    pub std_dev: f64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, val: f64) {
        self.n_vals += 1;

        let diff_a = val - self.mean;
        self.mean += diff_a / self.n_vals as f64;

        let diff_b = val - self.mean;
        self.diff_2_sum += diff_a * diff_b;
    }

    /// Mean and sample standard deviation, `None` before any value is added.
    ///
    /// A single value has no spread, so its standard deviation is zero.
    pub fn report(&self) -> Option<AccumulatorReport> {
        if self.n_vals == 0 {
            return None;
        }
        let std_dev = if self.n_vals > 1 {
            (self.diff_2_sum / (self.n_vals as f64 - 1.0)).sqrt()
        } else {
            0.0
        };
        Some(AccumulatorReport {
            n_vals: self.n_vals,
            mean: self.mean,
            std_dev,
        })
    }
}

impl FromIterator<f64> for Accumulator {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut acc = Self::new();
        for val in iter {
            acc.add(val);
        }
        acc
    }
}

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(vals: &[f64]) -> Option<f64> {
    if vals.is_empty() {
        return None;
    }
    Some(vals.iter().sum::<f64>() / vals.len() as f64)
}

/// Harmonic mean of strictly positive values, `None` for an empty slice.
pub fn harmonic_mean(vals: &[f64]) -> Option<f64> {
    if vals.is_empty() {
        return None;
    }
    let inv_sum: f64 = vals.iter().map(|&val| 1.0 / val).sum();
    Some(vals.len() as f64 / inv_sum)
}
