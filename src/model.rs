//! Population model types.

use serde::{Deserialize, Serialize};

/// Population size below which a population counts as extinct.
///
/// Populations are tracked as real numbers, so a trajectory may approach
/// zero without ever reaching it. Anything under one individual is treated
/// as the absorbing extinction floor.
pub const EXTINCTION_THRESHOLD: f64 = 1.0;

pub fn is_extinct(pop: f64) -> bool {
    pop < EXTINCTION_THRESHOLD
}

/// Local growth law applied once per year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthLaw {
    /// `N(t+1) = N(t) * exp(r)`.
    Exponential,
    /// `N(t+1) = N(t) + r * N(t) * (1 - N(t) / K)`.
    Logistic { capacity: f64 },
}

impl GrowthLaw {
    pub fn from_capacity(capacity: Option<f64>) -> Self {
        match capacity {
            Some(capacity) => Self::Logistic { capacity },
            None => Self::Exponential,
        }
    }

    /// Population after one year at growth rate `rate`, floored at zero.
    ///
    /// Non-finite values are passed through for the caller to reject.
    pub fn advance(&self, pop: f64, rate: f64) -> f64 {
        let next = match *self {
            Self::Exponential => pop * rate.exp(),
            Self::Logistic { capacity } => pop + rate * pop * (1.0 - pop / capacity),
        };
        if next < 0.0 { 0.0 } else { next }
    }
}

/// Population sizes of one run, one entry per year starting at year 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pop_vec: Vec<f64>,
}

impl Trajectory {
    pub fn with_capacity(years: usize) -> Self {
        Self {
            pop_vec: Vec::with_capacity(years + 1),
        }
    }

    pub fn push(&mut self, pop: f64) {
        self.pop_vec.push(pop);
    }

    pub fn values(&self) -> &[f64] {
        &self.pop_vec
    }

    pub fn last(&self) -> f64 {
        self.pop_vec.last().copied().unwrap_or(0.0)
    }

    /// First year at which the population fell under the extinction threshold.
    pub fn extinction_year(&self) -> Option<usize> {
        self.pop_vec.iter().position(|&pop| is_extinct(pop))
    }
}
