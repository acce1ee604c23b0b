//! Monte Carlo aggregation of stochastic single-population runs.

use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::model::{Trajectory, is_extinct};
use crate::params::{PvaOptions, PvaParameters};
use crate::rng::StreamRng;
use crate::stats::Accumulator;
use crate::summary::{PercentileBands, PercentileSummary, percentile_bands, percentile_summary};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

/// Shared flag for cooperative cancellation of an aggregation.
///
/// Checked before each run starts; runs already in flight finish normally.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Terminal outcome of one stochastic run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub final_population: f64,
    pub extinction_year: Option<usize>,
    pub trajectory: Option<Trajectory>,
}

impl RunOutcome {
    fn from_trajectory(traj: Trajectory, retain: bool) -> Self {
        Self {
            final_population: traj.last(),
            extinction_year: traj.extinction_year(),
            trajectory: retain.then_some(traj),
        }
    }
}

/// Statistics of a population viability analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub simulations: usize,
    pub seed: u64,
    pub extinction_probability: f64,
    pub quasi_extinction_probability: f64,
    pub quasi_extinction_threshold: f64,
    pub mean_final_population: f64,
    pub final_population_std_dev: f64,
    /// Mean first year of extinction over the runs that went extinct.
    pub mean_time_to_extinction: Option<f64>,
    /// Percentiles of the first extinction year over the runs that went extinct.
    pub extinction_year_percentiles: Option<PercentileSummary>,
    pub percentile_bands: Option<PercentileBands>,
    #[serde(skip)]
    pub trajectories: Option<Vec<Trajectory>>,
}

/// Callback receiving `(completed, requested)` after every finished run.
pub type ProgressFn = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Runs independent stochastic trajectories and reduces them.
pub struct Aggregator {
    params: PvaParameters,
    opts: PvaOptions,
    cancel: CancelFlag,
    on_progress: Option<ProgressFn>,
}

impl Aggregator {
    /// Create an aggregator, rejecting invalid parameters up front.
    pub fn new(params: PvaParameters, opts: PvaOptions) -> Result<Self> {
        params.validate()?;
        opts.validate()?;
        Ok(Self {
            params,
            opts,
            cancel: CancelFlag::new(),
            on_progress: None,
        })
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Report progress to `on_progress`, which may also raise the cancel flag.
    pub fn with_progress(mut self, on_progress: ProgressFn) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    pub fn params(&self) -> &PvaParameters {
        &self.params
    }

    pub fn options(&self) -> &PvaOptions {
        &self.opts
    }

    /// Perform every run and return the aggregated statistics.
    ///
    /// # Errors
    /// Returns [`Error::Cancelled`] if the cancel flag was raised before all
    /// runs started, or the first run error in run order.
    pub fn run(&self) -> Result<SimulationResult> {
        let seed = match self.opts.seed {
            Some(seed) => seed,
            None => StreamRng::from_os_rng()?.next_seed(),
        };
        let n_runs = self.params.simulations;
        log::info!(
            "running {n_runs} simulations over {} years (seed {seed})",
            self.params.years
        );

        let n_done = AtomicUsize::new(0);
        let slots: Vec<Option<Result<RunOutcome>>> = if self.opts.parallel {
            (0..n_runs)
                .into_par_iter()
                .map(|i_run| self.perform_run(seed, i_run, &n_done))
                .collect()
        } else {
            (0..n_runs)
                .map(|i_run| self.perform_run(seed, i_run, &n_done))
                .collect()
        };

        let mut outcomes = Vec::with_capacity(n_runs);
        for slot in slots {
            match slot {
                Some(outcome) => outcomes.push(outcome?),
                None => {
                    let completed = n_done.load(Ordering::Relaxed);
                    log::warn!("cancelled after {completed} of {n_runs} runs");
                    return Err(Error::Cancelled {
                        completed,
                        requested: n_runs,
                    });
                }
            }
        }

        let result = summarize(outcomes, &self.opts, seed)?;
        log::info!(
            "extinction probability {:.4}, mean final population {:.2}",
            result.extinction_probability,
            result.mean_final_population
        );
        Ok(result)
    }

    fn perform_run(
        &self,
        seed: u64,
        i_run: usize,
        n_done: &AtomicUsize,
    ) -> Option<Result<RunOutcome>> {
        if self.cancel.is_cancelled() {
            return None;
        }

        let rng = StreamRng::for_run(seed, i_run as u64);
        let outcome = Engine::new(&self.params, rng)
            .perform_simulation()
            .map(|traj| RunOutcome::from_trajectory(traj, self.opts.retain_trajectories));

        let done = n_done.fetch_add(1, Ordering::Relaxed) + 1;
        let n_runs = self.params.simulations;
        if done % (n_runs / 10).max(1) == 0 {
            let progress = 100.0 * done as f64 / n_runs as f64;
            log::info!("completed {progress:06.2}%");
        }
        if let Some(on_progress) = &self.on_progress {
            on_progress(done, n_runs);
        }

        Some(outcome)
    }
}

/// Reduce run outcomes to the reported statistics.
///
/// The reduction sorts before summing, so the result does not depend on
/// the order of `outcomes` (apart from the order of retained trajectories).
///
/// # Errors
/// Returns [`Error::InvalidArgument`] if `outcomes` is empty.
pub fn summarize(
    outcomes: Vec<RunOutcome>,
    opts: &PvaOptions,
    seed: u64,
) -> Result<SimulationResult> {
    let mut final_vec: Vec<f64> = outcomes.iter().map(|o| o.final_population).collect();
    final_vec.sort_by(f64::total_cmp);
    let Some(final_report) = final_vec.iter().copied().collect::<Accumulator>().report() else {
        return Err(Error::InvalidArgument("cannot summarize zero run outcomes".into()));
    };
    let n_runs = final_report.n_vals;
    let threshold = opts.quasi_extinction_threshold;

    let mut ext_year_vec: Vec<f64> = outcomes
        .iter()
        .filter_map(|o| o.extinction_year)
        .map(|year| year as f64)
        .collect();
    ext_year_vec.sort_by(f64::total_cmp);
    let n_extinct = ext_year_vec.len();
    let mean_time_to_extinction = ext_year_vec
        .iter()
        .copied()
        .collect::<Accumulator>()
        .report()
        .map(|report| report.mean);
    let extinction_year_percentiles = percentile_summary(&ext_year_vec, &opts.percentiles);

    let n_quasi = final_vec
        .iter()
        .filter(|&&pop| pop < threshold || is_extinct(pop))
        .count();

    let trajectories: Option<Vec<Trajectory>> = if opts.retain_trajectories {
        outcomes.into_iter().map(|o| o.trajectory).collect()
    } else {
        None
    };
    let percentile_bands = trajectories
        .as_ref()
        .map(|traj_vec| percentile_bands(traj_vec, &opts.percentiles));

    Ok(SimulationResult {
        simulations: n_runs,
        seed,
        extinction_probability: n_extinct as f64 / n_runs as f64,
        quasi_extinction_probability: n_quasi as f64 / n_runs as f64,
        quasi_extinction_threshold: threshold,
        mean_final_population: final_report.mean,
        final_population_std_dev: final_report.std_dev,
        mean_time_to_extinction,
        extinction_year_percentiles,
        percentile_bands,
        trajectories,
    })
}
