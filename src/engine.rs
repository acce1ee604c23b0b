//! Single-population simulation.

use crate::error::{Error, Result};
use crate::model::{GrowthLaw, Trajectory, is_extinct};
use crate::params::{GrowthParameters, PvaParameters};
use crate::rng::VariateSource;

/// Advance a population deterministically for `params.years` years.
///
/// Uses the exponential law when no carrying capacity is given and the
/// logistic law otherwise.
///
/// # Errors
/// Returns an error if the parameters are invalid or the population
/// stops being finite.
pub fn simulate_growth(params: &GrowthParameters) -> Result<Trajectory> {
    params.validate()?;

    let law = GrowthLaw::from_capacity(params.carrying_capacity.map(|k| k as f64));
    let mut traj = Trajectory::with_capacity(params.years);
    let mut pop = params.initial_population as f64;
    traj.push(pop);

    for year in 1..=params.years {
        pop = law.advance(pop, params.growth_rate);
        check_finite(pop, year)?;
        traj.push(pop);
    }

    Ok(traj)
}

/// Stochastic simulation engine for one PVA run.
///
/// Owns its variate source and trajectory buffer, so engines for different
/// runs share nothing and can run on different threads.
pub struct Engine<S> {
    law: GrowthLaw,
    growth_rate: f64,
    std_dev: f64,
    years: usize,
    pop: f64,
    extinct: bool,
    rng: S,
}

impl<S: VariateSource> Engine<S> {
    /// Create an engine at the initial population of `params`.
    ///
    /// The parameters are assumed to be validated already.
    pub fn new(params: &PvaParameters, rng: S) -> Self {
        Self {
            law: GrowthLaw::Logistic {
                capacity: params.carrying_capacity as f64,
            },
            growth_rate: params.growth_rate,
            std_dev: params.environmental_variance,
            years: params.years,
            pop: params.initial_population as f64,
            extinct: false,
            rng,
        }
    }

    /// Run every year of the horizon and return the trajectory.
    pub fn perform_simulation(mut self) -> Result<Trajectory> {
        let mut traj = Trajectory::with_capacity(self.years);
        traj.push(self.pop);

        for year in 1..=self.years {
            self.perform_step(year)?;
            traj.push(self.pop);
        }

        Ok(traj)
    }

    fn perform_step(&mut self, year: usize) -> Result<()> {
        // Extinction is absorbing.
        if self.extinct {
            return Ok(());
        }

        let rate = self.rng.next_normal(self.growth_rate, self.std_dev)?;
        let pop = self.law.advance(self.pop, rate);
        check_finite(pop, year)?;

        if is_extinct(pop) {
            self.pop = 0.0;
            self.extinct = true;
        } else {
            self.pop = pop;
        }

        Ok(())
    }
}

fn check_finite(pop: f64, year: usize) -> Result<()> {
    if !pop.is_finite() {
        return Err(Error::unstable(format!(
            "population is no longer finite at year {year}"
        )));
    }
    Ok(())
}
