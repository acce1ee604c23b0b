//! Deterministic metapopulation dynamics.
//!
//! Each year every patch first grows logistically with its own rate and
//! capacity, then exchanges migrants according to the migration matrix.
//! Migration acts on the post-growth populations. Diagonal entries of the
//! matrix (self-migration) are ignored.

use crate::error::{Error, Result};
use crate::model::{GrowthLaw, is_extinct};
use crate::params::MetapopulationParameters;
use serde::{Deserialize, Serialize};

/// Yearly state of every patch, starting at year 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetapopulationResult {
    pub years: Vec<usize>,
    pub total_population: Vec<f64>,
    /// Fraction of patches under the extinction threshold.
    pub extinction_risk: Vec<f64>,
    pub occupied_patches: Vec<usize>,
    /// `patch_populations[year][patch]`.
    pub patch_populations: Vec<Vec<f64>>,
}

/// Metapopulation simulator.
pub struct Metapopulation {
    law_vec: Vec<GrowthLaw>,
    rate_vec: Vec<f64>,
    mig_mat: Vec<Vec<f64>>,
    years: usize,
    pop_vec: Vec<f64>,
}

impl Metapopulation {
    /// Create a simulator, rejecting invalid parameters up front.
    pub fn new(params: &MetapopulationParameters) -> Result<Self> {
        params.validate()?;

        let n_patches = params.n_patches();
        if (0..n_patches).any(|i| params.migration_matrix[i][i] != 0.0) {
            log::warn!("ignoring non-zero self-migration entries on the matrix diagonal");
        }

        Ok(Self {
            law_vec: params
                .patch_capacities
                .iter()
                .map(|&capacity| GrowthLaw::Logistic { capacity })
                .collect(),
            rate_vec: params.growth_rates.clone(),
            mig_mat: params.migration_matrix.clone(),
            years: params.years,
            pop_vec: params.patch_populations.clone(),
        })
    }

    pub fn n_patches(&self) -> usize {
        self.pop_vec.len()
    }

    /// Run every year and return the per-year series.
    pub fn perform_simulation(mut self) -> Result<MetapopulationResult> {
        log::info!(
            "running metapopulation of {} patches over {} years",
            self.n_patches(),
            self.years
        );

        let mut result = MetapopulationResult {
            years: Vec::with_capacity(self.years + 1),
            total_population: Vec::with_capacity(self.years + 1),
            extinction_risk: Vec::with_capacity(self.years + 1),
            occupied_patches: Vec::with_capacity(self.years + 1),
            patch_populations: Vec::with_capacity(self.years + 1),
        };
        self.record(0, &mut result);

        let mut flow_vec = vec![0.0; self.n_patches()];
        for year in 1..=self.years {
            self.perform_step(&mut flow_vec)
                .map_err(|err| match err {
                    Error::NumericInstability(msg) => {
                        Error::NumericInstability(format!("{msg} at year {year}"))
                    }
                    err => err,
                })?;
            self.record(year, &mut result);
        }

        Ok(result)
    }

    fn perform_step(&mut self, flow_vec: &mut [f64]) -> Result<()> {
        // Local growth.
        for ((pop, law), &rate) in self.pop_vec.iter_mut().zip(&self.law_vec).zip(&self.rate_vec) {
            *pop = law.advance(*pop, rate);
        }

        // Net migration, computed from the post-growth snapshot.
        flow_vec.fill(0.0);
        for (i_src, row) in self.mig_mat.iter().enumerate() {
            let pop_src = self.pop_vec[i_src];
            for (i_dst, &frac) in row.iter().enumerate() {
                if i_dst == i_src {
                    continue;
                }
                let migrants = frac * pop_src;
                flow_vec[i_src] -= migrants;
                flow_vec[i_dst] += migrants;
            }
        }

        for (i_patch, (pop, &flow)) in self.pop_vec.iter_mut().zip(flow_vec.iter()).enumerate() {
            let next = *pop + flow;
            if !next.is_finite() {
                return Err(Error::unstable(format!(
                    "population of patch {i_patch} is no longer finite"
                )));
            }
            *pop = next.max(0.0);
        }

        Ok(())
    }

    fn record(&self, year: usize, result: &mut MetapopulationResult) {
        let n_extinct = self.pop_vec.iter().filter(|&&pop| is_extinct(pop)).count();
        result.years.push(year);
        result.total_population.push(self.pop_vec.iter().sum());
        result
            .extinction_risk
            .push(n_extinct as f64 / self.n_patches() as f64);
        result.occupied_patches.push(self.n_patches() - n_extinct);
        result.patch_populations.push(self.pop_vec.clone());
    }
}

/// Validate the parameters and run the metapopulation simulation.
pub fn simulate_metapopulation(params: &MetapopulationParameters) -> Result<MetapopulationResult> {
    Metapopulation::new(params)?.perform_simulation()
}
