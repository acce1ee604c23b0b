//! Parameter records accepted by the engine.
//!
//! Every record is plain data deserialized from a scenario file and checked
//! by its `validate` method before any computation uses it.

use crate::error::{Result, bail_domain, bail_structural};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt::Debug, ops::RangeBounds};

pub const MAX_POPULATION: u64 = 1_000_000_000_000;
pub const MAX_YEARS: usize = 10_000;
pub const MAX_SIMULATIONS: usize = 1_000_000;
pub const MAX_PATCHES: usize = 1_000;
pub const MAX_GROWTH_RATE: f64 = 10.0;
pub const MAX_LOGISTIC_RATE: f64 = 1.0;
pub const MAX_STD_DEV: f64 = 10.0;
pub const MAX_LOCI: usize = 10_000;
pub const MAX_SAMPLE_SIZE: u64 = 1_000_000;

/// Deterministic growth of a single population.
///
/// Without a carrying capacity the exponential model applies, with one the
/// logistic model does.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct GrowthParameters {
    pub initial_population: u64,
    pub growth_rate: f64,
    pub years: usize,
    #[serde(default)]
    pub carrying_capacity: Option<u64>,
}

impl GrowthParameters {
    pub fn validate(&self) -> Result<()> {
        check_num("initial_population", self.initial_population, 1..=MAX_POPULATION)?;
        check_num("growth_rate", self.growth_rate, -MAX_GROWTH_RATE..=MAX_GROWTH_RATE)?;
        check_num("years", self.years, 1..=MAX_YEARS)?;
        if let Some(capacity) = self.carrying_capacity {
            check_num("carrying_capacity", capacity, 1..=MAX_POPULATION)?;
            // Above this the discrete logistic step overshoots the capacity.
            check_num(
                "logistic growth_rate",
                self.growth_rate,
                -MAX_GROWTH_RATE..=MAX_LOGISTIC_RATE,
            )?;
        }
        Ok(())
    }
}

/// Stochastic population viability analysis.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct PvaParameters {
    pub initial_population: u64,
    /// Mean of the realized yearly growth rate.
    pub growth_rate: f64,
    /// Standard deviation of the realized yearly growth rate.
    pub environmental_variance: f64,
    pub carrying_capacity: u64,
    pub years: usize,
    pub simulations: usize,
}

impl PvaParameters {
    pub fn validate(&self) -> Result<()> {
        check_num("initial_population", self.initial_population, 1..=MAX_POPULATION)?;
        check_num("growth_rate", self.growth_rate, -MAX_GROWTH_RATE..=MAX_GROWTH_RATE)?;
        check_num(
            "environmental_variance",
            self.environmental_variance,
            0.0..=MAX_STD_DEV,
        )?;
        check_num("carrying_capacity", self.carrying_capacity, 1..=MAX_POPULATION)?;
        check_num("years", self.years, 1..=MAX_YEARS)?;
        check_num("simulations", self.simulations, 1..=MAX_SIMULATIONS)?;
        Ok(())
    }
}

/// Knobs of a Monte Carlo aggregation that do not change the model itself.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PvaOptions {
    /// Final-year population below which a run counts as quasi-extinct.
    pub quasi_extinction_threshold: f64,
    /// Base seed; each run derives its own stream from it.
    pub seed: Option<u64>,
    /// Keep every trajectory so percentile bands can be reported.
    pub retain_trajectories: bool,
    /// Percentiles (0 to 100) reported per year when trajectories are kept.
    pub percentiles: Vec<f64>,
    /// Spread runs over the rayon thread pool.
    pub parallel: bool,
}

impl Default for PvaOptions {
    fn default() -> Self {
        Self {
            quasi_extinction_threshold: 50.0,
            seed: None,
            retain_trajectories: false,
            percentiles: vec![5.0, 25.0, 50.0, 75.0, 95.0],
            parallel: true,
        }
    }
}

impl PvaOptions {
    pub fn validate(&self) -> Result<()> {
        check_num(
            "quasi_extinction_threshold",
            self.quasi_extinction_threshold,
            0.0..=MAX_POPULATION as f64,
        )?;
        for &pct in &self.percentiles {
            check_num("percentile", pct, 0.0..=100.0)?;
        }
        Ok(())
    }
}

/// Coupled patches exchanging migrants every year.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct MetapopulationParameters {
    pub patch_populations: Vec<f64>,
    pub patch_capacities: Vec<f64>,
    pub growth_rates: Vec<f64>,
    /// `migration_matrix[i][j]` is the fraction of patch `i` moving to patch `j`.
    pub migration_matrix: Vec<Vec<f64>>,
    pub years: usize,
}

impl MetapopulationParameters {
    pub fn n_patches(&self) -> usize {
        self.patch_populations.len()
    }

    pub fn validate(&self) -> Result<()> {
        // Structure first, so that numeric checks can index freely.
        let n_patches = self.n_patches();
        if n_patches == 0 {
            bail_structural!("patch_populations must not be empty");
        }
        if n_patches > MAX_PATCHES {
            bail_structural!("number of patches must be at most {MAX_PATCHES}, but is {n_patches}");
        }
        check_len("patch_capacities", &self.patch_capacities, n_patches)?;
        check_len("growth_rates", &self.growth_rates, n_patches)?;
        check_square("migration_matrix", &self.migration_matrix, n_patches)?;

        check_num("years", self.years, 1..=MAX_YEARS)?;
        for i_patch in 0..n_patches {
            let pop = self.patch_populations[i_patch];
            if !(pop.is_finite() && pop > 0.0) {
                bail_domain!("patch_populations[{i_patch}] must be positive, but is {pop}");
            }
            let capacity = self.patch_capacities[i_patch];
            if !(capacity.is_finite() && capacity > 0.0) {
                bail_domain!("patch_capacities[{i_patch}] must be positive, but is {capacity}");
            }
            check_num(
                "growth_rates",
                self.growth_rates[i_patch],
                -MAX_GROWTH_RATE..=MAX_GROWTH_RATE,
            )?;
        }
        check_migration(&self.migration_matrix)?;
        Ok(())
    }
}

/// Breeding adults of each sex.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct EffectivePopulationInput {
    pub breeding_males: u64,
    pub breeding_females: u64,
}

impl EffectivePopulationInput {
    pub fn validate(&self) -> Result<()> {
        check_num("breeding_males", self.breeding_males, 1..=MAX_POPULATION)?;
        check_num("breeding_females", self.breeding_females, 1..=MAX_POPULATION)?;
        Ok(())
    }
}

/// Historical population sizes, oldest first.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct BottleneckInput {
    pub sizes: Vec<f64>,
}

impl BottleneckInput {
    pub fn validate(&self) -> Result<()> {
        if self.sizes.len() < 2 {
            bail_structural!(
                "at least 2 population sizes are required, but got {}",
                self.sizes.len()
            );
        }
        check_positive("sizes", &self.sizes)
    }
}

/// Reduction percentages at which a bottleneck becomes mild, moderate or severe.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityBands {
    pub mild: f64,
    pub moderate: f64,
    pub severe: f64,
}

impl Default for SeverityBands {
    fn default() -> Self {
        Self {
            mild: 50.0,
            moderate: 75.0,
            severe: 90.0,
        }
    }
}

impl SeverityBands {
    pub fn validate(&self) -> Result<()> {
        check_num("mild", self.mild, 0.0..=100.0)?;
        check_num("moderate", self.moderate, 0.0..=100.0)?;
        check_num("severe", self.severe, 0.0..=100.0)?;
        if !(self.mild < self.moderate && self.moderate < self.severe) {
            bail_domain!(
                "severity bands must be strictly increasing, but are {} {} {}",
                self.mild,
                self.moderate,
                self.severe
            );
        }
        Ok(())
    }
}

/// Observed alleles and sampled gene copies per locus.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct AllelicRichnessInput {
    pub allele_counts: Vec<u64>,
    pub sample_sizes: Vec<u64>,
    /// Reference sample size; defaults to the smallest sample size.
    #[serde(default)]
    pub rarefaction_size: Option<u64>,
}

impl AllelicRichnessInput {
    pub fn validate(&self) -> Result<()> {
        let n_loci = self.allele_counts.len();
        if n_loci == 0 {
            bail_structural!("allele_counts must not be empty");
        }
        if n_loci > MAX_LOCI {
            bail_structural!("number of loci must be at most {MAX_LOCI}, but is {n_loci}");
        }
        check_len("sample_sizes", &self.sample_sizes, n_loci)?;

        for (i_locus, (&alleles, &size)) in
            self.allele_counts.iter().zip(&self.sample_sizes).enumerate()
        {
            check_num("allele_counts", alleles, 1..=MAX_SAMPLE_SIZE)?;
            check_num("sample_sizes", size, 1..=MAX_SAMPLE_SIZE)?;
            if alleles > size {
                bail_domain!(
                    "locus {i_locus} has {alleles} alleles but only {size} sampled gene copies"
                );
            }
        }

        let min_size = self.min_sample_size();
        if let Some(size) = self.rarefaction_size {
            check_num("rarefaction_size", size, 1..=min_size)?;
        }
        Ok(())
    }

    pub fn min_sample_size(&self) -> u64 {
        self.sample_sizes.iter().copied().min().unwrap_or(0)
    }

    pub fn reference_size(&self) -> u64 {
        self.rarefaction_size.unwrap_or_else(|| self.min_sample_size())
    }
}

/// Observed and expected heterozygosities for F-statistics.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct InbreedingInput {
    #[serde(default)]
    pub subpopulation_heterozygosity: Vec<f64>,
    pub observed_heterozygosity: f64,
    pub expected_heterozygosity: f64,
}

impl InbreedingInput {
    pub fn validate(&self) -> Result<()> {
        for &het in &self.subpopulation_heterozygosity {
            check_num("subpopulation_heterozygosity", het, 0.0..=1.0)?;
        }
        check_num("observed_heterozygosity", self.observed_heterozygosity, 0.0..=1.0)?;
        check_num("expected_heterozygosity", self.expected_heterozygosity, 0.0..=1.0)?;
        Ok(())
    }
}

/// Individuals observed with one diploid genotype.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct GenotypeCount {
    /// The two allele names; order does not matter.
    pub alleles: [String; 2],
    pub count: u64,
}

/// Genotype counts at one locus for the Hardy-Weinberg equilibrium test.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct HardyWeinbergInput {
    pub genotypes: Vec<GenotypeCount>,
    /// Significance level below which equilibrium is rejected.
    #[serde(default = "default_significance")]
    pub significance: f64,
}

fn default_significance() -> f64 {
    0.05
}

impl HardyWeinbergInput {
    pub fn validate(&self) -> Result<()> {
        if self.genotypes.is_empty() {
            bail_structural!("genotypes must not be empty");
        }
        for (i_geno, geno) in self.genotypes.iter().enumerate() {
            if geno.alleles.iter().any(|allele| allele.trim().is_empty()) {
                bail_structural!("genotypes[{i_geno}] has an empty allele name");
            }
            check_num("genotype count", geno.count, 0..=MAX_POPULATION)?;
        }
        check_num("significance", self.significance, 0.0..=1.0)?;

        if self.individuals() == 0 {
            bail_domain!("genotype counts must include at least one individual");
        }
        let n_alleles = self.alleles().len();
        if n_alleles < 2 {
            bail_domain!("at least 2 observed alleles are required, but got {n_alleles}");
        }
        Ok(())
    }

    pub fn individuals(&self) -> u64 {
        self.genotypes.iter().map(|geno| geno.count).sum()
    }

    /// Alleles carried by at least one observed individual, sorted by name.
    pub fn alleles(&self) -> BTreeSet<&str> {
        self.genotypes
            .iter()
            .filter(|geno| geno.count > 0)
            .flat_map(|geno| geno.alleles.iter().map(String::as_str))
            .collect()
    }
}

pub(crate) fn check_num<T, R>(name: &str, num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail_domain!("{name} must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

pub(crate) fn check_len<T>(name: &str, vec: &[T], exp_len: usize) -> Result<()> {
    let len = vec.len();
    if len != exp_len {
        bail_structural!("{name} length must be {exp_len}, but is {len}");
    }
    Ok(())
}

fn check_positive(name: &str, vec: &[f64]) -> Result<()> {
    for (idx, &val) in vec.iter().enumerate() {
        if !(val.is_finite() && val > 0.0) {
            bail_domain!("{name}[{idx}] must be positive, but is {val}");
        }
    }
    Ok(())
}

fn check_square(name: &str, mat: &[Vec<f64>], exp_dim: usize) -> Result<()> {
    let n_rows = mat.len();
    if n_rows != exp_dim {
        bail_structural!("{name} must have {exp_dim} rows, but has {n_rows}");
    }
    for (i_row, row) in mat.iter().enumerate() {
        if row.len() != exp_dim {
            bail_structural!(
                "{name} row {i_row} must have {exp_dim} columns, but has {}",
                row.len()
            );
        }
    }
    Ok(())
}

fn check_migration(mat: &[Vec<f64>]) -> Result<()> {
    // Outflow excludes the diagonal, which the simulator ignores.
    let tol = 1e-9;
    for (i_row, row) in mat.iter().enumerate() {
        let mut outflow = 0.0;
        for (i_col, &frac) in row.iter().enumerate() {
            if !(frac.is_finite() && frac >= 0.0) {
                bail_domain!("migration_matrix[{i_row}][{i_col}] must be non-negative, but is {frac}");
            }
            if i_col != i_row {
                outflow += frac;
            }
        }
        if outflow > 1.0 + tol {
            bail_domain!("migration_matrix row {i_row} sends out {outflow} of the patch, more than 1.0");
        }
    }
    Ok(())
}
