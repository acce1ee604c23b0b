//! Closed-form estimators: growth projection, effective population size,
//! bottleneck detection, allelic richness, F-statistics and the
//! Hardy-Weinberg equilibrium test.

use crate::error::{Error, Result, bail_domain};
use crate::params::{
    AllelicRichnessInput, BottleneckInput, EffectivePopulationInput, GrowthParameters,
    HardyWeinbergInput, InbreedingInput, SeverityBands,
};
use crate::stats::{harmonic_mean, mean};
use crate::summary::{BottleneckSeverity, InbreedingLevel};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthModel {
    Exponential,
    Logistic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthProjection {
    pub model: GrowthModel,
    pub years: Vec<usize>,
    pub population: Vec<f64>,
    pub growth_rate: f64,
    pub carrying_capacity: Option<u64>,
}

/// Project population size with the continuous-time growth solutions.
///
/// `N(t) = N0 e^(rt)` without a carrying capacity and
/// `N(t) = K N0 e^(rt) / (K + N0 (e^(rt) - 1))` with one.
pub fn project_growth(params: &GrowthParameters) -> Result<GrowthProjection> {
    params.validate()?;

    let n_0 = params.initial_population as f64;
    let rate = params.growth_rate;
    let model = match params.carrying_capacity {
        Some(_) => GrowthModel::Logistic,
        None => GrowthModel::Exponential,
    };

    let years: Vec<usize> = (0..=params.years).collect();
    let mut population = Vec::with_capacity(years.len());
    for &year in &years {
        let growth = (rate * year as f64).exp();
        let pop = match params.carrying_capacity {
            Some(capacity) => {
                let capacity = capacity as f64;
                let denom = capacity + n_0 * (growth - 1.0);
                if denom <= 0.0 {
                    return Err(Error::unstable(format!(
                        "logistic solution diverges at year {year}"
                    )));
                }
                capacity * n_0 * growth / denom
            }
            None => n_0 * growth,
        };
        if !pop.is_finite() {
            return Err(Error::unstable(format!(
                "population is no longer finite at year {year}"
            )));
        }
        population.push(pop);
    }

    Ok(GrowthProjection {
        model,
        years,
        population,
        growth_rate: rate,
        carrying_capacity: params.carrying_capacity,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectivePopulation {
    pub effective_population_size: f64,
    pub breeding_males: u64,
    pub breeding_females: u64,
    pub census_size: u64,
    /// Effective over census size.
    pub ne_ratio: f64,
}

/// Effective population size from the breeding sex ratio, `4 Nm Nf / (Nm + Nf)`.
pub fn effective_population_size(input: &EffectivePopulationInput) -> Result<EffectivePopulation> {
    input.validate()?;

    let census_size = input.breeding_males + input.breeding_females;
    if census_size == 0 {
        bail_domain!("effective population size is undefined without breeding adults");
    }
    let males = input.breeding_males as f64;
    let females = input.breeding_females as f64;
    let ne = 4.0 * males * females / (males + females);

    Ok(EffectivePopulation {
        effective_population_size: ne,
        breeding_males: input.breeding_males,
        breeding_females: input.breeding_females,
        census_size,
        ne_ratio: ne / census_size as f64,
    })
}

/// Effective size over fluctuating generations: the harmonic mean of sizes.
pub fn harmonic_mean_size(sizes: &[f64]) -> Result<f64> {
    for (idx, &size) in sizes.iter().enumerate() {
        if !(size.is_finite() && size > 0.0) {
            bail_domain!("sizes[{idx}] must be positive, but is {size}");
        }
    }
    harmonic_mean(sizes).ok_or_else(|| Error::domain("harmonic mean of an empty series"))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BottleneckResult {
    pub bottleneck_detected: bool,
    pub severity: BottleneckSeverity,
    pub minimum_size: f64,
    pub minimum_index: usize,
    pub peak_size: f64,
    pub reduction_percentage: f64,
    /// Generations from the minimum back to 90 % of the peak.
    pub recovery_generations: Option<u32>,
    /// Whether the recovery was observed in the series or projected.
    pub recovery_observed: bool,
    pub effective_population_size: f64,
}

/// Fraction of the pre-bottleneck peak that counts as recovered.
const RECOVERY_FRACTION: f64 = 0.9;

/// Detect a bottleneck in a series of historical population sizes.
///
/// The bottleneck is the first occurrence of the minimum; its reference is
/// the most recent peak at or before it.
pub fn detect_bottleneck(input: &BottleneckInput, bands: &SeverityBands) -> Result<BottleneckResult> {
    input.validate()?;
    bands.validate()?;
    let sizes = &input.sizes;

    let mut min_idx = 0;
    for (idx, &size) in sizes.iter().enumerate() {
        if size < sizes[min_idx] {
            min_idx = idx;
        }
    }
    let min_size = sizes[min_idx];

    let mut peak_size = sizes[0];
    for &size in &sizes[..=min_idx] {
        if size >= peak_size {
            peak_size = size;
        }
    }

    let reduction_percentage = (peak_size - min_size) / peak_size * 100.0;
    let severity = BottleneckSeverity::table(bands).classify(reduction_percentage);
    let bottleneck_detected = severity != BottleneckSeverity::None;

    let (recovery_generations, recovery_observed) = if bottleneck_detected {
        estimate_recovery(sizes, min_idx, peak_size)
    } else {
        (None, false)
    };

    Ok(BottleneckResult {
        bottleneck_detected,
        severity,
        minimum_size: min_size,
        minimum_index: min_idx,
        peak_size,
        reduction_percentage,
        recovery_generations,
        recovery_observed,
        effective_population_size: harmonic_mean_size(sizes)?,
    })
}

fn estimate_recovery(sizes: &[f64], min_idx: usize, peak_size: f64) -> (Option<u32>, bool) {
    let target = RECOVERY_FRACTION * peak_size;
    let after = &sizes[min_idx + 1..];
    if after.is_empty() {
        return (None, false);
    }

    if let Some(offset) = after.iter().position(|&size| size >= target) {
        return (Some(offset as u32 + 1), true);
    }

    // Not recovered yet: extrapolate the geometric growth since the minimum.
    let min_size = sizes[min_idx];
    let last = after[after.len() - 1];
    let rate = (last / min_size).ln() / after.len() as f64;
    if rate <= 0.0 || !rate.is_finite() {
        return (None, false);
    }
    let gens = ((target / min_size).ln() / rate).ceil();
    if gens.is_finite() && gens <= u32::MAX as f64 {
        (Some(gens as u32), false)
    } else {
        (None, false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllelicRichnessResult {
    pub observed_alleles: Vec<u64>,
    pub sample_sizes: Vec<u64>,
    pub rarefaction_size: u64,
    pub rarefied_richness: Vec<f64>,
    pub mean_richness: f64,
    pub expected_heterozygosity: Vec<f64>,
    pub mean_heterozygosity: f64,
}

/// Rarefied allelic richness and expected heterozygosity per locus.
///
/// Sample sizes count gene copies. Only allele numbers are known, so the
/// copies of a locus are split as evenly as possible between its alleles.
pub fn allelic_richness(input: &AllelicRichnessInput) -> Result<AllelicRichnessResult> {
    input.validate()?;
    let ref_size = input.reference_size();

    let mut rarefied_richness = Vec::with_capacity(input.allele_counts.len());
    let mut expected_heterozygosity = Vec::with_capacity(input.allele_counts.len());
    for (&n_alleles, &n_copies) in input.allele_counts.iter().zip(&input.sample_sizes) {
        let split = EvenSplit::new(n_alleles, n_copies);
        rarefied_richness.push(split.rarefied_richness(ref_size));
        expected_heterozygosity.push(split.expected_heterozygosity());
    }

    Ok(AllelicRichnessResult {
        observed_alleles: input.allele_counts.clone(),
        sample_sizes: input.sample_sizes.clone(),
        rarefaction_size: ref_size,
        mean_richness: mean(&rarefied_richness).unwrap_or(0.0),
        mean_heterozygosity: mean(&expected_heterozygosity).unwrap_or(0.0),
        rarefied_richness,
        expected_heterozygosity,
    })
}

/// `n_copies` gene copies split between `n_alleles` alleles: `n_large`
/// alleles carry `base + 1` copies, the rest carry `base`.
struct EvenSplit {
    n_copies: u64,
    base: u64,
    n_large: u64,
    n_small: u64,
}

impl EvenSplit {
    fn new(n_alleles: u64, n_copies: u64) -> Self {
        let base = n_copies / n_alleles;
        let n_large = n_copies % n_alleles;
        Self {
            n_copies,
            base,
            n_large,
            n_small: n_alleles - n_large,
        }
    }

    /// Expected number of distinct alleles in `ref_size` draws without
    /// replacement: `sum_i [1 - C(N - N_i, g) / C(N, g)]`.
    fn rarefied_richness(&self, ref_size: u64) -> f64 {
        let large = if self.n_large > 0 {
            self.n_large as f64 * (1.0 - self.prob_missing(self.base + 1, ref_size))
        } else {
            0.0
        };
        large + self.n_small as f64 * (1.0 - self.prob_missing(self.base, ref_size))
    }

    /// Probability that an allele with `n_own` copies is absent from `ref_size` draws.
    fn prob_missing(&self, n_own: u64, ref_size: u64) -> f64 {
        let n_other = self.n_copies - n_own;
        if n_other < ref_size {
            return 0.0;
        }
        (0..ref_size)
            .map(|j| (n_other - j) as f64 / (self.n_copies - j) as f64)
            .product()
    }

    /// `1 - sum_i p_i^2`.
    fn expected_heterozygosity(&self) -> f64 {
        let n_copies = self.n_copies as f64;
        let p_large = (self.base + 1) as f64 / n_copies;
        let p_small = self.base as f64 / n_copies;
        let homozygosity =
            self.n_large as f64 * p_large * p_large + self.n_small as f64 * p_small * p_small;
        (1.0 - homozygosity).max(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InbreedingResult {
    pub fis: f64,
    pub fst: f64,
    pub fit: f64,
    pub interpretation: InbreedingLevel,
}

/// Wright's F-statistics from observed and expected heterozygosities.
pub fn inbreeding_coefficients(input: &InbreedingInput) -> Result<InbreedingResult> {
    input.validate()?;

    let h_i = input.observed_heterozygosity;
    let h_s = mean(&input.subpopulation_heterozygosity).unwrap_or(h_i);
    let h_t = input.expected_heterozygosity;
    if h_s <= 0.0 {
        bail_domain!("mean subpopulation heterozygosity must be positive, but is {h_s}");
    }
    if h_t <= 0.0 {
        bail_domain!("expected heterozygosity must be positive, but is {h_t}");
    }

    let fis = (h_s - h_i) / h_s;
    Ok(InbreedingResult {
        fis,
        fst: (h_t - h_s) / h_t,
        fit: (h_t - h_i) / h_t,
        interpretation: InbreedingLevel::table().classify(fis),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardyWeinbergResult {
    pub individuals: u64,
    pub allele_frequencies: BTreeMap<String, f64>,
    /// Keyed by `"A/B"` with allele names in sorted order.
    pub observed_genotypes: BTreeMap<String, u64>,
    pub expected_genotypes: BTreeMap<String, f64>,
    pub chi_square: f64,
    pub degrees_of_freedom: usize,
    pub p_value: f64,
    pub in_equilibrium: bool,
}

/// Chi-square goodness-of-fit test of genotype counts against
/// Hardy-Weinberg proportions.
///
/// Alleles are those carried by at least one individual. Every genotype
/// they can form is tested, including ones never observed.
pub fn hardy_weinberg(input: &HardyWeinbergInput) -> Result<HardyWeinbergResult> {
    input.validate()?;

    let alleles: Vec<&str> = input.alleles().into_iter().collect();
    let n_indiv = input.individuals();

    let mut allele_counts: BTreeMap<&str, u64> = BTreeMap::new();
    let mut observed: BTreeMap<String, u64> = BTreeMap::new();
    for geno in input.genotypes.iter().filter(|geno| geno.count > 0) {
        let [a, b] = &geno.alleles;
        *allele_counts.entry(a.as_str()).or_default() += geno.count;
        *allele_counts.entry(b.as_str()).or_default() += geno.count;
        *observed.entry(genotype_key(a, b)).or_default() += geno.count;
    }

    let n_copies = 2.0 * n_indiv as f64;
    let freq_vec: Vec<f64> = alleles
        .iter()
        .map(|allele| allele_counts.get(allele).copied().unwrap_or(0) as f64 / n_copies)
        .collect();

    let mut expected = BTreeMap::new();
    let mut chi_square = 0.0;
    for (i, &a) in alleles.iter().enumerate() {
        for (j, &b) in alleles.iter().enumerate().skip(i) {
            let freq = if i == j {
                freq_vec[i] * freq_vec[i]
            } else {
                2.0 * freq_vec[i] * freq_vec[j]
            };
            let exp = freq * n_indiv as f64;
            let key = genotype_key(a, b);
            let obs = observed.get(&key).copied().unwrap_or(0) as f64;
            chi_square += (obs - exp) * (obs - exp) / exp;
            expected.insert(key, exp);
        }
    }
    if !chi_square.is_finite() {
        return Err(Error::unstable(format!(
            "chi-square statistic is not finite ({chi_square})"
        )));
    }

    let n_alleles = alleles.len();
    let degrees_of_freedom = n_alleles * (n_alleles - 1) / 2;
    let dist = ChiSquared::new(degrees_of_freedom as f64)
        .map_err(|err| Error::unstable(format!("invalid chi-square distribution: {err}")))?;
    let p_value = dist.sf(chi_square);

    Ok(HardyWeinbergResult {
        individuals: n_indiv,
        allele_frequencies: alleles
            .iter()
            .zip(&freq_vec)
            .map(|(&allele, &freq)| (allele.to_string(), freq))
            .collect(),
        observed_genotypes: observed,
        expected_genotypes: expected,
        chi_square,
        degrees_of_freedom,
        p_value,
        in_equilibrium: p_value > input.significance,
    })
}

fn genotype_key(a: &str, b: &str) -> String {
    if a <= b {
        format!("{a}/{b}")
    } else {
        format!("{b}/{a}")
    }
}
