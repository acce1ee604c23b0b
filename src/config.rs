use crate::params::{
    AllelicRichnessInput, BottleneckInput, EffectivePopulationInput, GrowthParameters,
    HardyWeinbergInput, InbreedingInput, MetapopulationParameters, PvaOptions, PvaParameters,
    SeverityBands,
};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Scenario configuration.
///
/// Loaded from a TOML file and validated before use. Every analysis is an
/// optional table; see [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Deterministic growth of a single population.
    pub growth: Option<GrowthParameters>,

    /// Population viability analysis.
    pub pva: Option<PvaParameters>,
    /// Monte Carlo options of the viability analysis.
    #[serde(default)]
    pub pva_options: PvaOptions,

    /// Metapopulation dynamics.
    pub metapopulation: Option<MetapopulationParameters>,

    /// Effective population size from the breeding sex ratio.
    pub effective_population: Option<EffectivePopulationInput>,
    /// Bottleneck detection.
    pub bottleneck: Option<BottleneckInput>,
    /// Severity bands used by bottleneck detection.
    #[serde(default)]
    pub severity_bands: SeverityBands,
    /// Rarefied allelic richness.
    pub allelic_richness: Option<AllelicRichnessInput>,
    /// F-statistics.
    pub inbreeding: Option<InbreedingInput>,
    /// Hardy-Weinberg equilibrium test.
    pub hardy_weinberg: Option<HardyWeinbergInput>,
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be TOML-encoded and contain a serialized [`Config`].
    /// Performs validation on all present tables before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;
        Self::from_toml(&contents)
    }

    /// Parse and validate a [`Config`] from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !self.has_analyses() {
            bail!("config must contain at least one analysis table");
        }

        if let Some(growth) = &self.growth {
            growth.validate().context("invalid growth parameters")?;
        }
        if let Some(pva) = &self.pva {
            pva.validate().context("invalid pva parameters")?;
        }
        self.pva_options
            .validate()
            .context("invalid pva options")?;
        if let Some(metapopulation) = &self.metapopulation {
            metapopulation
                .validate()
                .context("invalid metapopulation parameters")?;
        }
        if let Some(effective_population) = &self.effective_population {
            effective_population
                .validate()
                .context("invalid effective population input")?;
        }
        if let Some(bottleneck) = &self.bottleneck {
            bottleneck.validate().context("invalid bottleneck input")?;
        }
        self.severity_bands
            .validate()
            .context("invalid severity bands")?;
        if let Some(allelic_richness) = &self.allelic_richness {
            allelic_richness
                .validate()
                .context("invalid allelic richness input")?;
        }
        if let Some(inbreeding) = &self.inbreeding {
            inbreeding.validate().context("invalid inbreeding input")?;
        }
        if let Some(hardy_weinberg) = &self.hardy_weinberg {
            hardy_weinberg
                .validate()
                .context("invalid hardy-weinberg input")?;
        }

        Ok(())
    }

    pub fn has_analyses(&self) -> bool {
        self.growth.is_some()
            || self.pva.is_some()
            || self.metapopulation.is_some()
            || self.has_genetics()
    }

    pub fn has_genetics(&self) -> bool {
        self.effective_population.is_some()
            || self.bottleneck.is_some()
            || self.allelic_richness.is_some()
            || self.inbreeding.is_some()
            || self.hardy_weinberg.is_some()
    }
}
