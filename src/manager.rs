use crate::config::Config;
use crate::engine::simulate_growth;
use crate::estimators::{
    allelic_richness, detect_bottleneck, effective_population_size, hardy_weinberg,
    inbreeding_coefficients, project_growth,
};
use crate::metapop::simulate_metapopulation;
use crate::model::Trajectory;
use crate::monte_carlo::{Aggregator, CancelFlag, SimulationResult};
use anyhow::{Context, Result, bail};
use rmp_serde::encode;
use serde_json::{Map, Value, json};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

/// Analyses selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Analysis {
    Growth,
    Pva,
    Metapopulation,
    Genetics,
    All,
}

/// Runs the analyses of a scenario and collects their reports.
pub struct Manager {
    cfg: Config,
    cancel: CancelFlag,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(config_file: P) -> Result<Self> {
        let cfg = Config::from_file(config_file).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");
        Ok(Self::from_config(cfg))
    }

    pub fn from_config(cfg: Config) -> Self {
        Self {
            cfg,
            cancel: CancelFlag::new(),
        }
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.cfg
    }

    /// Flag that aborts a running viability analysis when raised.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn run(&self, analysis: Analysis) -> Result<Value> {
        let mut report = Map::new();
        let all = analysis == Analysis::All;

        if analysis == Analysis::Growth || (all && self.cfg.growth.is_some()) {
            report.insert("growth".into(), self.run_growth()?);
        }
        if analysis == Analysis::Pva || (all && self.cfg.pva.is_some()) {
            let result = self.run_pva()?;
            report.insert("pva".into(), serde_json::to_value(result)?);
        }
        if analysis == Analysis::Metapopulation || (all && self.cfg.metapopulation.is_some()) {
            report.insert("metapopulation".into(), self.run_metapopulation()?);
        }
        if analysis == Analysis::Genetics || (all && self.cfg.has_genetics()) {
            report.insert("genetics".into(), self.run_genetics()?);
        }

        Ok(Value::Object(report))
    }

    pub fn run_growth(&self) -> Result<Value> {
        let Some(params) = &self.cfg.growth else {
            bail!("config has no [growth] table");
        };
        let projection = project_growth(params).context("failed to project growth")?;
        let simulated = simulate_growth(params).context("failed to simulate growth")?;
        Ok(json!({
            "projection": projection,
            "simulated_population": simulated.values(),
        }))
    }

    pub fn run_pva(&self) -> Result<SimulationResult> {
        let Some(params) = &self.cfg.pva else {
            bail!("config has no [pva] table");
        };
        let aggregator = Aggregator::new(params.clone(), self.cfg.pva_options.clone())
            .context("failed to construct aggregator")?
            .with_cancel_flag(self.cancel.clone());
        let result = aggregator.run().context("failed to run viability analysis")?;
        Ok(result)
    }

    pub fn run_metapopulation(&self) -> Result<Value> {
        let Some(params) = &self.cfg.metapopulation else {
            bail!("config has no [metapopulation] table");
        };
        let result =
            simulate_metapopulation(params).context("failed to simulate metapopulation")?;
        Ok(serde_json::to_value(result)?)
    }

    pub fn run_genetics(&self) -> Result<Value> {
        if !self.cfg.has_genetics() {
            bail!("config has no genetics tables");
        }

        let mut report = Map::new();
        if let Some(input) = &self.cfg.effective_population {
            let result =
                effective_population_size(input).context("failed to compute effective size")?;
            report.insert("effective_population".into(), serde_json::to_value(result)?);
        }
        if let Some(input) = &self.cfg.bottleneck {
            let result = detect_bottleneck(input, &self.cfg.severity_bands)
                .context("failed to detect bottleneck")?;
            report.insert("bottleneck".into(), serde_json::to_value(result)?);
        }
        if let Some(input) = &self.cfg.allelic_richness {
            let result = allelic_richness(input).context("failed to compute allelic richness")?;
            report.insert("allelic_richness".into(), serde_json::to_value(result)?);
        }
        if let Some(input) = &self.cfg.inbreeding {
            let result =
                inbreeding_coefficients(input).context("failed to compute F-statistics")?;
            report.insert("inbreeding".into(), serde_json::to_value(result)?);
        }
        if let Some(input) = &self.cfg.hardy_weinberg {
            let result =
                hardy_weinberg(input).context("failed to test hardy-weinberg equilibrium")?;
            report.insert("hardy_weinberg".into(), serde_json::to_value(result)?);
        }

        Ok(Value::Object(report))
    }
}

/// Save a set of trajectories to a MessagePack file.
pub fn save_trajectories<P: AsRef<Path>>(file: P, traj_vec: &[Trajectory]) -> Result<()> {
    let file = file.as_ref();
    let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
    let mut writer = BufWriter::new(file);
    encode::write(&mut writer, &traj_vec).context("failed to serialize trajectories")?;
    writer.flush().context("failed to flush writer stream")?;
    Ok(())
}

/// Save a JSON report.
pub fn save_report<P: AsRef<Path>>(file: P, report: &Value) -> Result<()> {
    let file = file.as_ref();
    let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, report)?;
    writer.flush().context("failed to flush writer stream")?;
    Ok(())
}
