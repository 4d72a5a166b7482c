use crate::core::competitor::CompetitorPars;
use crate::core::network::SamplerPars;
use crate::core::race::RacePars;
use anyhow::Context;
use helpers::general::InputValueError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::path::Path;

/// SimPars is used to store all other parameter structs.
/// * `seed` - Seed for obstacle generation and network sampling (random if not set)
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SimPars {
    #[serde(default)]
    pub race_pars: RacePars,
    #[serde(default)]
    pub sampler_pars: SamplerPars,
    #[serde(default = "default_competitors")]
    pub competitors: Vec<CompetitorPars>,
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_competitors() -> Vec<CompetitorPars> {
    vec![CompetitorPars::new("player"), CompetitorPars::new("opponent")]
}

impl Default for SimPars {
    /// Hardcoded two-competitor race.
    fn default() -> Self {
        SimPars {
            race_pars: RacePars::default(),
            sampler_pars: SamplerPars::default(),
            competitors: default_competitors(),
            seed: None,
        }
    }
}

impl SimPars {
    pub fn validate(&self) -> anyhow::Result<()> {
        self.race_pars
            .validate()
            .context("Invalid race parameters!")?;
        self.sampler_pars
            .validate()
            .context("Invalid sampler parameters!")?;

        if self.competitors.is_empty() {
            return Err(InputValueError::new("at least one competitor is required"))
                .context("Invalid competitor list!");
        }
        let mut ids = HashSet::with_capacity(self.competitors.len());
        for competitor in self.competitors.iter() {
            if !ids.insert(competitor.id.as_str()) {
                return Err(InputValueError::new(format!(
                    "competitor id {} is used twice",
                    competitor.id
                )))
                .context("Invalid competitor list!");
            }
        }
        Ok(())
    }
}

/// read_sim_pars reads the JSON file and decodes the JSON string into the simulation parameters
/// struct. Missing sections fall back to their defaults.
pub fn read_sim_pars(filepath: &Path) -> anyhow::Result<SimPars> {
    let fh = OpenOptions::new()
        .read(true)
        .open(filepath)
        .context(format!(
            "Failed to open parameter file {}!",
            filepath.display()
        ))?;
    let pars: SimPars = serde_json::from_reader(&fh).context(format!(
        "Failed to parse parameter file {}!",
        filepath.display()
    ))?;
    pars.validate()
        .context(format!("Invalid parameter file {}!", filepath.display()))?;
    Ok(pars)
}
