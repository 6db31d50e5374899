//! Fleet configuration file.

use std::{fs, num::NonZeroUsize, path::Path};

use itertools::Itertools;
use serde::Deserialize;

use crate::{
    core::{reserve::ReservePolicy, window::ChargingWindow},
    prelude::*,
    quantity::{power::Watts, ratios::Percent},
};

#[must_use]
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FleetConfig {
    #[serde(rename = "battery")]
    pub batteries: Vec<BatteryConfig>,

    /// Predictive grid charging is disabled when the section is missing.
    #[serde(default)]
    pub predictive_charging: Option<PredictiveChargingConfig>,
}

#[must_use]
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatteryConfig {
    /// Also used as the battery key in the telemetry and state files.
    pub name: String,

    #[serde(rename = "max_soc_percent", default = "BatteryConfig::default_max_soc")]
    pub max_soc: Percent,

    /// Charge hysteresis is disabled when missing.
    #[serde(rename = "charge_hysteresis_percent", default)]
    pub charge_hysteresis: Option<Percent>,
}

impl BatteryConfig {
    const fn default_max_soc() -> Percent {
        Percent::HUNDRED
    }
}

#[must_use]
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PredictiveChargingConfig {
    pub windows: Vec<ChargingWindow>,

    pub min_reserve: ReservePolicy,

    #[serde(rename = "max_contracted_power_watts")]
    pub max_contracted_power: Watts,

    /// Number of completed days to average the consumption over.
    #[serde(default = "PredictiveChargingConfig::default_history_days")]
    pub history_days: NonZeroUsize,
}

impl PredictiveChargingConfig {
    pub const fn default_history_days() -> NonZeroUsize {
        NonZeroUsize::MIN.saturating_add(6)
    }
}

impl FleetConfig {
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("loading the configuration…");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read `{}`", path.display()))?;
        contents.parse()
    }

    fn validate(self) -> Result<Self> {
        ensure!(!self.batteries.is_empty(), "at least one battery must be configured");
        if let Some(name) = self.batteries.iter().map(|battery| &battery.name).duplicates().next() {
            bail!("battery `{name}` is configured more than once");
        }
        Ok(self)
    }
}

impl std::str::FromStr for FleetConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        toml::from_str::<Self>(s).context("failed to parse the configuration")?.validate()
    }
}
