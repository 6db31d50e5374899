use std::{collections::BTreeMap, fs, path::{Path, PathBuf}};

use clap::Parser;

use crate::{
    config::FleetConfig,
    core::telemetry::BatterySnapshot,
    fleet::{ExternalInputs, Fleet, PersistedState},
    prelude::*,
    quantity::energy::KilowattHours,
    service::TelemetryUpdate,
};

#[derive(Parser)]
pub struct FleetArgs {
    /// Fleet configuration file.
    #[clap(long = "config", env = "VIXEN_CONFIG", default_value = "vixen.toml")]
    pub config_path: PathBuf,

    /// State file, created on the first save.
    #[clap(long = "state", env = "VIXEN_STATE", default_value = "state.json")]
    pub state_path: PathBuf,

    /// JSON file with the latest snapshot of each battery, keyed by battery name.
    #[clap(long = "telemetry", env = "VIXEN_TELEMETRY", default_value = "telemetry.json")]
    pub telemetry_path: PathBuf,
}

impl FleetArgs {
    /// Build the fleet from the configuration and restore it from the state file.
    pub fn load_fleet(&self) -> Result<Fleet> {
        let config = FleetConfig::from_path(&self.config_path)?;
        let mut fleet = Fleet::try_new(&config)?;
        fleet.restore(PersistedState::load(&self.state_path)?)?;
        Ok(fleet)
    }

    /// Read the telemetry file and match it against the configured batteries.
    ///
    /// Batteries missing from the file are reported as unavailable.
    pub fn read_updates(&self, fleet: &Fleet) -> Result<Vec<TelemetryUpdate>> {
        let mut telemetry = read_telemetry(&self.telemetry_path)?;
        let updates = fleet
            .battery_names()
            .enumerate()
            .map(|(battery, name)| {
                let snapshot = telemetry.remove(name).flatten();
                if snapshot.is_none() {
                    warn!(name, "battery is unavailable");
                }
                TelemetryUpdate { battery, snapshot }
            })
            .collect();
        for name in telemetry.keys() {
            warn!(name, "ignoring an unknown battery");
        }
        Ok(updates)
    }
}

/// Battery snapshots by battery name, `null` for an unavailable battery.
pub fn read_telemetry(path: &Path) -> Result<BTreeMap<String, Option<BatterySnapshot>>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read `{}`", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("failed to deserialize `{}`", path.display()))
}

#[derive(Copy, Clone, Parser)]
pub struct InputArgs {
    /// Expected solar production until the next charging window.
    #[clap(long = "solar-forecast-kwh", env = "SOLAR_FORECAST_KWH")]
    pub solar_forecast: Option<KilowattHours>,

    /// Force grid charging on or off regardless of the projection.
    #[clap(long = "force-charging", env = "FORCE_CHARGING")]
    pub force_charging: Option<bool>,
}

impl From<InputArgs> for ExternalInputs {
    fn from(args: InputArgs) -> Self {
        Self { solar_forecast: args.solar_forecast, forced_charging: args.force_charging }
    }
}
