use std::{collections::BTreeMap, fs, io::ErrorKind, path::Path};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{
    core::{charger::DecisionRecord, history::DailyConsumption},
    prelude::*,
};

/// State preserved between the application runs.
#[must_use]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedState {
    /// Charge hysteresis flag by battery name.
    pub hysteresis_active: BTreeMap<String, bool>,

    /// Completed days as `[date, kWh]` pairs, oldest first.
    ///
    /// Malformed entries are dropped one by one instead of failing the whole state.
    #[serde(deserialize_with = "deserialize_days")]
    pub daily_consumption_history: Vec<DailyConsumption>,

    /// Latest figure of the day in progress.
    #[serde(deserialize_with = "deserialize_day")]
    pub current_day: Option<DailyConsumption>,

    pub last_decision: Option<DecisionRecord>,
}

fn parse_day(value: Value) -> Option<DailyConsumption> {
    serde_json::from_value(value.clone())
        .inspect_err(|error| warn!(%value, "dropped a malformed history entry: {error:#}"))
        .ok()
}

fn deserialize_days<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<DailyConsumption>, D::Error> {
    Ok(Vec::<Value>::deserialize(deserializer)?.into_iter().filter_map(parse_day).collect())
}

fn deserialize_day<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DailyConsumption>, D::Error> {
    Ok(Option::<Value>::deserialize(deserializer)?.and_then(parse_day))
}

impl PersistedState {
    /// Load the state, starting from scratch if there is none yet.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => {
                info!("loading the state…");
                serde_json::from_str(&contents)
                    .with_context(|| format!("failed to deserialize `{}`", path.display()))
            }
            Err(error) if error.kind() == ErrorKind::NotFound => {
                info!("no saved state, starting from scratch");
                Ok(Self::default())
            }
            Err(error) => Err(error).with_context(|| format!("failed to read `{}`", path.display())),
        }
    }

    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result {
        let path = path.as_ref();
        info!("saving the state…");
        let contents = serde_json::to_string_pretty(self).context("failed to serialize the state")?;
        fs::write(path, contents).with_context(|| format!("failed to write `{}`", path.display()))
    }
}
