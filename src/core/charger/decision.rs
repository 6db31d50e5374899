use serde::{Deserialize, Serialize, Serializer};

use crate::quantity::{energy::KilowattHours, power::Watts, ratios::Percent};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, derive_more::Display)]
pub enum DecisionReason {
    #[display("insufficient data")]
    #[serde(rename = "insufficient data")]
    InsufficientData,

    #[display("outside charging window")]
    #[serde(rename = "outside charging window")]
    OutsideChargingWindow,

    #[display("sufficient stored energy")]
    #[serde(rename = "sufficient stored energy")]
    SufficientStoredEnergy,

    #[display("deficit projected, in slot, stored energy below cutoff")]
    #[serde(rename = "deficit projected, in slot, stored energy below cutoff")]
    DeficitProjected,
}

/// Every intermediate quantity behind a decision.
///
/// Serialized as the flat mapping the host persists and displays.
#[must_use]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
pub struct DecisionRecord {
    #[serde(rename = "stored_energy_kwh", serialize_with = "serialize_energy")]
    pub stored_energy: Option<KilowattHours>,

    #[serde(rename = "usable_energy_kwh", serialize_with = "serialize_energy")]
    pub usable_energy: Option<KilowattHours>,

    #[serde(rename = "min_reserve_kwh", serialize_with = "serialize_energy")]
    pub min_reserve: Option<KilowattHours>,

    #[serde(rename = "cutoff_energy_kwh", serialize_with = "serialize_energy")]
    pub cutoff_energy: Option<KilowattHours>,

    #[serde(serialize_with = "serialize_percent")]
    pub effective_min_soc: Option<Percent>,

    #[serde(rename = "avg_consumption_kwh", serialize_with = "serialize_energy")]
    pub average_consumption: Option<KilowattHours>,

    #[serde(rename = "total_available_kwh", serialize_with = "serialize_energy")]
    pub total_available: Option<KilowattHours>,

    #[serde(rename = "energy_deficit_kwh", serialize_with = "serialize_energy")]
    pub energy_deficit: Option<KilowattHours>,

    #[serde(rename = "solar_forecast_kwh", serialize_with = "serialize_energy")]
    pub solar_forecast: Option<KilowattHours>,

    pub reason: DecisionReason,
}

#[expect(clippy::ref_option)]
fn serialize_energy<S: Serializer>(
    energy: &Option<KilowattHours>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    energy.map(|energy| energy.round_to(3)).serialize(serializer)
}

#[expect(clippy::ref_option)]
fn serialize_percent<S: Serializer>(
    percent: &Option<Percent>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    percent.map(|percent| percent.round_to(1)).serialize(serializer)
}

/// Latest verdict of the predictive charger.
#[must_use]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GridChargeDecision {
    pub grid_charging_active: bool,
    pub in_charging_slot: bool,

    /// The verdict comes from the manual override rather than from the record.
    pub overridden: bool,

    /// Grid power needed to cover the deficit before the window closes, when charging.
    pub charge_power: Option<Watts>,

    pub last_evaluation_soc: Option<Percent>,

    pub record: DecisionRecord,
}

impl GridChargeDecision {
    /// Decision carried over from the previous run, before anything has been evaluated.
    pub const fn restored(record: DecisionRecord) -> Self {
        Self {
            grid_charging_active: false,
            in_charging_slot: false,
            overridden: false,
            charge_power: None,
            last_evaluation_soc: None,
            record,
        }
    }
}
