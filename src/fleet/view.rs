use serde::Serialize;

use crate::{
    core::{
        aggregate::SystemAggregate,
        charger::GridChargeDecision,
        history::DailyConsumption,
        hysteresis::HysteresisDiagnostics,
        telemetry::BatterySnapshot,
        window::ChargingWindow,
    },
    quantity::{energy::KilowattHours, power::Watts, ratios::Percent},
};

/// Read-only snapshot of everything the fleet knows, published after each change.
///
/// Consumers only ever see complete views; `version` increases with every publication.
#[must_use]
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FleetView {
    pub version: u64,
    pub aggregate: SystemAggregate,
    pub batteries: Vec<BatteryView>,

    /// Missing when predictive charging is disabled.
    pub charging: Option<ChargingView>,
}

#[must_use]
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BatteryView {
    pub name: String,
    pub snapshot: Option<BatterySnapshot>,
    pub stored_energy: Option<KilowattHours>,
    pub round_trip_efficiency: Option<Percent>,

    /// Missing when the battery has no charge hysteresis configured.
    pub hysteresis: Option<HysteresisDiagnostics>,
}

#[must_use]
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChargingView {
    pub decision: Option<GridChargeDecision>,
    pub windows: Vec<ChargingWindow>,
    pub max_contracted_power: Watts,
    pub average_consumption: Option<KilowattHours>,
    pub daily_consumption_history: Vec<DailyConsumption>,
    pub history_days: usize,
}
