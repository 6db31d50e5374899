use serde::{Deserialize, Serialize};

use crate::quantity::{energy::KilowattHours, power::Watts, ratios::Percent};

/// Latest known state of a single battery.
///
/// Any field may be unknown at any time, and unknown is never the same as zero.
#[must_use]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
#[serde(default, deny_unknown_fields)]
pub struct BatterySnapshot {
    #[serde(rename = "soc_percent")]
    pub soc: Option<Percent>,

    /// Positive when charging, negative when discharging.
    #[serde(rename = "power_watts")]
    pub power: Option<Watts>,

    /// Installed capacity.
    #[serde(rename = "total_energy_kwh")]
    pub total_energy: Option<KilowattHours>,

    #[serde(rename = "daily_charging_energy_kwh")]
    pub daily_charging_energy: Option<KilowattHours>,

    #[serde(rename = "daily_discharging_energy_kwh")]
    pub daily_discharging_energy: Option<KilowattHours>,
}

impl BatterySnapshot {
    /// Energy currently stored in the battery, unknown for a non-positive capacity.
    pub fn stored_energy(&self) -> Option<KilowattHours> {
        let capacity = self.total_energy.filter(|capacity| *capacity > KilowattHours::ZERO)?;
        Some((capacity * self.soc?).round_to(3))
    }

    /// Today's discharged energy relative to today's charged energy.
    pub fn round_trip_efficiency(&self) -> Option<Percent> {
        let charged = self.daily_charging_energy.filter(|energy| *energy > KilowattHours::ZERO)?;
        let discharged = self.daily_discharging_energy?;
        Some(Percent(discharged / charged * 100.0).round_to(2))
    }
}
