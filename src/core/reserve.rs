use serde::{Deserialize, Serialize};

use crate::{
    prelude::*,
    quantity::{energy::KilowattHours, ratios::Percent},
};

/// Minimum stored energy the system must not plan to consume.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservePolicy {
    /// Fixed share of the total capacity.
    Percent(Percent),

    /// Fixed amount of energy, converted to a share of whatever capacity is reporting.
    #[serde(rename = "energy_kwh")]
    Energy(KilowattHours),
}

impl ReservePolicy {
    pub fn validate(self) -> Result<Self> {
        match self {
            Self::Percent(percent) => {
                ensure!(
                    percent >= Percent::ZERO && percent <= Percent::HUNDRED,
                    "reserve must be within [0%, 100%], got {percent}",
                );
            }
            Self::Energy(energy) => {
                ensure!(energy >= KilowattHours::ZERO, "reserve must not be negative, got {energy}");
            }
        }
        Ok(self)
    }

    /// Reserve expressed as a state of charge of the given capacity.
    pub fn effective_min_soc(self, capacity: KilowattHours) -> Percent {
        match self {
            Self::Percent(percent) => percent,
            Self::Energy(energy) if energy <= KilowattHours::ZERO => Percent::ZERO,
            Self::Energy(_) if capacity <= KilowattHours::ZERO => Percent::HUNDRED,
            Self::Energy(energy) => Percent(energy / capacity * 100.0).min(Percent::HUNDRED),
        }
    }
}
