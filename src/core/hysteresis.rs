use serde::{Deserialize, Serialize};

use crate::{prelude::*, quantity::ratios::Percent};

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HysteresisState {
    /// Charging allowed.
    #[default]
    Inactive,

    /// Maximum SOC has been reached, charging is held off until the SOC drops below the resume
    /// threshold.
    Active,
}

impl HysteresisState {
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

impl From<bool> for HysteresisState {
    fn from(is_active: bool) -> Self {
        if is_active { Self::Active } else { Self::Inactive }
    }
}

/// Per-battery dead band below the maximum SOC.
///
/// Turns the single «SOC reached the maximum» crossing into a band, so that a battery sitting
/// at its ceiling does not toggle between charging and discharging.
#[must_use]
#[derive(Clone, Debug)]
pub struct ChargeHysteresis {
    max_soc: Percent,
    hysteresis: Percent,
    state: HysteresisState,
}

impl ChargeHysteresis {
    pub fn try_new(max_soc: Percent, hysteresis: Percent) -> Result<Self> {
        ensure!(
            max_soc > Percent::ZERO && max_soc <= Percent::HUNDRED,
            "maximum SOC must be within (0%, 100%], got {max_soc}",
        );
        ensure!(hysteresis > Percent::ZERO, "charge hysteresis must be positive, got {hysteresis}");
        ensure!(
            hysteresis <= max_soc,
            "charge hysteresis ({hysteresis}) must not exceed the maximum SOC ({max_soc})",
        );
        Ok(Self { max_soc, hysteresis, state: HysteresisState::Inactive })
    }

    /// SOC below which charging is allowed again.
    pub fn charge_resume_threshold(&self) -> Percent {
        self.max_soc - self.hysteresis
    }

    pub const fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// Overwrite the state, used to restore it after a restart.
    pub fn set_active(&mut self, is_active: bool) {
        self.state = HysteresisState::from(is_active);
    }

    pub fn evaluate(&mut self, soc: Percent) -> HysteresisState {
        let next_state = match self.state {
            HysteresisState::Inactive if soc >= self.max_soc => HysteresisState::Active,
            HysteresisState::Active if soc < self.charge_resume_threshold() => {
                HysteresisState::Inactive
            }
            state => state,
        };
        if next_state != self.state {
            info!(
                ?soc,
                max_soc = ?self.max_soc,
                resume_threshold = ?self.charge_resume_threshold(),
                from = ?self.state,
                to = ?next_state,
                "charge hysteresis transition",
            );
            self.state = next_state;
        }
        next_state
    }

    pub fn diagnostics(&self, current_soc: Option<Percent>) -> HysteresisDiagnostics {
        HysteresisDiagnostics {
            is_active: self.is_active(),
            max_soc: self.max_soc,
            hysteresis_percent: self.hysteresis,
            charge_resume_threshold: self.charge_resume_threshold(),
            current_soc,
        }
    }
}

#[must_use]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HysteresisDiagnostics {
    pub is_active: bool,
    pub max_soc: Percent,
    pub hysteresis_percent: Percent,
    pub charge_resume_threshold: Percent,
    pub current_soc: Option<Percent>,
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use super::*;

    #[test]
    fn test_state_sequence() -> Result {
        use HysteresisState::{Active, Inactive};

        let mut hysteresis = ChargeHysteresis::try_new(Percent(100.0), Percent(20.0))?;
        let states = [90.0, 95.0, 100.0, 98.0, 80.0, 74.0, 76.0]
            .into_iter()
            .map(|soc| hysteresis.evaluate(Percent(soc)))
            .collect_vec();
        assert_eq!(states, [Inactive, Inactive, Active, Active, Active, Inactive, Inactive]);
        Ok(())
    }

    #[test]
    fn test_resume_threshold_is_exclusive() -> Result {
        let mut hysteresis = ChargeHysteresis::try_new(Percent(90.0), Percent(10.0))?;
        hysteresis.set_active(true);
        assert_eq!(hysteresis.evaluate(Percent(80.0)), HysteresisState::Active);
        assert_eq!(hysteresis.evaluate(Percent(79.9)), HysteresisState::Inactive);
        Ok(())
    }

    #[test]
    fn test_restored_state_is_authoritative() -> Result {
        let mut hysteresis = ChargeHysteresis::try_new(Percent(100.0), Percent(20.0))?;
        hysteresis.set_active(true);
        assert_eq!(hysteresis.evaluate(Percent(90.0)), HysteresisState::Active);
        Ok(())
    }

    #[test]
    fn test_charge_resume_threshold() -> Result {
        let hysteresis = ChargeHysteresis::try_new(Percent(95.0), Percent(15.0))?;
        assert_eq!(hysteresis.charge_resume_threshold(), Percent(80.0));
        assert_eq!(hysteresis.diagnostics(None).charge_resume_threshold, Percent(80.0));
        Ok(())
    }

    #[test]
    fn test_invalid_configuration() {
        assert!(ChargeHysteresis::try_new(Percent(100.0), Percent::ZERO).is_err());
        assert!(ChargeHysteresis::try_new(Percent(100.0), Percent(-5.0)).is_err());
        assert!(ChargeHysteresis::try_new(Percent(101.0), Percent(5.0)).is_err());
        assert!(ChargeHysteresis::try_new(Percent(10.0), Percent(20.0)).is_err());
    }
}
