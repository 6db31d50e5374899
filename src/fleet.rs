mod state;
mod view;

use chrono::{DateTime, Local};

pub use self::{
    state::PersistedState,
    view::{BatteryView, ChargingView, FleetView},
};
use crate::{
    config::{FleetConfig, PredictiveChargingConfig},
    core::{
        aggregate::{SystemAggregate, aggregate},
        charger::{ChargingPolicy, GridChargeDecision, PredictiveCharger},
        history::ConsumptionHistory,
        hysteresis::ChargeHysteresis,
        telemetry::BatterySnapshot,
    },
    prelude::*,
    quantity::energy::KilowattHours,
};

/// Inputs supplied by the host on every evaluation tick.
#[must_use]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ExternalInputs {
    pub solar_forecast: Option<KilowattHours>,

    /// Manual override of the charging verdict.
    pub forced_charging: Option<bool>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Phase {
    /// Waiting for the state to be restored.
    Starting,

    /// State restored, no evaluation yet.
    Restored,

    /// At least one evaluation tick has run.
    Running,
}

#[derive(Clone, Debug)]
struct Battery {
    name: String,
    snapshot: Option<BatterySnapshot>,
    hysteresis: Option<ChargeHysteresis>,
}

/// All batteries together with the system-level controllers.
#[must_use]
#[derive(Clone, Debug)]
pub struct Fleet {
    batteries: Vec<Battery>,
    history: ConsumptionHistory,
    charger: Option<PredictiveCharger>,
    aggregate: SystemAggregate,
    phase: Phase,
    version: u64,
}

impl Fleet {
    /// Build the controllers, refusing to start on invalid configuration.
    pub fn try_new(config: &FleetConfig) -> Result<Self> {
        let batteries = config
            .batteries
            .iter()
            .map(|battery| {
                let hysteresis = battery
                    .charge_hysteresis
                    .map(|hysteresis| ChargeHysteresis::try_new(battery.max_soc, hysteresis))
                    .transpose()
                    .with_context(|| format!("invalid configuration of `{}`", battery.name))?;
                Ok(Battery { name: battery.name.clone(), snapshot: None, hysteresis })
            })
            .collect::<Result<Vec<_>>>()?;
        let history_days = config
            .predictive_charging
            .as_ref()
            .map_or_else(PredictiveChargingConfig::default_history_days, |charging| {
                charging.history_days
            });
        let charger = config
            .predictive_charging
            .as_ref()
            .map(|charging| {
                ChargingPolicy::try_new(
                    charging.windows.clone(),
                    charging.min_reserve,
                    charging.max_contracted_power,
                )
            })
            .transpose()
            .context("invalid predictive charging configuration")?
            .map(PredictiveCharger::new);
        Ok(Self {
            batteries,
            history: ConsumptionHistory::new(history_days),
            charger,
            aggregate: SystemAggregate::default(),
            phase: Phase::Starting,
            version: 0,
        })
    }

    /// Battery names in the configuration order, which also defines the battery indices.
    pub fn battery_names(&self) -> impl Iterator<Item = &str> {
        self.batteries.iter().map(|battery| battery.name.as_str())
    }

    pub const fn history(&self) -> &ConsumptionHistory {
        &self.history
    }

    pub fn decision(&self) -> Option<&GridChargeDecision> {
        self.charger.as_ref()?.decision()
    }

    /// Apply the state from the previous run.
    ///
    /// Accepted once, and only before the first evaluation tick.
    #[instrument(skip_all)]
    pub fn restore(&mut self, state: PersistedState) -> Result {
        match self.phase {
            Phase::Starting => {}
            Phase::Restored => bail!("the state has already been restored"),
            Phase::Running => bail!("the state must be restored before the first evaluation"),
        }
        for (name, is_active) in state.hysteresis_active {
            match self
                .batteries
                .iter_mut()
                .find(|battery| battery.name == name)
                .and_then(|battery| battery.hysteresis.as_mut())
            {
                Some(hysteresis) => {
                    info!(name, is_active, "restored charge hysteresis");
                    hysteresis.set_active(is_active);
                }
                None => warn!(name, "no charge hysteresis to restore"),
            }
        }
        self.history.restore(state.daily_consumption_history, state.current_day);
        if let (Some(charger), Some(record)) = (self.charger.as_mut(), state.last_decision) {
            charger.restore(record);
        }
        self.phase = Phase::Restored;
        Ok(())
    }

    /// Store the battery's latest snapshot and step its charge hysteresis.
    ///
    /// The aggregate is not recomputed until [`Fleet::refresh`].
    pub fn update(&mut self, index: usize, snapshot: Option<BatterySnapshot>) -> Result {
        let battery = self.batteries.get_mut(index).with_context(|| format!("no battery #{index}"))?;
        if let (Some(hysteresis), Some(soc)) =
            (battery.hysteresis.as_mut(), snapshot.and_then(|snapshot| snapshot.soc))
        {
            hysteresis.evaluate(soc);
        }
        battery.snapshot = snapshot;
        Ok(())
    }

    /// Recompute the aggregate from the full set of snapshots.
    pub fn refresh(&mut self) -> SystemAggregate {
        self.aggregate = aggregate(self.batteries.iter().map(|battery| battery.snapshot.as_ref()));
        self.aggregate
    }

    /// Evaluation tick: roll the consumption history over and re-evaluate the charging decision.
    #[instrument(skip_all, fields(%now))]
    pub fn tick(
        &mut self,
        now: DateTime<Local>,
        inputs: ExternalInputs,
    ) -> Option<&GridChargeDecision> {
        self.phase = Phase::Running;
        let aggregate = self.refresh();
        self.history.observe(now.date_naive(), aggregate.daily_net_consumption());
        let average_consumption = self.history.average_consumption();
        let charger = self.charger.as_mut()?;
        Some(charger.evaluate(
            now.time(),
            &aggregate,
            average_consumption,
            inputs.solar_forecast,
            inputs.forced_charging,
        ))
    }

    /// Build the next read-only view.
    pub fn publish(&mut self) -> FleetView {
        self.version += 1;
        FleetView {
            version: self.version,
            aggregate: self.aggregate,
            batteries: self
                .batteries
                .iter()
                .map(|battery| BatteryView {
                    name: battery.name.clone(),
                    snapshot: battery.snapshot,
                    stored_energy: battery.snapshot.and_then(|snapshot| snapshot.stored_energy()),
                    round_trip_efficiency: battery
                        .snapshot
                        .and_then(|snapshot| snapshot.round_trip_efficiency()),
                    hysteresis: battery.hysteresis.as_ref().map(|hysteresis| {
                        hysteresis.diagnostics(battery.snapshot.and_then(|snapshot| snapshot.soc))
                    }),
                })
                .collect(),
            charging: self.charger.as_ref().map(|charger| ChargingView {
                decision: charger.decision().copied(),
                windows: charger.policy().windows().to_vec(),
                max_contracted_power: charger.policy().max_contracted_power(),
                average_consumption: self.history.average_consumption(),
                daily_consumption_history: self.history.days().copied().collect(),
                history_days: self.history.len(),
            }),
        }
    }

    pub fn persisted_state(&self) -> PersistedState {
        PersistedState {
            hysteresis_active: self
                .batteries
                .iter()
                .filter_map(|battery| {
                    Some((battery.name.clone(), battery.hysteresis.as_ref()?.is_active()))
                })
                .collect(),
            daily_consumption_history: self.history.days().copied().collect(),
            current_day: self.history.today(),
            last_decision: self.decision().map(|decision| decision.record),
        }
    }
}
