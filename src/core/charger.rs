mod decision;

use chrono::{NaiveTime, TimeDelta};

pub use self::decision::{DecisionReason, DecisionRecord, GridChargeDecision};
use crate::{
    core::{aggregate::SystemAggregate, reserve::ReservePolicy, window::ChargingWindow},
    prelude::*,
    quantity::{energy::KilowattHours, power::Watts},
};

/// Validated predictive charging settings.
#[must_use]
#[derive(Clone, Debug)]
pub struct ChargingPolicy {
    windows: Vec<ChargingWindow>,
    reserve: ReservePolicy,
    max_contracted_power: Watts,
}

impl ChargingPolicy {
    pub fn try_new(
        windows: Vec<ChargingWindow>,
        reserve: ReservePolicy,
        max_contracted_power: Watts,
    ) -> Result<Self> {
        ensure!(!windows.is_empty(), "at least one charging window is required");
        ensure!(
            max_contracted_power > Watts::ZERO,
            "maximum contracted power must be positive, got {max_contracted_power}",
        );
        Ok(Self { windows, reserve: reserve.validate()?, max_contracted_power })
    }

    pub fn windows(&self) -> &[ChargingWindow] {
        &self.windows
    }

    pub const fn max_contracted_power(&self) -> Watts {
        self.max_contracted_power
    }

    pub fn is_in_charging_slot(&self, time: NaiveTime) -> bool {
        self.windows.iter().any(|window| window.contains(time))
    }
}

/// Decides whether to pull grid power ahead of a projected shortfall.
#[must_use]
#[derive(Clone, Debug)]
pub struct PredictiveCharger {
    policy: ChargingPolicy,
    decision: Option<GridChargeDecision>,
}

impl PredictiveCharger {
    pub const fn new(policy: ChargingPolicy) -> Self {
        Self { policy, decision: None }
    }

    pub const fn policy(&self) -> &ChargingPolicy {
        &self.policy
    }

    pub const fn decision(&self) -> Option<&GridChargeDecision> {
        self.decision.as_ref()
    }

    /// Expose the record from the previous run until the first evaluation.
    pub fn restore(&mut self, record: DecisionRecord) {
        self.decision = Some(GridChargeDecision::restored(record));
    }

    /// Re-evaluate the decision, replacing the previous one.
    ///
    /// `forced` is the manual override: when set, its value is the verdict, while the record
    /// still reflects the computed one.
    #[instrument(skip_all, fields(%now))]
    pub fn evaluate(
        &mut self,
        now: NaiveTime,
        aggregate: &SystemAggregate,
        average_consumption: Option<KilowattHours>,
        solar_forecast: Option<KilowattHours>,
        forced: Option<bool>,
    ) -> &GridChargeDecision {
        let in_charging_slot = self.policy.is_in_charging_slot(now);
        let record = self.compute_record(
            in_charging_slot,
            aggregate,
            average_consumption,
            solar_forecast,
        );
        let grid_charging_active =
            forced.unwrap_or(record.reason == DecisionReason::DeficitProjected);
        let charge_power =
            grid_charging_active.then(|| self.charge_power(now, record.energy_deficit));

        info!(
            grid_charging_active,
            in_charging_slot,
            ?forced,
            reason = %record.reason,
            stored_energy = ?record.stored_energy,
            cutoff_energy = ?record.cutoff_energy,
            energy_deficit = ?record.energy_deficit,
            "evaluated",
        );
        self.decision.insert(GridChargeDecision {
            grid_charging_active,
            in_charging_slot,
            overridden: forced.is_some(),
            charge_power,
            last_evaluation_soc: aggregate.average_soc,
            record,
        })
    }

    fn compute_record(
        &self,
        in_charging_slot: bool,
        aggregate: &SystemAggregate,
        average_consumption: Option<KilowattHours>,
        solar_forecast: Option<KilowattHours>,
    ) -> DecisionRecord {
        let stored_energy = aggregate.total_stored_energy;
        let effective_min_soc = aggregate
            .total_energy_capacity
            .map(|capacity| self.policy.reserve.effective_min_soc(capacity));
        let min_reserve = aggregate
            .total_energy_capacity
            .zip(effective_min_soc)
            .map(|(capacity, effective_min_soc)| capacity * effective_min_soc);

        let (Some(stored_energy), Some(min_reserve), Some(average_consumption)) =
            (stored_energy, min_reserve, average_consumption)
        else {
            debug!(
                ?stored_energy,
                ?min_reserve,
                ?average_consumption,
                "not enough data to project consumption",
            );
            return DecisionRecord::builder()
                .maybe_stored_energy(stored_energy)
                .maybe_min_reserve(min_reserve)
                .maybe_effective_min_soc(effective_min_soc)
                .maybe_average_consumption(average_consumption)
                .maybe_solar_forecast(solar_forecast)
                .reason(DecisionReason::InsufficientData)
                .build();
        };

        let solar = solar_forecast.unwrap_or(KilowattHours::ZERO);
        let usable_energy = (stored_energy - min_reserve).max(KilowattHours::ZERO);
        let total_available = usable_energy + solar;
        let energy_deficit = (average_consumption - total_available).max(KilowattHours::ZERO);

        // Stored energy needed on top of the reserve to cover what the sun will not.
        let cutoff_energy = min_reserve + (average_consumption - solar).max(KilowattHours::ZERO);

        let reason = if !in_charging_slot {
            DecisionReason::OutsideChargingWindow
        } else if (stored_energy < cutoff_energy) && (energy_deficit > KilowattHours::ZERO) {
            DecisionReason::DeficitProjected
        } else {
            DecisionReason::SufficientStoredEnergy
        };

        DecisionRecord::builder()
            .stored_energy(stored_energy)
            .usable_energy(usable_energy)
            .min_reserve(min_reserve)
            .cutoff_energy(cutoff_energy)
            .maybe_effective_min_soc(effective_min_soc)
            .average_consumption(average_consumption)
            .total_available(total_available)
            .energy_deficit(energy_deficit)
            .maybe_solar_forecast(solar_forecast)
            .reason(reason)
            .build()
    }

    /// Power that spreads the deficit over the rest of the open window, capped by the contract.
    fn charge_power(&self, now: NaiveTime, energy_deficit: Option<KilowattHours>) -> Watts {
        let max_power = self.policy.max_contracted_power;
        let Some(energy_deficit) = energy_deficit.filter(|deficit| *deficit > KilowattHours::ZERO)
        else {
            return max_power;
        };
        let Some(remaining) = self
            .policy
            .windows
            .iter()
            .filter(|window| window.contains(now))
            .map(|window| window.remaining(now))
            .max()
            .filter(|remaining| *remaining > TimeDelta::zero())
        else {
            return max_power;
        };
        Watts::from(energy_deficit / remaining).min(max_power)
    }
}
