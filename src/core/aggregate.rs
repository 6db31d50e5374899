use std::iter::Sum;

use itertools::Itertools;
use serde::Serialize;

use crate::{
    core::telemetry::BatterySnapshot,
    prelude::*,
    quantity::{energy::KilowattHours, power::Watts, ratios::Percent},
};

/// System-wide view over the latest battery snapshots.
#[must_use]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SystemAggregate {
    /// At least one battery has ever reported anything.
    pub is_available: bool,

    pub average_soc: Option<Percent>,

    /// Never unknown: no evidence of charging means no charging.
    pub total_charge_power: Watts,

    /// Never unknown: no evidence of discharging means no discharging.
    pub total_discharge_power: Watts,

    pub total_energy_capacity: Option<KilowattHours>,
    pub total_stored_energy: Option<KilowattHours>,
    pub total_daily_charge_energy: Option<KilowattHours>,
    pub total_daily_discharge_energy: Option<KilowattHours>,
}

impl SystemAggregate {
    /// Today's net consumption from the batteries: discharged minus charged.
    pub fn daily_net_consumption(&self) -> Option<KilowattHours> {
        Some(self.total_daily_discharge_energy? - self.total_daily_charge_energy?)
    }
}

/// Combine the per-battery snapshots into the system totals.
///
/// Batteries without any snapshot are passed as [`None`].
pub fn aggregate<'a>(
    snapshots: impl IntoIterator<Item = Option<&'a BatterySnapshot>>,
) -> SystemAggregate {
    let snapshots = snapshots.into_iter().flatten().collect_vec();

    let average_soc = {
        let socs = snapshots.iter().filter_map(|snapshot| snapshot.soc).collect_vec();
        #[expect(clippy::cast_precision_loss)]
        let n_socs = socs.len() as f64;
        (!socs.is_empty()).then(|| (socs.into_iter().sum::<Percent>() / n_socs).round_to(0))
    };

    let powers = snapshots.iter().filter_map(|snapshot| snapshot.power).collect_vec();
    debug!(?powers, "summing battery powers…");
    let total_charge_power =
        powers.iter().copied().filter(|power| *power > Watts::ZERO).sum::<Watts>().round_to(0);
    let total_discharge_power = powers
        .iter()
        .copied()
        .filter(|power| *power < Watts::ZERO)
        .map(Watts::abs)
        .sum::<Watts>()
        .round_to(0);

    let total_stored_energy = sum_present(
        snapshots
            .iter()
            .map(|snapshot| Some(snapshot.total_energy? * snapshot.soc?)),
    )
    .map(|energy| energy.round_to(3));

    SystemAggregate {
        is_available: !snapshots.is_empty(),
        average_soc,
        total_charge_power,
        total_discharge_power,
        total_energy_capacity: sum_present(snapshots.iter().map(|snapshot| snapshot.total_energy))
            .map(|energy| energy.round_to(2)),
        total_stored_energy,
        total_daily_charge_energy: sum_present(
            snapshots.iter().map(|snapshot| snapshot.daily_charging_energy),
        )
        .map(|energy| energy.round_to(2)),
        total_daily_discharge_energy: sum_present(
            snapshots.iter().map(|snapshot| snapshot.daily_discharging_energy),
        )
        .map(|energy| energy.round_to(2)),
    }
}

/// Sum the known values, or [`None`] if nothing is known at all.
fn sum_present<T: Sum>(values: impl IntoIterator<Item = Option<T>>) -> Option<T> {
    let mut values = values.into_iter().flatten().peekable();
    values.peek()?;
    Some(values.sum())
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn soc(percent: f64) -> BatterySnapshot {
        BatterySnapshot::builder().soc(Percent(percent)).build()
    }

    fn power(watts: f64) -> BatterySnapshot {
        BatterySnapshot::builder().power(Watts(watts)).build()
    }

    #[test]
    fn test_empty() {
        let snapshots: [Option<&BatterySnapshot>; 0] = [];
        let aggregate = aggregate(snapshots);
        assert!(!aggregate.is_available);
        assert_eq!(aggregate.average_soc, None);
        assert_eq!(aggregate.total_charge_power, Watts::ZERO);
        assert_eq!(aggregate.total_discharge_power, Watts::ZERO);
        assert_eq!(aggregate.total_energy_capacity, None);
        assert_eq!(aggregate.total_stored_energy, None);
        assert_eq!(aggregate.total_daily_charge_energy, None);
        assert_eq!(aggregate.total_daily_discharge_energy, None);
    }

    #[test]
    fn test_unavailable_batteries() {
        let aggregate = aggregate([None, None]);
        assert!(!aggregate.is_available);
        assert_eq!(aggregate.total_charge_power, Watts::ZERO);
    }

    #[test]
    fn test_available_with_empty_snapshot() {
        let empty = BatterySnapshot::default();
        let aggregate = aggregate([None, Some(&empty)]);
        assert!(aggregate.is_available);
        assert_eq!(aggregate.average_soc, None);
    }

    #[test]
    fn test_average_soc_ignores_unknown() {
        let unknown = BatterySnapshot::default();
        let fifty = soc(50.0);
        assert_eq!(
            aggregate([Some(&unknown), Some(&fifty), None]).average_soc,
            Some(Percent(50.0)),
        );
    }

    #[test]
    fn test_average_soc_rounded() {
        let (first, second, third) = (soc(50.0), soc(51.0), soc(51.0));
        assert_eq!(
            aggregate([Some(&first), Some(&second), Some(&third)]).average_soc,
            Some(Percent(51.0)),
        );
    }

    #[test]
    fn test_powers_are_summed_separately() {
        let snapshots = [power(800.4), power(-300.0), power(0.0), power(200.0), power(-150.2)];
        let aggregate = aggregate(snapshots.iter().map(Some));
        assert_eq!(aggregate.total_charge_power, Watts(1000.0));
        assert_eq!(aggregate.total_discharge_power, Watts(450.0));
    }

    #[test]
    fn test_only_discharging() {
        let snapshots = [power(-300.0), power(-200.0)];
        let aggregate = aggregate(snapshots.iter().map(Some));
        assert_eq!(aggregate.total_charge_power, Watts::ZERO);
        assert_eq!(aggregate.total_discharge_power, Watts(500.0));
    }

    #[test]
    fn test_stored_energy_requires_both_fields() {
        let complete =
            BatterySnapshot::builder().soc(Percent(50.0)).total_energy(KilowattHours(5.12)).build();
        let soc_only = soc(80.0);
        let capacity_only = BatterySnapshot::builder().total_energy(KilowattHours(5.12)).build();
        let aggregate = aggregate([Some(&complete), Some(&soc_only), Some(&capacity_only)]);
        assert_abs_diff_eq!(aggregate.total_stored_energy.unwrap().0, 2.56);
        assert_abs_diff_eq!(aggregate.total_energy_capacity.unwrap().0, 10.24);
    }

    #[test]
    fn test_stored_energy_without_contributors() {
        let soc_only = soc(80.0);
        let capacity_only = BatterySnapshot::builder().total_energy(KilowattHours(5.12)).build();
        assert_eq!(aggregate([Some(&soc_only), Some(&capacity_only)]).total_stored_energy, None);
    }

    #[test]
    fn test_zero_capacity_is_known() {
        let snapshot = BatterySnapshot::builder().total_energy(KilowattHours::ZERO).build();
        assert_eq!(aggregate([Some(&snapshot)]).total_energy_capacity, Some(KilowattHours::ZERO));
    }

    #[test]
    fn test_partial_daily_energy_is_summed() {
        let first = BatterySnapshot::builder()
            .daily_charging_energy(KilowattHours(1.234))
            .daily_discharging_energy(KilowattHours(2.0))
            .build();
        let second = BatterySnapshot::builder().daily_charging_energy(KilowattHours(0.5)).build();
        let aggregate = aggregate([Some(&first), Some(&second)]);
        assert_abs_diff_eq!(aggregate.total_daily_charge_energy.unwrap().0, 1.73);
        assert_abs_diff_eq!(aggregate.total_daily_discharge_energy.unwrap().0, 2.0);
        assert_abs_diff_eq!(aggregate.daily_net_consumption().unwrap().0, 0.27, epsilon = 1e-9);
    }

    #[test]
    fn test_idempotent() {
        let snapshots = [
            BatterySnapshot::builder()
                .soc(Percent(33.3))
                .power(Watts(123.4))
                .total_energy(KilowattHours(5.12))
                .build(),
            BatterySnapshot::builder().soc(Percent(66.6)).power(Watts(-17.0)).build(),
        ];
        let first = aggregate(snapshots.iter().map(Some));
        let second = aggregate(snapshots.iter().map(Some));
        assert_eq!(first, second);
        assert_eq!(
            first.total_stored_energy.unwrap().0.to_bits(),
            second.total_stored_energy.unwrap().0.to_bits(),
        );
    }
}
