use std::fmt::Display;

use comfy_table::{Attribute, Cell, CellAlignment, Color, Table, modifiers, presets};

use crate::{
    core::{aggregate::SystemAggregate, charger::GridChargeDecision, history::DailyConsumption},
    fleet::BatteryView,
    quantity::{energy::KilowattHours, power::Watts},
};

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .apply_modifier(modifiers::UTF8_ROUND_CORNERS)
        .enforce_styling();
    table
}

fn optional_cell(value: Option<impl Display>) -> Cell {
    value.map_or_else(
        || Cell::new("n/a").add_attribute(Attribute::Dim),
        |value| Cell::new(value).set_alignment(CellAlignment::Right),
    )
}

pub fn build_aggregate_table(aggregate: &SystemAggregate) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Available", "SOC", "Charge", "Discharge", "Capacity", "Stored", "Today"]);
    table.add_row(vec![
        Cell::new(if aggregate.is_available { "yes" } else { "no" }).fg(
            if aggregate.is_available { Color::Green } else { Color::Red },
        ),
        optional_cell(aggregate.average_soc),
        Cell::new(aggregate.total_charge_power).set_alignment(CellAlignment::Right).fg(
            if aggregate.total_charge_power > Watts::ZERO { Color::Green } else { Color::Reset },
        ),
        Cell::new(aggregate.total_discharge_power).set_alignment(CellAlignment::Right).fg(
            if aggregate.total_discharge_power > Watts::ZERO { Color::Red } else { Color::Reset },
        ),
        optional_cell(aggregate.total_energy_capacity).add_attribute(Attribute::Dim),
        optional_cell(aggregate.total_stored_energy),
        optional_cell(aggregate.daily_net_consumption()),
    ]);
    table
}

pub fn build_batteries_table(batteries: &[BatteryView]) -> Table {
    let mut table = new_table();
    table.set_header(vec![
        "Name",
        "SOC",
        "Power",
        "Capacity",
        "Stored",
        "Charged",
        "Discharged",
        "Efficiency",
        "Hysteresis",
    ]);
    for battery in batteries {
        let snapshot = battery.snapshot.unwrap_or_default();
        table.add_row(vec![
            Cell::new(&battery.name).fg(if battery.snapshot.is_some() {
                Color::Reset
            } else {
                Color::Red
            }),
            optional_cell(snapshot.soc),
            optional_cell(snapshot.power),
            optional_cell(snapshot.total_energy).add_attribute(Attribute::Dim),
            optional_cell(battery.stored_energy),
            optional_cell(snapshot.daily_charging_energy),
            optional_cell(snapshot.daily_discharging_energy),
            optional_cell(battery.round_trip_efficiency),
            match battery.hysteresis {
                Some(hysteresis) if hysteresis.is_active => {
                    Cell::new(format!("holding until < {}", hysteresis.charge_resume_threshold))
                        .fg(Color::DarkYellow)
                }
                Some(hysteresis) => {
                    Cell::new(format!("charging up to {}", hysteresis.max_soc)).fg(Color::Green)
                }
                None => Cell::new("off").add_attribute(Attribute::Dim),
            },
        ]);
    }
    table
}

pub fn build_decision_table(decision: &GridChargeDecision) -> Table {
    let record = &decision.record;
    let mut table = new_table();
    table.set_header(vec!["", "Value"]);
    table.add_row(vec![
        Cell::new("Grid charging"),
        Cell::new(match (decision.grid_charging_active, decision.overridden) {
            (true, false) => "active",
            (true, true) => "active (forced)",
            (false, false) => "inactive",
            (false, true) => "inactive (forced)",
        })
        .fg(if decision.grid_charging_active { Color::Green } else { Color::Reset }),
    ]);
    table.add_row(vec![Cell::new("Reason"), Cell::new(record.reason)]);
    table.add_row(vec![
        Cell::new("In charging slot"),
        Cell::new(if decision.in_charging_slot { "yes" } else { "no" }),
    ]);
    table.add_row(vec![Cell::new("Charge power"), optional_cell(decision.charge_power)]);
    table.add_row(vec![Cell::new("Stored"), optional_cell(record.stored_energy)]);
    table.add_row(vec![Cell::new("Minimum reserve"), optional_cell(record.min_reserve)]);
    table.add_row(vec![
        Cell::new("Effective minimum SOC").add_attribute(Attribute::Dim),
        optional_cell(record.effective_min_soc),
    ]);
    table.add_row(vec![Cell::new("Usable"), optional_cell(record.usable_energy)]);
    table.add_row(vec![Cell::new("Solar forecast"), optional_cell(record.solar_forecast)]);
    table.add_row(vec![Cell::new("Total available"), optional_cell(record.total_available)]);
    table.add_row(vec![Cell::new("Average consumption"), optional_cell(record.average_consumption)]);
    table.add_row(vec![
        Cell::new("Deficit"),
        optional_cell(record.energy_deficit).fg(
            if record.energy_deficit.is_some_and(|deficit| deficit > KilowattHours::ZERO) {
                Color::Red
            } else {
                Color::Green
            },
        ),
    ]);
    table.add_row(vec![Cell::new("Cutoff"), optional_cell(record.cutoff_energy)]);
    table
}

pub fn build_history_table<'a>(
    days: impl IntoIterator<Item = &'a DailyConsumption>,
    average: Option<KilowattHours>,
) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Date", "Net consumption"]);
    for day in days {
        table.add_row(vec![
            Cell::new(day.date.format("%a %b %d")),
            Cell::new(day.net).set_alignment(CellAlignment::Right).fg(
                if average.is_some_and(|average| day.net > average) {
                    Color::DarkYellow
                } else {
                    Color::Reset
                },
            ),
        ]);
    }
    table.add_row(vec![
        Cell::new("Average").add_attribute(Attribute::Bold),
        optional_cell(average).add_attribute(Attribute::Bold),
    ]);
    table
}
