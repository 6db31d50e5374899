use clap::{Parser, Subcommand};

use crate::{
    cli::fleet::FleetArgs,
    prelude::*,
    tables::{build_aggregate_table, build_batteries_table, build_history_table},
};

#[derive(Parser)]
pub struct BurrowArgs {
    #[command(subcommand)]
    command: BurrowCommand,
}

impl BurrowArgs {
    pub fn run(self) -> Result {
        match self.command {
            BurrowCommand::Aggregate(args) => args.run(),
            BurrowCommand::History(args) => args.run(),
        }
    }
}

#[derive(Subcommand)]
pub enum BurrowCommand {
    /// Aggregate the telemetry file without evaluating anything.
    Aggregate(BurrowAggregateArgs),

    /// Show the persisted consumption history.
    History(BurrowHistoryArgs),
}

#[derive(Parser)]
pub struct BurrowAggregateArgs {
    #[clap(flatten)]
    fleet: FleetArgs,
}

impl BurrowAggregateArgs {
    fn run(self) -> Result {
        let mut fleet = self.fleet.load_fleet()?;
        for update in self.fleet.read_updates(&fleet)? {
            fleet.update(update.battery, update.snapshot)?;
        }
        fleet.refresh();
        let view = fleet.publish();
        println!("{}", build_aggregate_table(&view.aggregate));
        println!("{}", build_batteries_table(&view.batteries));
        Ok(())
    }
}

#[derive(Parser)]
pub struct BurrowHistoryArgs {
    #[clap(flatten)]
    fleet: FleetArgs,
}

impl BurrowHistoryArgs {
    fn run(self) -> Result {
        let fleet = self.fleet.load_fleet()?;
        let history = fleet.history();
        if let Some(today) = history.today() {
            info!(date = %today.date, net = %today.net, "day in progress");
        }
        println!("{}", build_history_table(history.days(), history.average_consumption()));
        Ok(())
    }
}
