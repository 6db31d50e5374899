use chrono::Local;
use clap::Parser;

use crate::{
    cli::fleet::{FleetArgs, InputArgs},
    prelude::*,
    tables::{build_aggregate_table, build_batteries_table, build_decision_table},
};

#[derive(Parser)]
pub struct HuntArgs {
    #[clap(flatten)]
    fleet: FleetArgs,

    #[clap(flatten)]
    inputs: InputArgs,

    /// Do not save the state (dry run).
    #[clap(long)]
    scout: bool,
}

impl HuntArgs {
    #[instrument(skip_all)]
    pub fn run(self) -> Result {
        let mut fleet = self.fleet.load_fleet()?;
        for update in self.fleet.read_updates(&fleet)? {
            fleet.update(update.battery, update.snapshot)?;
        }
        let decision = fleet.tick(Local::now(), self.inputs.into()).copied();

        let view = fleet.publish();
        println!("{}", build_aggregate_table(&view.aggregate));
        println!("{}", build_batteries_table(&view.batteries));
        match decision {
            Some(decision) => println!("{}", build_decision_table(&decision)),
            None => info!("predictive charging is disabled"),
        }

        if !self.scout {
            fleet.persisted_state().save(&self.fleet.state_path)?;
        }
        Ok(())
    }
}
