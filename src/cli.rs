mod burrow;
mod fleet;
mod hunt;
mod watch;

use clap::{Parser, Subcommand};

pub use self::{burrow::BurrowArgs, hunt::HuntArgs, watch::WatchArgs};

#[derive(Parser)]
#[command(author, version, about, propagate_version = true)]
#[must_use]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Main command: ingest the telemetry, decide on grid charging, and save the state.
    #[clap(name = "hunt")]
    Hunt(Box<HuntArgs>),

    /// Keep polling the telemetry and re-evaluating until terminated.
    #[clap(name = "watch")]
    Watch(Box<WatchArgs>),

    /// Development tools.
    #[clap(name = "burrow")]
    Burrow(Box<BurrowArgs>),
}
