#![allow(clippy::doc_markdown)]
#![doc = include_str!("../README.md")]

mod cli;
mod config;
mod core;
mod fleet;
mod prelude;
mod quantity;
mod service;
mod tables;

use clap::{Parser, crate_version};

use crate::{
    cli::{Args, Command},
    prelude::*,
};

#[tokio::main]
async fn main() -> Result {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().without_time().compact().init();
    info!(version = crate_version!(), "starting…");

    match Args::parse().command {
        Command::Hunt(args) => args.run()?,
        Command::Watch(args) => args.run().await?,
        Command::Burrow(args) => args.run()?,
    }

    info!("done!");
    Ok(())
}
