use std::{path::PathBuf, time::Duration};

use clap::Parser;
use tokio::{
    signal::unix::{SignalKind, signal},
    sync::{mpsc, watch},
    time::{MissedTickBehavior, interval},
};

use crate::{
    cli::fleet::{FleetArgs, InputArgs, read_telemetry},
    core::telemetry::BatterySnapshot,
    fleet::{ExternalInputs, FleetView},
    prelude::*,
    service::{Service, TelemetryUpdate},
};

#[derive(Parser)]
pub struct WatchArgs {
    #[clap(flatten)]
    fleet: FleetArgs,

    #[clap(flatten)]
    inputs: InputArgs,

    #[clap(long, env = "POLLING_INTERVAL", default_value = "5s")]
    polling_interval: humantime::Duration,

    #[clap(long, env = "EVALUATION_INTERVAL", default_value = "1min")]
    evaluation_interval: humantime::Duration,
}

impl WatchArgs {
    pub async fn run(self) -> Result {
        let fleet = self.fleet.load_fleet()?;
        let mut sigterm =
            signal(SignalKind::terminate()).context("failed to install the SIGTERM handler")?;

        let (updates_tx, updates_rx) = mpsc::channel(16);
        for (battery, name) in fleet.battery_names().enumerate() {
            tokio::spawn(
                Poller {
                    path: self.fleet.telemetry_path.clone(),
                    name: name.to_owned(),
                    battery,
                    period: self.polling_interval.into(),
                }
                .run(updates_tx.clone()),
            );
        }
        drop(updates_tx);

        let service = Service::new(fleet);
        let logger = tokio::spawn(log_views(service.subscribe()));
        let (_inputs_tx, inputs_rx) = watch::channel(ExternalInputs::from(self.inputs));
        let shutdown = async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        };
        let fleet =
            service.run(updates_rx, inputs_rx, self.evaluation_interval.into(), shutdown).await;
        logger.await?;

        fleet.persisted_state().save(&self.fleet.state_path)
    }
}

/// Polls the telemetry file on behalf of a single battery.
struct Poller {
    path: PathBuf,
    name: String,
    battery: usize,
    period: Duration,
}

impl Poller {
    #[instrument(skip_all, fields(name = %self.name))]
    async fn run(self, updates: mpsc::Sender<TelemetryUpdate>) {
        let mut interval = interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_snapshot: Option<Option<BatterySnapshot>> = None;

        while !updates.is_closed() {
            interval.tick().await;
            let snapshot = match read_telemetry(&self.path) {
                Ok(mut telemetry) => telemetry.remove(&self.name).flatten(),
                Err(error) => {
                    warn!("failed to poll the telemetry: {error:#}");
                    None
                }
            };
            if last_snapshot == Some(snapshot) {
                continue;
            }
            last_snapshot = Some(snapshot);
            trace!(?snapshot, "sending…");
            if updates.send(TelemetryUpdate { battery: self.battery, snapshot }).await.is_err() {
                break;
            }
        }
    }
}

/// Log every published view until the service stops.
async fn log_views(mut views: watch::Receiver<FleetView>) {
    while views.changed().await.is_ok() {
        let view = views.borrow_and_update().clone();
        let decision = view.charging.as_ref().and_then(|charging| charging.decision);
        info!(
            version = view.version,
            is_available = view.aggregate.is_available,
            average_soc = ?view.aggregate.average_soc,
            stored_energy = ?view.aggregate.total_stored_energy,
            grid_charging_active = ?decision.map(|decision| decision.grid_charging_active),
            charge_power = ?decision.and_then(|decision| decision.charge_power),
            "published",
        );
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tokio::time::timeout;

    use super::*;
    use crate::quantity::ratios::Percent;

    #[tokio::test]
    async fn test_poller_sends_changes_only() -> Result {
        let path = std::env::temp_dir().join(format!("vixen-poller-{}.json", std::process::id()));
        fs::write(&path, r#"{"venus": {"soc_percent": 42.0}, "other": null}"#)?;
        let (updates_tx, mut updates_rx) = mpsc::channel(8);
        let poller = Poller {
            path: path.clone(),
            name: "venus".to_owned(),
            battery: 3,
            period: Duration::from_millis(10),
        };
        let handle = tokio::spawn(poller.run(updates_tx));

        let update = timeout(Duration::from_secs(5), updates_rx.recv()).await?.context("closed")?;
        assert_eq!(update.battery, 3);
        assert_eq!(update.snapshot.and_then(|snapshot| snapshot.soc), Some(Percent(42.0)));

        // Unchanged telemetry is not sent again.
        assert!(timeout(Duration::from_millis(100), updates_rx.recv()).await.is_err());

        // Unreadable telemetry makes the battery unavailable.
        fs::remove_file(&path)?;
        let update = timeout(Duration::from_secs(5), updates_rx.recv()).await?.context("closed")?;
        assert_eq!(update.snapshot, None);

        drop(updates_rx);
        timeout(Duration::from_secs(5), handle).await??;
        Ok(())
    }
}
