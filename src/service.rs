//! Long-running fleet service.
//!
//! The service exclusively owns the [`Fleet`]. Telemetry arrives from any number of producers
//! through an [`mpsc`] channel, and every change is published as a fresh [`FleetView`]
//! through a [`watch`] channel.

use std::{future::Future, time::Duration};

use chrono::Local;
use tokio::{
    sync::{mpsc, watch},
    time::{MissedTickBehavior, interval},
};

use crate::{
    core::telemetry::BatterySnapshot,
    fleet::{ExternalInputs, Fleet, FleetView},
    prelude::*,
};

/// Latest snapshot of a single battery.
#[must_use]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TelemetryUpdate {
    /// Index as in [`Fleet::battery_names`].
    pub battery: usize,

    /// [`None`] when the battery is unavailable.
    pub snapshot: Option<BatterySnapshot>,
}

#[must_use]
pub struct Service {
    fleet: Fleet,
    views: watch::Sender<FleetView>,
}

impl Service {
    /// Wrap the fleet, which should already be restored.
    pub fn new(mut fleet: Fleet) -> Self {
        let (views, _) = watch::channel(fleet.publish());
        Self { fleet, views }
    }

    pub fn subscribe(&self) -> watch::Receiver<FleetView> {
        self.views.subscribe()
    }

    /// Run until `shutdown` resolves or every telemetry producer is gone.
    ///
    /// Bursts of telemetry are coalesced into a single recomputation. The charging decision is
    /// re-evaluated every `evaluation_interval`, starting immediately.
    ///
    /// Returns the fleet, so that the caller could persist its state.
    #[instrument(skip_all, fields(?evaluation_interval))]
    pub async fn run(
        self,
        mut updates: mpsc::Receiver<TelemetryUpdate>,
        inputs: watch::Receiver<ExternalInputs>,
        evaluation_interval: Duration,
        shutdown: impl Future<Output = ()>,
    ) -> Fleet {
        let Self { mut fleet, views } = self;
        let mut shutdown = std::pin::pin!(shutdown);
        let mut evaluation = interval(evaluation_interval);
        evaluation.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("running…");
        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("shutting down…");
                    break;
                }

                update = updates.recv() => {
                    let Some(update) = update else {
                        info!("all telemetry sources have closed");
                        break;
                    };
                    let mut n_updates = 1_usize;
                    apply(&mut fleet, update);
                    while let Ok(update) = updates.try_recv() {
                        apply(&mut fleet, update);
                        n_updates += 1;
                    }
                    let aggregate = fleet.refresh();
                    debug!(
                        n_updates,
                        average_soc = ?aggregate.average_soc,
                        stored_energy = ?aggregate.total_stored_energy,
                        "refreshed",
                    );
                    views.send_replace(fleet.publish());
                }

                _ = evaluation.tick() => {
                    let inputs = *inputs.borrow();
                    fleet.tick(Local::now(), inputs);
                    views.send_replace(fleet.publish());
                }
            }
        }
        fleet
    }
}

fn apply(fleet: &mut Fleet, update: TelemetryUpdate) {
    if let Err(error) = fleet.update(update.battery, update.snapshot) {
        warn!("dropped the update: {error:#}");
    }
}

#[cfg(test)]
mod tests {
    use std::future::pending;

    use approx::assert_abs_diff_eq;
    use tokio::sync::oneshot;

    use super::*;
    use crate::quantity::{energy::KilowattHours, ratios::Percent};

    const CONFIG: &str = r#"
        [[battery]]
        name = "venus-1"
        charge_hysteresis_percent = 10

        [[battery]]
        name = "venus-2"

        [predictive_charging]
        windows = ["02:00-06:00"]
        min_reserve = { percent = 10 }
        max_contracted_power_watts = 3000
    "#;

    fn snapshot(soc: f64) -> Option<BatterySnapshot> {
        Some(
            BatterySnapshot::builder()
                .soc(Percent(soc))
                .total_energy(KilowattHours(5.12))
                .build(),
        )
    }

    #[tokio::test]
    async fn test_coalesces_updates() -> Result {
        let service = Service::new(Fleet::try_new(&CONFIG.parse()?)?);
        let views = service.subscribe();
        let (_inputs_tx, inputs_rx) = watch::channel(ExternalInputs::default());
        let (updates_tx, updates_rx) = mpsc::channel(16);

        updates_tx.send(TelemetryUpdate { battery: 0, snapshot: snapshot(10.0) }).await?;
        updates_tx.send(TelemetryUpdate { battery: 1, snapshot: snapshot(20.0) }).await?;
        updates_tx.send(TelemetryUpdate { battery: 0, snapshot: snapshot(30.0) }).await?;
        updates_tx.send(TelemetryUpdate { battery: 7, snapshot: None }).await?;
        drop(updates_tx);

        let mut fleet =
            service.run(updates_rx, inputs_rx, Duration::from_secs(3600), pending()).await;
        assert_eq!(fleet.refresh().average_soc, Some(Percent(25.0)));

        let view = views.borrow();
        // Initial view, at most one evaluation, and a single refresh.
        assert!(view.version <= 3, "version: {}", view.version);
        assert_eq!(view.aggregate.average_soc, Some(Percent(25.0)));
        assert_eq!(view.batteries[0].snapshot, snapshot(30.0));
        Ok(())
    }

    #[tokio::test]
    async fn test_multiple_producers() -> Result {
        let service = Service::new(Fleet::try_new(&CONFIG.parse()?)?);
        let (_inputs_tx, inputs_rx) = watch::channel(ExternalInputs::default());
        let (updates_tx, updates_rx) = mpsc::channel(1);

        for battery in 0..2 {
            let updates_tx = updates_tx.clone();
            tokio::spawn(async move {
                for soc in [40.0, 60.0, 80.0] {
                    let update = TelemetryUpdate { battery, snapshot: snapshot(soc) };
                    if updates_tx.send(update).await.is_err() {
                        break;
                    }
                }
            });
        }
        drop(updates_tx);

        let mut fleet =
            service.run(updates_rx, inputs_rx, Duration::from_secs(3600), pending()).await;
        let aggregate = fleet.refresh();
        assert_eq!(aggregate.average_soc, Some(Percent(80.0)));
        assert_abs_diff_eq!(aggregate.total_energy_capacity.context("no capacity")?.0, 10.24);
        Ok(())
    }

    #[tokio::test]
    async fn test_evaluates_with_inputs() -> Result {
        let service = Service::new(Fleet::try_new(&CONFIG.parse()?)?);
        let mut views = service.subscribe();
        let (_inputs_tx, inputs_rx) = watch::channel(ExternalInputs {
            forced_charging: Some(true),
            ..ExternalInputs::default()
        });
        let (_updates_tx, updates_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(service.run(
            updates_rx,
            inputs_rx,
            Duration::from_secs(3600),
            async move {
                let _ = shutdown_rx.await;
            },
        ));

        let decision = views
            .wait_for(|view| view.charging.as_ref().is_some_and(|charging| charging.decision.is_some()))
            .await?
            .charging
            .as_ref()
            .and_then(|charging| charging.decision)
            .context("no decision")?;
        assert!(decision.grid_charging_active);
        assert!(decision.overridden);

        let _ = shutdown_tx.send(());
        let fleet = handle.await?;
        assert!(fleet.decision().is_some());
        Ok(())
    }
}
