pub mod aggregate;
pub mod charger;
pub mod history;
pub mod hysteresis;
pub mod reserve;
pub mod telemetry;
pub mod window;
