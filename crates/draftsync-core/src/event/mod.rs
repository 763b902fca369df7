//! Telemetry distribution for draft controllers.
//!
//! Provides a `TelemetryBus` that fans `DraftTelemetry` out to every
//! subscriber via a `tokio::sync::broadcast` channel.

pub mod bus;

pub use bus::TelemetryBus;
