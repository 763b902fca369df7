//! Shared domain types for draftsync.
//!
//! This crate contains the types every other layer agrees on: the draft
//! record and its identifiers, the controller's status model, telemetry
//! events, configuration, error enums, and the REST wire bodies.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod draft;
pub mod error;
pub mod event;
pub mod identity;
pub mod status;
pub mod wire;
