//! Infrastructure adapters for draftsync.
//!
//! - [`sqlite`]: the SQLite draft store implementing `DraftPersistenceClient`.
//! - [`http`]: the same contract spoken over the REST surface, plus the post publisher.
//! - [`config`]: `config.toml` loading and data directory resolution.

pub mod config;
pub mod http;
pub mod sqlite;
