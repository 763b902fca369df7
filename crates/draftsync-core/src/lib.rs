//! Draft autosave logic and port definitions for draftsync.
//!
//! This crate defines the persistence port (`DraftPersistenceClient`) that
//! the infrastructure layer implements, plus everything that runs on top of
//! it: the form bridge, the autosave state machine and its async driver,
//! conflict presentation, and the publish flow. It depends only on
//! `draftsync-types` -- never on `draftsync-infra` or any database/IO crate.

pub mod autosave;
pub mod conflict;
pub mod event;
pub mod form;
pub mod persistence;
pub mod publish;
