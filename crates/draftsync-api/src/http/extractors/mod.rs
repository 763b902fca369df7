//! Request extractors.

pub mod query;
pub mod user;
