//! Observability for draftsync: subscriber setup and span attribute names.

pub mod draft_attrs;
pub mod tracing_setup;
