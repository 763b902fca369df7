//! Route handlers.

pub mod draft;
