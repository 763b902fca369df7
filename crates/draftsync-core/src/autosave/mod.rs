//! Draft autosave: debounced, version-checked saves with conflict arbitration.
//!
//! - [`machine`]: the pure transition table (`DraftMachine`).
//! - [`controller`]: the tokio driver and the caller-facing `DraftHandle`.
//! - [`backoff`]: retry delays after rate-limited saves.

pub mod backoff;
pub mod controller;
pub mod machine;

pub use backoff::RateLimitBackoff;
pub use controller::{DraftAutoSaveController, DraftHandle, DraftSession};
pub use machine::{DraftEvent, DraftMachine, Effect};
