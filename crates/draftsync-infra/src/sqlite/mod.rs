//! SQLite storage layer: WAL mode, split read/write pools, and the draft store.

pub mod draft;
pub mod pool;

pub use draft::SqliteDraftStore;
pub use pool::DatabasePool;
