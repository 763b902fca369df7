//! Application state shared by the CLI and the REST handlers.

use std::path::PathBuf;
use std::sync::Arc;

use draftsync_infra::config::{apply_env_overrides, load_config, resolve_data_dir};
use draftsync_infra::sqlite::pool::{DatabasePool, database_url};
use draftsync_infra::sqlite::SqliteDraftStore;
use draftsync_types::config::DraftSyncConfig;

use crate::http::rate_limit::RateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SqliteDraftStore>,
    pub limiter: RateLimiter,
    pub config: Arc<DraftSyncConfig>,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Resolve the data directory, load config, open the database.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = apply_env_overrides(load_config(&data_dir).await);
        let db_url = format!("{}?mode=rwc", database_url(&data_dir));
        let pool = DatabasePool::new(&db_url).await?;

        Ok(Self::from_parts(pool, config, data_dir))
    }

    pub fn from_parts(pool: DatabasePool, config: DraftSyncConfig, data_dir: PathBuf) -> Self {
        let store = SqliteDraftStore::with_ttl_days(pool, config.server.draft_ttl_days);
        Self {
            store: Arc::new(store),
            limiter: RateLimiter::per_minute(config.server.rate_limit_per_min),
            config: Arc::new(config),
            data_dir,
        }
    }
}
