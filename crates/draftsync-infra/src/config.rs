//! Configuration loader for draftsync.
//!
//! Reads `config.toml` from the data directory (`~/.draftsync/` by default)
//! into [`DraftSyncConfig`]. Falls back to defaults when the file is missing
//! or malformed.

use std::path::{Path, PathBuf};

use draftsync_types::config::DraftSyncConfig;

/// Overrides `[server] rate_limit_per_min`.
pub const RATE_LIMIT_ENV: &str = "DRAFTSYNC_RATE_LIMIT_PER_MIN";

/// Overrides the data directory.
pub const DATA_DIR_ENV: &str = "DRAFTSYNC_DATA_DIR";

/// Load configuration from `{data_dir}/config.toml`.
///
/// - Missing file: [`DraftSyncConfig::default()`].
/// - Unreadable or unparsable file: logs a warning, returns the default.
pub async fn load_config(data_dir: &Path) -> DraftSyncConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return DraftSyncConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return DraftSyncConfig::default();
        }
    };

    match toml::from_str::<DraftSyncConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            DraftSyncConfig::default()
        }
    }
}

/// Apply environment overrides on top of a loaded config.
pub fn apply_env_overrides(mut config: DraftSyncConfig) -> DraftSyncConfig {
    if let Ok(raw) = std::env::var(RATE_LIMIT_ENV) {
        apply_rate_limit_override(&mut config, &raw);
    }
    config
}

fn apply_rate_limit_override(config: &mut DraftSyncConfig, raw: &str) {
    match raw.trim().parse::<u32>() {
        Ok(limit) => config.server.rate_limit_per_min = limit,
        Err(err) => tracing::warn!("Ignoring {RATE_LIMIT_ENV}={raw:?}: {err}"),
    }
}

/// Resolve the data directory.
///
/// Priority:
/// 1. `DRAFTSYNC_DATA_DIR` environment variable
/// 2. `~/.draftsync`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".draftsync");
    }

    PathBuf::from(".draftsync")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).await;
        assert_eq!(config, DraftSyncConfig::default());
    }

    #[tokio::test]
    async fn valid_toml_is_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
[autosave]
debounce_ms = 800

[server]
port = 8080
rate_limit_per_min = 30

[client]
base_url = "http://localhost:8080"
"#,
        )
        .await
        .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(config.autosave.debounce_ms, 800);
        assert_eq!(config.autosave.interval_ms, 15_000);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.rate_limit_per_min, 30);
        assert_eq!(config.client.base_url.as_deref(), Some("http://localhost:8080"));
    }

    #[tokio::test]
    async fn invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(config, DraftSyncConfig::default());
    }

    #[test]
    fn rate_limit_override_parses_or_is_ignored() {
        let mut config = DraftSyncConfig::default();
        apply_rate_limit_override(&mut config, "0");
        assert_eq!(config.server.rate_limit_per_min, 0);

        apply_rate_limit_override(&mut config, "lots");
        assert_eq!(config.server.rate_limit_per_min, 0);
    }

    #[test]
    fn data_dir_from_env() {
        // SAFETY: This test restores the env var immediately.
        unsafe {
            std::env::set_var(DATA_DIR_ENV, "/tmp/test-draftsync");
        }
        let dir = resolve_data_dir();
        assert_eq!(dir, PathBuf::from("/tmp/test-draftsync"));
        unsafe {
            std::env::remove_var(DATA_DIR_ENV);
        }
    }
}
