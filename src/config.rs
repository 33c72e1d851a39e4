//! Environment-driven configuration, read once at startup into a single
//! typed record.

use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use crate::domain::DomainError;

const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_NUM_PARALLEL_TASKS: usize = 10;
const DEFAULT_ENDPOINT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_SYNC_INTERVAL_SECS: u64 = 1800;

/// One outbound provider endpoint (embedding or enrichment). When
/// `base_url` is absent the deterministic mock implementation is wired in
/// instead.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    pub base_url: Option<String>,
    pub model: String,
    pub api_key: String,
    pub num_parallel_tasks: usize,
    pub timeout: Duration,
}

impl EndpointConfig {
    fn from_env(prefix: &str) -> Self {
        let get = |suffix: &str| std::env::var(format!("{prefix}_{suffix}")).ok();
        Self {
            base_url: get("BASE_URL").filter(|v| !v.is_empty()),
            model: get("MODEL").unwrap_or_default(),
            api_key: get("API_KEY").unwrap_or_default(),
            num_parallel_tasks: get("NUM_PARALLEL_TASKS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_NUM_PARALLEL_TASKS),
            timeout: Duration::from_secs(
                get("TIMEOUT")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_ENDPOINT_TIMEOUT_SECS),
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
    pub listen_addr: String,
    pub disable_telemetry: bool,
    pub log_level: String,
    pub embedding: EndpointConfig,
    pub enrichment: EndpointConfig,
    pub periodic_sync_enabled: bool,
    pub periodic_sync_interval: Duration,
    pub search_provider: SearchProvider,
}

/// Compiled-in vector search backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchProvider {
    #[default]
    DuckDb,
}

impl SearchProvider {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "duckdb" => SearchProvider::DuckDb,
            unknown => {
                warn!("Unknown search provider '{}', defaulting to DuckDB", unknown);
                SearchProvider::DuckDb
            }
        }
    }
}

fn env_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(value) => matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, DomainError> {
        let data_dir = PathBuf::from(
            std::env::var("DATA_DIR").unwrap_or_else(|_| DEFAULT_DATA_DIR.to_string()),
        );

        // DB_URL accepts a bare path or a duckdb:// prefix.
        let db_path = match std::env::var("DB_URL") {
            Ok(url) if !url.is_empty() => {
                PathBuf::from(url.strip_prefix("duckdb://").unwrap_or(&url))
            }
            _ => data_dir.join("repolens.duckdb"),
        };

        let periodic_sync_interval = Duration::from_secs(
            std::env::var("PERIODIC_SYNC_INTERVAL_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_SYNC_INTERVAL_SECS),
        );

        Ok(Self {
            db_path,
            data_dir,
            listen_addr: std::env::var("LISTEN_ADDR")
                .unwrap_or_else(|_| DEFAULT_LISTEN_ADDR.to_string()),
            disable_telemetry: env_bool("DISABLE_TELEMETRY", false),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            embedding: EndpointConfig::from_env("EMBEDDING_ENDPOINT"),
            enrichment: EndpointConfig::from_env("ENRICHMENT_ENDPOINT"),
            periodic_sync_enabled: env_bool("PERIODIC_SYNC_ENABLED", true),
            periodic_sync_interval,
            search_provider: SearchProvider::from_str(
                &std::env::var("DEFAULT_SEARCH_PROVIDER").unwrap_or_else(|_| "duckdb".to_string()),
            ),
        })
    }

    pub fn clones_dir(&self) -> PathBuf {
        self.data_dir.join("clones")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_search_provider_defaults() {
        assert_eq!(SearchProvider::from_str("vectorchord"), SearchProvider::DuckDb);
        assert_eq!(SearchProvider::from_str("duckdb"), SearchProvider::DuckDb);
    }

    #[test]
    fn test_env_bool_parsing() {
        std::env::set_var("REPOLENS_TEST_FLAG", "true");
        assert!(env_bool("REPOLENS_TEST_FLAG", false));
        std::env::set_var("REPOLENS_TEST_FLAG", "0");
        assert!(!env_bool("REPOLENS_TEST_FLAG", true));
        std::env::remove_var("REPOLENS_TEST_FLAG");
        assert!(env_bool("REPOLENS_TEST_FLAG", true));
    }
}
