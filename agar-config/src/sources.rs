use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    #[serde(default)]
    pub store: FileStoreConfig,
    #[serde(default)]
    pub reconciler: FileReconcilerConfig,
    #[serde(default)]
    pub countdown: FileCountdownConfig,
    #[serde(default)]
    pub logging: FileLoggingConfig,
    pub dev_mode: Option<bool>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileStoreConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

/// Durations are humantime strings such as `"60s"` or `"2m 30s"`.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileReconcilerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrent_writes: Option<usize>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileCountdownConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tick: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileLoggingConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

/// Environment-derived configuration values.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub store_backend: Option<String>,
    pub store_path: Option<PathBuf>,
    pub firestore_project_id: Option<String>,
    pub firestore_database: Option<String>,
    pub firestore_base_url: Option<String>,
    pub firestore_access_token: Option<String>,
    pub collection: Option<String>,
    pub reconcile_interval: Option<String>,
    pub reconcile_run_timeout: Option<String>,
    pub reconcile_max_concurrent_writes: Option<usize>,
    pub countdown_tick: Option<String>,
    pub dev_mode: Option<bool>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the environment view from an arbitrary variable source.
    /// Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        Self {
            config_path: var("AGAR_CONFIG").map(PathBuf::from),
            store_backend: var("AGAR_STORE_BACKEND"),
            store_path: var("AGAR_STORE_PATH").map(PathBuf::from),
            firestore_project_id: var("FIRESTORE_PROJECT_ID"),
            firestore_database: var("FIRESTORE_DATABASE"),
            firestore_base_url: var("FIRESTORE_BASE_URL"),
            firestore_access_token: var("FIRESTORE_ACCESS_TOKEN"),
            collection: var("AGAR_COLLECTION"),
            reconcile_interval: var("RECONCILE_INTERVAL"),
            reconcile_run_timeout: var("RECONCILE_RUN_TIMEOUT"),
            reconcile_max_concurrent_writes: var("RECONCILE_MAX_CONCURRENT_WRITES")
                .and_then(|s| s.trim().parse().ok()),
            countdown_tick: var("COUNTDOWN_TICK"),
            dev_mode: var("AGAR_DEV_MODE").and_then(|raw| parse_bool(&raw)),
        }
    }
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
