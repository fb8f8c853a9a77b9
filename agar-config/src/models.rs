use agar_core::{FirestoreSettings, ReconcilerConfig};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone)]
pub struct Config {
    pub store: StoreConfig,
    pub reconciler: ReconcilerConfig,
    pub countdown: CountdownConfig,
    pub logging: LoggingConfig,
    pub dev_mode: bool,
    pub metadata: ConfigMetadata,
}

/// Which document store backs the service.
#[derive(Debug, Clone)]
pub enum StoreConfig {
    Memory,
    File { path: PathBuf },
    Firestore(FirestoreSettings),
}

impl StoreConfig {
    pub fn backend(&self) -> StoreBackend {
        match self {
            StoreConfig::Memory => StoreBackend::Memory,
            StoreConfig::File { .. } => StoreBackend::File,
            StoreConfig::Firestore(_) => StoreBackend::Firestore,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StoreBackend {
    #[default]
    Memory,
    File,
    Firestore,
}

impl StoreBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            StoreBackend::Memory => "memory",
            StoreBackend::File => "file",
            StoreBackend::Firestore => "firestore",
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "in-memory" => Ok(StoreBackend::Memory),
            "file" | "json" => Ok(StoreBackend::File),
            "firestore" => Ok(StoreBackend::Firestore),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CountdownConfig {
    pub tick: Duration,
}

impl Default for CountdownConfig {
    fn default() -> Self {
        Self {
            tick: agar_core::countdown::DEFAULT_TICK,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive; `RUST_LOG` takes precedence.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}
