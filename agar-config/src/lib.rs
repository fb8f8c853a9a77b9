//! Configuration for the Agar reconciliation service.
//!
//! Values come from a TOML file and the process environment; environment
//! variables, including any loaded from `.env`, override the file. Guard
//! rails reject settings the job cannot run with and collect warnings for
//! the rest.

pub mod loader;
pub mod models;
pub mod sources;
pub mod validation;

pub use loader::{ConfigLoad, ConfigLoadError, ConfigLoader, ConfigLoaderOptions};
pub use models::{
    Config, ConfigMetadata, CountdownConfig, LoggingConfig, StoreBackend, StoreConfig,
};
pub use sources::{EnvConfig, FileConfig};
pub use validation::{ConfigGuardRailError, ConfigWarning, ConfigWarnings, apply_guard_rails};
