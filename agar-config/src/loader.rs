use agar_core::FirestoreSettings;
use agar_core::ReconcilerConfig;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use super::{
    models::{
        Config, ConfigMetadata, CountdownConfig, DEFAULT_LOG_FILTER, LoggingConfig, StoreBackend,
        StoreConfig,
    },
    sources::{EnvConfig, FileConfig, FileStoreConfig},
    validation::{self, ConfigGuardRailError, ConfigWarnings},
};

const DEFAULT_CONFIG_LOCATIONS: [&str; 2] = ["agar.toml", "config/agar.toml"];

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    /// Loads `.env`, then the process environment, then the config file.
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = self.load_env_file()?;
        let mut load = self.load_with_env(EnvConfig::gather())?;
        load.config.metadata.env_file_loaded = env_file_loaded;
        Ok(load)
    }

    /// Same as [`ConfigLoader::load`] but with the environment supplied by
    /// the caller and no `.env` handling.
    pub fn load_with_env(&self, env: EnvConfig) -> Result<ConfigLoad, ConfigLoadError> {
        let (file_config, config_path) = self.load_file_config(&env)?;
        let (config, warnings) = compose_config(file_config, env, config_path)?;
        Ok(ConfigLoad { config, warnings })
    }

    fn load_env_file(&self) -> Result<bool, ConfigLoadError> {
        let loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true),
            None => dotenvy::dotenv().map(|_| true),
        };
        loaded.or_else(|err| match err {
            dotenvy::Error::Io(_) => Ok(false),
            _ => Err(err.into()),
        })
    }

    fn load_file_config(
        &self,
        env: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let requested = self
            .options
            .config_path
            .clone()
            .or_else(|| env.config_path.clone());

        let path = match requested {
            Some(path) if !path.exists() => return Err(ConfigLoadError::MissingConfig { path }),
            Some(path) => path,
            None => match DEFAULT_CONFIG_LOCATIONS
                .iter()
                .map(PathBuf::from)
                .find(|candidate| candidate.exists())
            {
                Some(path) => path,
                None => return Ok((None, None)),
            },
        };

        let contents = fs::read_to_string(&path).map_err(|source| ConfigLoadError::Io {
            path: path.clone(),
            source,
        })?;
        let file_config: FileConfig =
            toml::from_str(&contents).map_err(|source| ConfigLoadError::Parse {
                path: path.clone(),
                source,
            })?;
        debug!(path = %path.display(), "loaded configuration file");

        Ok((Some(file_config), Some(path)))
    }
}

fn compose_config(
    file_config: Option<FileConfig>,
    env: EnvConfig,
    config_path: Option<PathBuf>,
) -> Result<(Config, ConfigWarnings), ConfigLoadError> {
    let mut warnings = ConfigWarnings::default();

    if file_config.is_none() {
        warnings.push_with_hint(
            "No agar.toml detected; using environment variables and defaults",
            "Pass --config or set AGAR_CONFIG to point at a configuration file",
        );
    }

    let FileConfig {
        store: file_store,
        reconciler: file_reconciler,
        countdown: file_countdown,
        logging: file_logging,
        dev_mode: file_dev_mode,
    } = file_config.unwrap_or_default();

    let store = compose_store(&env, file_store)?;

    let defaults = ReconcilerConfig::default();
    let reconciler = ReconcilerConfig {
        interval: duration_setting(
            "reconciler.interval",
            env.reconcile_interval.or(file_reconciler.interval),
        )?
        .unwrap_or(defaults.interval),
        run_timeout: duration_setting(
            "reconciler.run_timeout",
            env.reconcile_run_timeout.or(file_reconciler.run_timeout),
        )?,
        max_concurrent_writes: env
            .reconcile_max_concurrent_writes
            .or(file_reconciler.max_concurrent_writes)
            .unwrap_or(defaults.max_concurrent_writes),
    };

    let countdown = CountdownConfig {
        tick: duration_setting("countdown.tick", env.countdown_tick.or(file_countdown.tick))?
            .unwrap_or(agar_core::countdown::DEFAULT_TICK),
    };

    let logging = LoggingConfig {
        filter: file_logging
            .filter
            .filter(|filter| !filter.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
    };

    let config = Config {
        store,
        reconciler,
        countdown,
        logging,
        dev_mode: env.dev_mode.or(file_dev_mode).unwrap_or(false),
        metadata: ConfigMetadata {
            config_path,
            env_file_loaded: false,
        },
    };

    warnings.extend(validation::apply_guard_rails(&config)?);

    Ok((config, warnings))
}

fn compose_store(env: &EnvConfig, file: FileStoreConfig) -> Result<StoreConfig, ConfigLoadError> {
    let backend = match env.store_backend.clone().or(file.backend) {
        Some(raw) => raw
            .parse::<StoreBackend>()
            .map_err(|value| ConfigLoadError::UnknownBackend { value })?,
        None => StoreBackend::default(),
    };

    Ok(match backend {
        StoreBackend::Memory => StoreConfig::Memory,
        StoreBackend::File => StoreConfig::File {
            path: env
                .store_path
                .clone()
                .or(file.path)
                .ok_or(ConfigLoadError::MissingSetting {
                    backend,
                    setting: "AGAR_STORE_PATH",
                })?,
        },
        StoreBackend::Firestore => {
            let project_id = env
                .firestore_project_id
                .clone()
                .or(file.project_id)
                .ok_or(ConfigLoadError::MissingSetting {
                    backend,
                    setting: "FIRESTORE_PROJECT_ID",
                })?;

            let mut settings = FirestoreSettings::new(project_id);
            if let Some(database) = env.firestore_database.clone().or(file.database) {
                settings.database = database;
            }
            if let Some(collection) = env.collection.clone().or(file.collection) {
                settings.collection = collection;
            }
            if let Some(base_url) = env.firestore_base_url.clone().or(file.base_url) {
                settings.base_url = base_url;
            }
            settings.access_token = env.firestore_access_token.clone().or(file.access_token);
            StoreConfig::Firestore(settings)
        }
    })
}

fn duration_setting(
    field: &'static str,
    raw: Option<String>,
) -> Result<Option<Duration>, ConfigLoadError> {
    raw.map(|value| {
        humantime::parse_duration(value.trim())
            .map_err(|source| ConfigLoadError::InvalidDuration { field, value, source })
    })
    .transpose()
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file missing: {path}")]
    MissingConfig { path: PathBuf },
    #[error("failed to read configuration {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid duration '{value}' for {field}")]
    InvalidDuration {
        field: &'static str,
        value: String,
        #[source]
        source: humantime::DurationError,
    },
    #[error("unknown store backend '{value}' (expected memory, file, or firestore)")]
    UnknownBackend { value: String },
    #[error("{backend} store requires {setting}")]
    MissingSetting {
        backend: StoreBackend,
        setting: &'static str,
    },
    #[error(transparent)]
    GuardRail(#[from] ConfigGuardRailError),
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}
