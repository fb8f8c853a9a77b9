use std::time::Duration;
use thiserror::Error;

use super::models::{Config, StoreConfig};

/// Schedules tighter than this mostly generate list traffic.
pub const MIN_RECOMMENDED_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ConfigGuardRailError {
    #[error("reconciler interval must be greater than zero")]
    ZeroInterval,
    #[error("reconciler max_concurrent_writes must be at least 1")]
    ZeroConcurrency,
    #[error("countdown tick must be greater than zero")]
    ZeroCountdownTick,
}

#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push_with_hint<S: Into<String>, H: Into<String>>(&mut self, message: S, hint: H) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn extend(&mut self, other: ConfigWarnings) {
        self.items.extend(other.items);
    }
}

pub fn apply_guard_rails(config: &Config) -> Result<ConfigWarnings, ConfigGuardRailError> {
    let mut warnings = ConfigWarnings::default();
    let reconciler = &config.reconciler;

    if reconciler.interval.is_zero() {
        return Err(ConfigGuardRailError::ZeroInterval);
    }
    if reconciler.max_concurrent_writes == 0 {
        return Err(ConfigGuardRailError::ZeroConcurrency);
    }
    if config.countdown.tick.is_zero() {
        return Err(ConfigGuardRailError::ZeroCountdownTick);
    }

    if reconciler.interval < MIN_RECOMMENDED_INTERVAL {
        warnings.push_with_hint(
            format!(
                "Reconciler interval of {} lists the whole collection very often",
                humantime::format_duration(reconciler.interval)
            ),
            "Set RECONCILE_INTERVAL to at least 10s unless testing locally",
        );
    }

    if let Some(limit) = reconciler.run_timeout
        && limit > reconciler.interval
    {
        warnings.push_with_hint(
            "RECONCILE_RUN_TIMEOUT exceeds the interval; slow runs will swallow ticks",
            "Keep the run timeout below the reconciler interval",
        );
    }

    match &config.store {
        StoreConfig::Memory if !config.dev_mode => {
            warnings.push_with_hint(
                "In-memory store selected; conference status is lost on restart",
                "Set AGAR_STORE_BACKEND=file or firestore, or AGAR_DEV_MODE=true to silence this",
            );
        }
        StoreConfig::Firestore(settings) if settings.access_token.is_none() => {
            warnings.push_with_hint(
                "FIRESTORE_ACCESS_TOKEN not set; requests are sent unauthenticated",
                "Only expected against the emulator or with open security rules",
            );
        }
        _ => {}
    }

    Ok(warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConfigMetadata, CountdownConfig, LoggingConfig};
    use agar_core::{FirestoreSettings, ReconcilerConfig};

    fn config(store: StoreConfig, reconciler: ReconcilerConfig) -> Config {
        Config {
            store,
            reconciler,
            countdown: CountdownConfig::default(),
            logging: LoggingConfig::default(),
            dev_mode: false,
            metadata: ConfigMetadata::default(),
        }
    }

    fn file_store() -> StoreConfig {
        StoreConfig::File {
            path: "conferences.json".into(),
        }
    }

    #[test]
    fn defaults_with_durable_store_are_clean() {
        let warnings =
            apply_guard_rails(&config(file_store(), ReconcilerConfig::default())).unwrap();
        assert!(warnings.is_empty());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let reconciler = ReconcilerConfig {
            interval: Duration::ZERO,
            ..ReconcilerConfig::default()
        };
        assert!(matches!(
            apply_guard_rails(&config(file_store(), reconciler)),
            Err(ConfigGuardRailError::ZeroInterval)
        ));
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let reconciler = ReconcilerConfig {
            max_concurrent_writes: 0,
            ..ReconcilerConfig::default()
        };
        assert!(matches!(
            apply_guard_rails(&config(file_store(), reconciler)),
            Err(ConfigGuardRailError::ZeroConcurrency)
        ));
    }

    #[test]
    fn tight_interval_and_long_timeout_warn() {
        let reconciler = ReconcilerConfig {
            interval: Duration::from_secs(5),
            run_timeout: Some(Duration::from_secs(30)),
            max_concurrent_writes: 8,
        };
        let warnings = apply_guard_rails(&config(file_store(), reconciler)).unwrap();
        assert_eq!(warnings.len(), 2);
        assert!(warnings.items.iter().all(|w| w.hint.is_some()));
    }

    #[test]
    fn memory_store_warns_outside_dev_mode() {
        let mut cfg = config(StoreConfig::Memory, ReconcilerConfig::default());
        assert_eq!(apply_guard_rails(&cfg).unwrap().len(), 1);

        cfg.dev_mode = true;
        assert!(apply_guard_rails(&cfg).unwrap().is_empty());
    }

    #[test]
    fn unauthenticated_firestore_warns() {
        let store = StoreConfig::Firestore(FirestoreSettings::new("agar-dev"));
        let warnings = apply_guard_rails(&config(store, ReconcilerConfig::default())).unwrap();
        assert!(warnings.items[0].message.contains("FIRESTORE_ACCESS_TOKEN"));
    }
}
