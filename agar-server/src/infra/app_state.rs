use agar_config::{Config, StoreConfig};
#[cfg(test)]
use agar_core::ManualClock;
use agar_core::{
    Clock, ConferenceStore, CountdownEngine, FirestoreConferenceStore, InMemoryConferenceStore,
    JsonFileConferenceStore, ReconciliationJob, SystemClock,
};
use anyhow::Context;
use std::fmt;
use std::sync::Arc;

/// Everything a command needs, wired once from configuration.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn ConferenceStore>,
    pub clock: Arc<dyn Clock>,
    pub job: Arc<ReconciliationJob>,
    pub countdowns: CountdownEngine,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("backend", &self.config.store.backend())
            .field("clock", &self.clock)
            .field("job", &self.job)
            .finish()
    }
}

impl AppState {
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let store = build_store(&config.store)?;
        Ok(Self::with_parts(config, store, Arc::new(SystemClock)))
    }

    pub fn with_parts(
        config: Config,
        store: Arc<dyn ConferenceStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let job = Arc::new(ReconciliationJob::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            config.reconciler.clone(),
        ));
        let countdowns = CountdownEngine::new(Arc::clone(&clock)).with_tick(config.countdown.tick);

        Self {
            config: Arc::new(config),
            store,
            clock,
            job,
            countdowns,
        }
    }

    #[cfg(test)]
    pub fn for_tests(store: InMemoryConferenceStore, clock: Arc<ManualClock>) -> Self {
        use agar_config::{ConfigMetadata, CountdownConfig, LoggingConfig};

        let config = Config {
            store: StoreConfig::Memory,
            reconciler: agar_core::ReconcilerConfig::default(),
            countdown: CountdownConfig::default(),
            logging: LoggingConfig::default(),
            dev_mode: true,
            metadata: ConfigMetadata::default(),
        };
        Self::with_parts(config, Arc::new(store), clock)
    }
}

pub fn build_store(store: &StoreConfig) -> anyhow::Result<Arc<dyn ConferenceStore>> {
    Ok(match store {
        StoreConfig::Memory => Arc::new(InMemoryConferenceStore::new()),
        StoreConfig::File { path } => Arc::new(JsonFileConferenceStore::new(path.clone())),
        StoreConfig::Firestore(settings) => Arc::new(
            FirestoreConferenceStore::new(settings.clone())
                .context("failed to build Firestore client")?,
        ),
    })
}
