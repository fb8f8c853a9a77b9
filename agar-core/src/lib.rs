//! # Agar Core
//!
//! Conference lifecycle for the Agar microbiology conference hub: deciding
//! whether a conference is upcoming, live, or ended, keeping the persisted
//! status in step with the clock, and driving "ends in" countdowns.
//!
//! ## Overview
//!
//! - **Status resolution**: one pure function, [`resolve_status`], used by every consumer
//! - **Reconciliation**: [`ReconciliationJob`] persists forward-only transitions on a schedule
//! - **Countdowns**: [`CountdownEngine`] publishes remaining time once per tick
//! - **Catalog**: [`ConferenceCatalog`] buckets records for display
//! - **Stores**: [`ConferenceStore`] with in-memory, JSON file, and Firestore REST backends
//!
//! ## Feature Flags
//!
//! - `firestore` (default): enables the Firestore REST adapter
//!
//! ## Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use agar_core::{
//!     ConferenceRecord, InMemoryConferenceStore, ReconcilerConfig, ReconciliationJob,
//!     SystemClock,
//! };
//!
//! # async fn demo() -> agar_core::Result<()> {
//! let store = InMemoryConferenceStore::with_records([ConferenceRecord::new("plenary")]);
//! let job = Arc::new(ReconciliationJob::new(
//!     Arc::new(store),
//!     Arc::new(SystemClock),
//!     ReconcilerConfig::default(),
//! ));
//!
//! let report = job.run_once().await?;
//! println!("{} conferences updated", report.updated);
//!
//! job.start().await;
//! // ...
//! job.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod clock;
pub mod countdown;
pub mod error;
pub mod reconcile;
pub mod record;
pub mod status;
pub mod store;
pub mod timestamp;

pub use catalog::{CatalogEntry, ConferenceCatalog};
pub use clock::{Clock, ManualClock, SystemClock};
pub use countdown::{Countdown, CountdownEngine, Remaining};
pub use error::{AgarError, Result};
pub use reconcile::{ReconcileReport, ReconcilerConfig, ReconciliationJob, StatusTransition};
pub use record::{ConferenceId, ConferenceRecord, MalformedRecord, StoredConference};
pub use status::{ConferenceStatus, UnknownStatus, reconciled_status, resolve_status};
#[cfg(feature = "firestore")]
pub use store::{FirestoreConferenceStore, FirestoreSettings};
pub use store::{ConferenceStore, InMemoryConferenceStore, JsonFileConferenceStore};
pub use timestamp::{TimestampError, normalize_instant};
