//! Periodic reconciliation of persisted conference status.
//!
//! The job lists every conference, resolves each against the clock, and
//! writes back only the records whose status moves forward. One schedule
//! per job; runs never overlap.

use chrono::{DateTime, Utc};
use futures::{StreamExt, stream};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::error::{AgarError, Result};
use crate::record::{ConferenceId, StoredConference};
use crate::status::ConferenceStatus;
use crate::store::ConferenceStore;

/// Tuning for [`ReconciliationJob`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Period between scheduled runs.
    pub interval: Duration,
    /// Upper bound on a scheduled run; exceeding it is logged and retried next period.
    pub run_timeout: Option<Duration>,
    /// Maximum status writes in flight within one run.
    pub max_concurrent_writes: usize,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            run_timeout: None,
            max_concurrent_writes: 8,
        }
    }
}

/// A status change persisted by a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusTransition {
    pub id: ConferenceId,
    pub from: Option<ConferenceStatus>,
    pub to: ConferenceStatus,
}

/// What one reconciliation run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub evaluated_at: Option<DateTime<Utc>>,
    /// Documents returned by the listing.
    pub scanned: usize,
    /// Records written.
    pub updated: usize,
    pub unchanged: usize,
    /// Records missing a boundary; their status is left to organizers.
    pub exempt: usize,
    pub malformed: usize,
    /// Writes that failed and will be retried next run.
    pub failed: usize,
    /// Writes refused because the document changed after it was listed.
    pub conflicts: usize,
    pub transitions: Vec<StatusTransition>,
}

struct Schedule {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct ReconciliationJob {
    store: Arc<dyn ConferenceStore>,
    clock: Arc<dyn Clock>,
    config: ReconcilerConfig,
    run_lock: Mutex<()>,
    schedule: Mutex<Option<Schedule>>,
}

impl fmt::Debug for ReconciliationJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheduled = self
            .schedule
            .try_lock()
            .map(|guard| guard.is_some())
            .unwrap_or(true);
        let running = self.run_lock.try_lock().is_err();

        f.debug_struct("ReconciliationJob")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .field("scheduled", &scheduled)
            .field("run_in_flight", &running)
            .finish()
    }
}

impl ReconciliationJob {
    pub fn new(
        store: Arc<dyn ConferenceStore>,
        clock: Arc<dyn Clock>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            store,
            clock,
            config,
            run_lock: Mutex::new(()),
            schedule: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Runs one pass, waiting for any in-flight pass to finish first.
    ///
    /// Only a failure to list the collection is returned as an error;
    /// per-record problems are logged and counted in the report.
    pub async fn run_once(&self) -> Result<ReconcileReport> {
        let _guard = self.run_lock.lock().await;
        self.reconcile().await
    }

    /// Runs one pass unless another is in flight, in which case `None`.
    pub async fn try_run_once(&self) -> Option<Result<ReconcileReport>> {
        let Ok(_guard) = self.run_lock.try_lock() else {
            return None;
        };
        Some(self.reconcile().await)
    }

    /// Runs immediately, then every configured interval. Returns `false`
    /// when a schedule is already active.
    pub async fn start(self: &Arc<Self>) -> bool {
        let mut schedule = self.schedule.lock().await;
        if schedule
            .as_ref()
            .is_some_and(|active| !active.handle.is_finished())
        {
            debug!("reconciliation job already started");
            return false;
        }

        let token = CancellationToken::new();
        let job = Arc::clone(self);
        let loop_token = token.clone();
        let handle = tokio::spawn(async move { job.run_schedule(loop_token).await });
        *schedule = Some(Schedule { token, handle });

        info!(
            interval_secs = self.config.interval.as_secs_f64(),
            max_concurrent_writes = self.config.max_concurrent_writes,
            "reconciliation job started"
        );
        true
    }

    /// Cancels the schedule. No tick starts after this returns; a run that
    /// is already in flight finishes on its own. Idempotent.
    pub async fn stop(&self) -> bool {
        let Some(schedule) = self.schedule.lock().await.take() else {
            return false;
        };
        schedule.token.cancel();
        info!("reconciliation job stopped");
        true
    }

    /// Cancels the schedule and waits for the loop, including any in-flight
    /// run, to exit.
    pub async fn shutdown(&self) {
        let Some(Schedule { token, handle }) = self.schedule.lock().await.take() else {
            return;
        };
        token.cancel();
        if let Err(err) = handle.await {
            if !err.is_cancelled() {
                error!(error = %err, "reconciliation loop panicked");
            }
        }
        info!("reconciliation job shut down");
    }

    pub async fn is_scheduled(&self) -> bool {
        self.schedule
            .lock()
            .await
            .as_ref()
            .is_some_and(|active| !active.handle.is_finished())
    }

    async fn run_schedule(&self, token: CancellationToken) {
        let mut ticker = interval(self.config.interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // A tick that fell due while the previous run was still going is
        // dropped, not run late.
        let mut last_run_end: Option<Instant> = None;

        loop {
            let scheduled = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                at = ticker.tick() => at,
            };

            if last_run_end.is_some_and(|ended| scheduled < ended) {
                let overdue = Instant::now().saturating_duration_since(scheduled);
                debug!(
                    overdue_ms = overdue.as_millis() as u64,
                    "tick fell due during the previous run; skipping"
                );
                continue;
            }

            self.scheduled_tick().await;
            last_run_end = Some(Instant::now());
        }

        debug!("reconciliation loop exited");
    }

    async fn scheduled_tick(&self) {
        let Ok(_guard) = self.run_lock.try_lock() else {
            debug!("previous reconciliation still in flight; skipping tick");
            return;
        };

        let outcome = match self.config.run_timeout {
            Some(limit) => timeout(limit, self.reconcile())
                .await
                .unwrap_or_else(|_| {
                    Err(AgarError::Timeout(format!(
                        "reconciliation exceeded {}s",
                        limit.as_secs_f64()
                    )))
                }),
            None => self.reconcile().await,
        };

        if let Err(err) = outcome {
            warn!(
                error = %err,
                transient = err.is_transient(),
                "reconciliation tick failed; retrying next period"
            );
        }
    }

    async fn reconcile(&self) -> Result<ReconcileReport> {
        let entries = self.store.list_conferences().await?;
        let now = self.clock.now();

        let mut report = ReconcileReport {
            evaluated_at: Some(now),
            scanned: entries.len(),
            ..ReconcileReport::default()
        };

        let mut pending = Vec::new();
        for entry in entries {
            let record = match entry {
                StoredConference::Valid(record) => record,
                StoredConference::Malformed(malformed) => {
                    warn!(
                        conference = %malformed.id,
                        reason = %malformed.reason,
                        "skipping malformed conference"
                    );
                    report.malformed += 1;
                    continue;
                }
            };

            if !record.is_time_managed() {
                report.exempt += 1;
                continue;
            }

            let next = record.reconcile(now);
            if next == record.stored_status() {
                report.unchanged += 1;
            } else {
                pending.push(StatusTransition {
                    id: record.id,
                    from: record.status,
                    to: next,
                });
            }
        }

        let store = &self.store;
        let results: Vec<_> = stream::iter(pending)
            .map(|transition| async move {
                let result = store
                    .update_status(&transition.id, transition.to, now)
                    .await;
                (transition, result)
            })
            .buffer_unordered(self.config.max_concurrent_writes.max(1))
            .collect()
            .await;

        for (transition, result) in results {
            match result {
                Ok(()) => {
                    debug!(
                        conference = %transition.id,
                        from = ?transition.from,
                        to = %transition.to,
                        "conference status advanced"
                    );
                    report.updated += 1;
                    report.transitions.push(transition);
                }
                Err(AgarError::Conflict(detail)) => {
                    info!(
                        conference = %transition.id,
                        to = %transition.to,
                        %detail,
                        "conference changed since it was listed; skipping until next run"
                    );
                    report.conflicts += 1;
                }
                Err(err) => {
                    warn!(
                        conference = %transition.id,
                        to = %transition.to,
                        error = %err,
                        "failed to persist conference status"
                    );
                    report.failed += 1;
                }
            }
        }

        info!(
            scanned = report.scanned,
            updated = report.updated,
            unchanged = report.unchanged,
            exempt = report.exempt,
            malformed = report.malformed,
            failed = report.failed,
            conflicts = report.conflicts,
            "reconciliation run complete"
        );

        Ok(report)
    }
}
