use tracing::{info, warn};

use super::app_state::AppState;

/// Starts the process-wide reconciliation schedule.
pub async fn start_background_jobs(state: &AppState) {
    let reconciler = state.job.config();
    if state.job.start().await {
        info!(
            backend = %state.config.store.backend(),
            interval_secs = reconciler.interval.as_secs(),
            "conference status reconciliation scheduled"
        );
    } else {
        warn!("conference status reconciliation was already running");
    }
}

/// Stops the schedule and waits for any in-flight run to finish.
pub async fn shutdown_background_jobs(state: &AppState) {
    state.job.shutdown().await;
    info!("background jobs stopped");
}
