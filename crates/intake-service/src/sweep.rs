//! The daily catch-up sweep.
//!
//! Once a day, at the configured UTC time, every submission whose
//! synchronous delivery never reached the mark-reported step is re-delivered
//! and marked. The task holds no per-user lock, so it never blocks a
//! conversation in progress.

use std::sync::Arc;

use chrono::{DateTime, NaiveTime, Utc};

use crate::state::AppState;

/// Spawn the daily sweep task.
pub fn spawn_daily_sweep(state: Arc<AppState>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let wait = duration_until(Utc::now(), state.config.sweep_at);
            tracing::debug!(seconds = wait.as_secs(), "Next sweep scheduled");
            tokio::time::sleep(wait).await;

            match state
                .dispatcher
                .sweep_unreported(state.ledger.as_ref())
                .await
            {
                Ok(0) => tracing::debug!("Sweep found nothing to deliver"),
                Ok(count) => tracing::info!(count, "Sweep delivered unreported submissions"),
                Err(e) => tracing::error!(error = %e, "Sweep failed, will retry tomorrow"),
            }
        }
    })
}

/// Time left until the next daily occurrence of `at`.
fn duration_until(now: DateTime<Utc>, at: NaiveTime) -> std::time::Duration {
    let today = now.date_naive().and_time(at).and_utc();
    let next = if today > now {
        today
    } else {
        today + chrono::Duration::days(1)
    };
    (next - now).to_std().unwrap_or_default()
}
