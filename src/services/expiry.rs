use chrono::Utc;
use sqlx::PgPool;
use tokio::time::{sleep, Duration};

use crate::db::queries;

const POLL_INTERVAL_SECS: u64 = 600;

/// Background sweeper for abandoned checkouts. A client who walks away from
/// the hosted payment page never produces a webhook, so their session would
/// sit in `pending_payment` forever; this loop cancels anything older than
/// the configured window.
pub async fn run_expiry_reaper(pool: PgPool, max_age_hours: i64) {
    tracing::info!(max_age_hours, "session expiry reaper started");

    loop {
        match sweep_once(&pool, max_age_hours).await {
            Ok(0) => {}
            Ok(count) => tracing::info!(count, "canceled stale pending-payment sessions"),
            Err(e) => tracing::error!(error = %e, "expiry sweep failed"),
        }

        sleep(Duration::from_secs(POLL_INTERVAL_SECS)).await;
    }
}

pub async fn sweep_once(pool: &PgPool, max_age_hours: i64) -> Result<u64, sqlx::Error> {
    let cutoff = Utc::now() - chrono::Duration::hours(max_age_hours);
    queries::expire_stale_sessions(pool, cutoff).await
}
