use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info};

use crate::db::RefreshStore;
use crate::error::AppError;

/// Refresh sessions are swept once a day.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Deletes every refresh session whose expiry lies before `now`. Safe to
/// run concurrently with itself; deleting by expiry predicate commutes.
pub async fn sweep_expired(
    store: &dyn RefreshStore,
    now: DateTime<Utc>,
) -> Result<u64, AppError> {
    store.delete_all_expired(now).await
}

/// Spawns the daily sweep task. Failures are logged and the task keeps
/// ticking.
pub fn start_sweeper(store: Arc<dyn RefreshStore>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(SWEEP_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            match sweep_expired(store.as_ref(), Utc::now()).await {
                Ok(count) => info!("Removed {} expired refresh sessions", count),
                Err(e) => error!("Expired refresh session sweep failed: {}", e),
            }
        }
    })
}
