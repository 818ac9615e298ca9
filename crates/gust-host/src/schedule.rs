use std::time::Duration;

use gust_core::Updater;
use log::{debug, info, warn};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Floor below which periodic checks start to waste feed quota. Shorter
/// intervals are allowed (demos, tests) but logged.
pub const RECOMMENDED_MIN_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Drive `check_for_update` on a fixed interval until `shutdown` fires.
///
/// The first check runs immediately; later ones follow `every`. Checks never
/// install, so overlapping with a user-triggered update is safe; actual
/// `update`/`install` calls must still be serialized by the caller.
pub async fn run_periodic_checks(updater: &Updater, every: Duration, shutdown: CancellationToken) {
    if every < RECOMMENDED_MIN_INTERVAL {
        warn!(
            "Update check interval {}s is below the recommended minimum of {}s",
            every.as_secs(),
            RECOMMENDED_MIN_INTERVAL.as_secs()
        );
    }

    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                updater.check_for_update(None).await;
            }
        }
    }

    debug!("Periodic update checks stopped");
}

/// Log the feed's current rate-limit snapshot (diagnostic menu action).
pub async fn log_rate_limit(updater: &Updater) {
    match updater.rate_limit().await {
        Ok(status) => info!(
            "RateLimit {{limit:{} remaining:{} resetAt:{}}}",
            status.limit, status.remaining, status.resets_at
        ),
        Err(err) => warn!("Rate limit unavailable: {err}"),
    }
}
