use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::QuotaTracker;

/// Spawn a task that evicts expired quota windows every `every`.
///
/// The task exits when `cancel` fires.
pub fn spawn_sweeper(
    tracker: Arc<QuotaTracker>,
    every: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("Quota sweeper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    tracker.sweep_expired();
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::domain::{ClientIdentity, ResourceKey};
    use crate::quota::{InMemoryQuotaStore, QuotaPolicies, QuotaPolicy};

    #[tokio::test(start_paused = true)]
    async fn sweeps_on_interval_and_stops_on_cancel() {
        let clock = Arc::new(ManualClock::new(0));
        let store = Arc::new(InMemoryQuotaStore::new());
        let policies = QuotaPolicies::new().with(
            ResourceKey::quote(),
            QuotaPolicy::new(5, Duration::from_secs(1), "slow down"),
        );
        let tracker = Arc::new(QuotaTracker::new(policies, store.clone(), clock.clone()));
        tracker.check_and_consume(&ClientIdentity::new("a"), &ResourceKey::quote());
        assert_eq!(store.client_count(), 1);

        let cancel = CancellationToken::new();
        let handle = spawn_sweeper(tracker, Duration::from_secs(60), cancel.clone());

        clock.advance(Duration::from_secs(2));
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(store.client_count(), 0);

        cancel.cancel();
        handle.await.unwrap();
    }
}
