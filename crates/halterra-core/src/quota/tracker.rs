use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use super::{QuotaKey, QuotaPolicies, QuotaStore, QuotaWindow};
use crate::clock::Clock;
use crate::domain::{ClientIdentity, ResourceKey};

/// Requests left in the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remaining {
    Limited(u32),
    /// The resource has no policy.
    Unlimited,
}

/// Outcome of one admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaDecision {
    pub allowed: bool,
    /// Policy maximum, `None` when unmetered.
    pub limit: Option<u32>,
    pub remaining: Remaining,
    /// Epoch milliseconds of the window reset; `0` when unmetered.
    pub reset_at_ms: i64,
    /// Whole seconds until the window resets, set only on rejection.
    pub retry_after_secs: Option<u64>,
    /// Policy message, set only on rejection.
    pub message: Option<String>,
}

impl QuotaDecision {
    const fn unmetered() -> Self {
        Self {
            allowed: true,
            limit: None,
            remaining: Remaining::Unlimited,
            reset_at_ms: 0,
            retry_after_secs: None,
            message: None,
        }
    }

    pub const fn is_metered(&self) -> bool {
        self.limit.is_some()
    }

    /// The reset instant as a UTC timestamp.
    pub fn reset_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.reset_at_ms).unwrap_or_default()
    }
}

/// Usage of one resource across all clients.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceStats {
    pub total_requests: u64,
    pub active_clients: usize,
}

/// Snapshot of everything the tracker currently holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaStats {
    pub tracked_clients: usize,
    pub resources: BTreeMap<String, ResourceStats>,
    pub timestamp: DateTime<Utc>,
}

/// Admits or rejects requests against per-client quota windows.
pub struct QuotaTracker {
    policies: QuotaPolicies,
    store: Arc<dyn QuotaStore>,
    clock: Arc<dyn Clock>,
    // Serialises read-modify-write sequences against the store. Held only
    // for synchronous store calls, never across an await.
    critical: Mutex<()>,
}

impl QuotaTracker {
    pub fn new(policies: QuotaPolicies, store: Arc<dyn QuotaStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            policies,
            store,
            clock,
            critical: Mutex::new(()),
        }
    }

    pub const fn policies(&self) -> &QuotaPolicies {
        &self.policies
    }

    /// Check the quota for `(client, resource)` and consume one unit if admitted.
    pub fn check_and_consume(
        &self,
        client: &ClientIdentity,
        resource: &ResourceKey,
    ) -> QuotaDecision {
        let Some(policy) = self.policies.get(resource) else {
            return QuotaDecision::unmetered();
        };

        let key = QuotaKey::new(client.clone(), resource.clone());
        let _guard = self.critical.lock().unwrap_or_else(PoisonError::into_inner);
        let now = self.clock.now_ms();

        let mut window = match self.store.get(&key) {
            Some(window) if !window.is_expired(now) => window,
            _ => QuotaWindow::fresh(now, policy.window_ms()),
        };

        if window.count >= policy.max_requests {
            // Persist in case the window was just renewed.
            self.store.put(&key, window);
            return QuotaDecision {
                allowed: false,
                limit: Some(policy.max_requests),
                remaining: Remaining::Limited(0),
                reset_at_ms: window.reset_at_ms,
                retry_after_secs: Some(ceil_secs(window.reset_at_ms - now)),
                message: Some(policy.message.clone()),
            };
        }

        window.count += 1;
        self.store.put(&key, window);

        QuotaDecision {
            allowed: true,
            limit: Some(policy.max_requests),
            remaining: Remaining::Limited(policy.max_requests - window.count),
            reset_at_ms: window.reset_at_ms,
            retry_after_secs: None,
            message: None,
        }
    }

    /// Delete every expired window. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let _guard = self.critical.lock().unwrap_or_else(PoisonError::into_inner);
        let now = self.clock.now_ms();

        let removed = self
            .store
            .entries()
            .into_iter()
            .filter(|(_, window)| window.is_expired(now))
            .filter(|(key, _)| self.store.delete(key))
            .count();

        if removed > 0 {
            debug!(removed, "Swept expired quota windows");
        }
        removed
    }

    /// Forget a client's windows: one resource, or all of them when `None`.
    ///
    /// Returns whether anything was removed.
    pub fn reset(&self, client: &ClientIdentity, resource: Option<&ResourceKey>) -> bool {
        let _guard = self.critical.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(resource) = resource {
            return self
                .store
                .delete(&QuotaKey::new(client.clone(), resource.clone()));
        }

        self.store
            .entries()
            .into_iter()
            .filter(|(key, _)| &key.client == client)
            .filter(|(key, _)| self.store.delete(key))
            .count()
            > 0
    }

    pub fn stats(&self) -> QuotaStats {
        let entries = self.store.entries();
        let mut clients: Vec<&ClientIdentity> = entries.iter().map(|(key, _)| &key.client).collect();
        clients.sort_unstable();
        clients.dedup();

        let mut resources: BTreeMap<String, ResourceStats> = BTreeMap::new();
        for (key, window) in &entries {
            let stats = resources.entry(key.resource.to_string()).or_default();
            stats.total_requests += u64::from(window.count);
            stats.active_clients += 1;
        }

        QuotaStats {
            tracked_clients: clients.len(),
            resources,
            timestamp: Utc::now(),
        }
    }
}

/// Ceiling division of a positive millisecond span into seconds.
fn ceil_secs(span_ms: i64) -> u64 {
    u64::try_from(span_ms.max(0)).unwrap_or(0).div_ceil(1000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::quota::{InMemoryQuotaStore, QuotaPolicy};
    use std::time::Duration;

    const T0: i64 = 1_700_000_000_000;

    fn tracker_with(max: u32, window: Duration) -> (QuotaTracker, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(T0));
        let policies = QuotaPolicies::new()
            .with(ResourceKey::generate_text(), QuotaPolicy::new(max, window, "limit reached"))
            .with(ResourceKey::quote(), QuotaPolicy::new(max, window, "quote limit"));
        let tracker = QuotaTracker::new(policies, Arc::new(InMemoryQuotaStore::new()), clock.clone());
        (tracker, clock)
    }

    fn client(id: &str) -> ClientIdentity {
        ClientIdentity::new(id)
    }

    #[test]
    fn admits_n_then_rejects() {
        let (tracker, clock) = tracker_with(3, Duration::from_secs(60));
        let resource = ResourceKey::generate_text();

        let remaining: Vec<Remaining> = (0..3)
            .map(|_| {
                let decision = tracker.check_and_consume(&client("a"), &resource);
                assert!(decision.allowed);
                decision.remaining
            })
            .collect();
        assert_eq!(
            remaining,
            vec![Remaining::Limited(2), Remaining::Limited(1), Remaining::Limited(0)]
        );

        clock.advance(Duration::from_millis(10_500));
        let rejected = tracker.check_and_consume(&client("a"), &resource);
        assert!(!rejected.allowed);
        assert_eq!(rejected.remaining, Remaining::Limited(0));
        assert_eq!(rejected.limit, Some(3));
        assert_eq!(rejected.message.as_deref(), Some("limit reached"));
        // 49.5s left in the window rounds up.
        assert_eq!(rejected.retry_after_secs, Some(50));
        assert_eq!(rejected.reset_at_ms, T0 + 60_000);
    }

    #[test]
    fn window_resets_after_expiry() {
        let (tracker, clock) = tracker_with(2, Duration::from_secs(60));
        let resource = ResourceKey::generate_text();
        tracker.check_and_consume(&client("a"), &resource);
        tracker.check_and_consume(&client("a"), &resource);
        assert!(!tracker.check_and_consume(&client("a"), &resource).allowed);

        clock.advance(Duration::from_secs(60));
        let decision = tracker.check_and_consume(&client("a"), &resource);
        assert!(decision.allowed);
        assert_eq!(decision.remaining, Remaining::Limited(1));
        assert_eq!(decision.reset_at_ms, T0 + 120_000);
    }

    #[test]
    fn clients_and_resources_are_isolated() {
        let (tracker, _clock) = tracker_with(1, Duration::from_secs(60));
        let text = ResourceKey::generate_text();
        let quote = ResourceKey::quote();

        assert!(tracker.check_and_consume(&client("a"), &text).allowed);
        assert!(!tracker.check_and_consume(&client("a"), &text).allowed);

        let other_client = tracker.check_and_consume(&client("b"), &text);
        assert!(other_client.allowed);
        assert_eq!(other_client.remaining, Remaining::Limited(0));

        let other_resource = tracker.check_and_consume(&client("a"), &quote);
        assert!(other_resource.allowed);
    }

    #[test]
    fn unmetered_resource_always_allowed() {
        let (tracker, _clock) = tracker_with(1, Duration::from_secs(60));
        let health = ResourceKey::new("health");
        for _ in 0..5 {
            let decision = tracker.check_and_consume(&client("a"), &health);
            assert!(decision.allowed);
            assert_eq!(decision.remaining, Remaining::Unlimited);
            assert!(!decision.is_metered());
            assert_eq!(decision.reset_at_ms, 0);
        }
        assert_eq!(tracker.stats().tracked_clients, 0);
    }

    #[test]
    fn zero_budget_rejects_immediately() {
        let clock = Arc::new(ManualClock::new(T0));
        let policies = QuotaPolicies::new().with(
            ResourceKey::quote(),
            QuotaPolicy::new(0, Duration::from_secs(5), "closed"),
        );
        let tracker = QuotaTracker::new(policies, Arc::new(InMemoryQuotaStore::new()), clock);
        let decision = tracker.check_and_consume(&client("a"), &ResourceKey::quote());
        assert!(!decision.allowed);
        assert_eq!(decision.retry_after_secs, Some(5));
    }

    #[test]
    fn sweep_removes_only_expired_windows() {
        let clock = Arc::new(ManualClock::new(T0));
        let policies = QuotaPolicies::new()
            .with(ResourceKey::quote(), QuotaPolicy::new(5, Duration::from_secs(10), "q"))
            .with(
                ResourceKey::generate_text(),
                QuotaPolicy::new(5, Duration::from_secs(100), "g"),
            );
        let store = Arc::new(InMemoryQuotaStore::new());
        let tracker = QuotaTracker::new(policies, store.clone(), clock.clone());

        tracker.check_and_consume(&client("a"), &ResourceKey::quote());
        tracker.check_and_consume(&client("b"), &ResourceKey::quote());
        tracker.check_and_consume(&client("b"), &ResourceKey::generate_text());

        clock.advance(Duration::from_secs(10));
        assert_eq!(tracker.sweep_expired(), 2);

        // "a" had only the expired window; "b" keeps its live one.
        assert_eq!(store.client_count(), 1);
        let stats = tracker.stats();
        assert_eq!(stats.tracked_clients, 1);
        assert_eq!(stats.resources.len(), 1);
        assert_eq!(tracker.sweep_expired(), 0);
    }

    #[test]
    fn stats_aggregate_per_resource() {
        let (tracker, _clock) = tracker_with(10, Duration::from_secs(60));
        for _ in 0..3 {
            tracker.check_and_consume(&client("a"), &ResourceKey::generate_text());
        }
        tracker.check_and_consume(&client("b"), &ResourceKey::generate_text());
        tracker.check_and_consume(&client("b"), &ResourceKey::quote());

        let stats = tracker.stats();
        assert_eq!(stats.tracked_clients, 2);
        assert_eq!(
            stats.resources.get("generate-text"),
            Some(&ResourceStats {
                total_requests: 4,
                active_clients: 2
            })
        );
        assert_eq!(
            stats.resources.get("quote"),
            Some(&ResourceStats {
                total_requests: 1,
                active_clients: 1
            })
        );
    }

    #[test]
    fn reset_one_resource_or_all() {
        let (tracker, _clock) = tracker_with(1, Duration::from_secs(60));
        let text = ResourceKey::generate_text();
        let quote = ResourceKey::quote();
        tracker.check_and_consume(&client("a"), &text);
        tracker.check_and_consume(&client("a"), &quote);

        assert!(tracker.reset(&client("a"), Some(&text)));
        assert!(tracker.check_and_consume(&client("a"), &text).allowed);
        assert!(!tracker.check_and_consume(&client("a"), &quote).allowed);

        assert!(tracker.reset(&client("a"), None));
        assert!(!tracker.reset(&client("a"), None));
        assert!(!tracker.reset(&client("nobody"), Some(&quote)));
    }

    #[test]
    fn concurrent_checks_never_overadmit() {
        let (tracker, _clock) = tracker_with(50, Duration::from_secs(60));
        let tracker = Arc::new(tracker);
        let admitted = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let tracker = Arc::clone(&tracker);
                    scope.spawn(move || {
                        (0..20)
                            .filter(|_| {
                                tracker
                                    .check_and_consume(&client("a"), &ResourceKey::generate_text())
                                    .allowed
                            })
                            .count()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum::<usize>()
        });
        assert_eq!(admitted, 50);
    }

    #[test]
    fn ceil_secs_rounds_up() {
        assert_eq!(ceil_secs(1), 1);
        assert_eq!(ceil_secs(1_000), 1);
        assert_eq!(ceil_secs(1_001), 2);
        assert_eq!(ceil_secs(-5), 0);
    }
}
