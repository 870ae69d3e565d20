use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::domain::{ClientIdentity, ResourceKey};

/// Mutable counter for one `(client, resource)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaWindow {
    pub count: u32,
    /// Epoch milliseconds at which the window expires.
    pub reset_at_ms: i64,
}

impl QuotaWindow {
    /// A new, empty window starting at `now_ms`.
    pub const fn fresh(now_ms: i64, window_ms: i64) -> Self {
        Self {
            count: 0,
            reset_at_ms: now_ms.saturating_add(window_ms),
        }
    }

    pub const fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.reset_at_ms
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuotaKey {
    pub client: ClientIdentity,
    pub resource: ResourceKey,
}

impl QuotaKey {
    pub const fn new(client: ClientIdentity, resource: ResourceKey) -> Self {
        Self { client, resource }
    }
}

/// Storage port for quota windows.
///
/// Implementations only need per-call consistency; the tracker serialises
/// its read-modify-write sequences itself.
pub trait QuotaStore: Send + Sync {
    fn get(&self, key: &QuotaKey) -> Option<QuotaWindow>;

    fn put(&self, key: &QuotaKey, window: QuotaWindow);

    /// Remove a window. Returns whether it existed.
    fn delete(&self, key: &QuotaKey) -> bool;

    /// Snapshot of every stored window.
    fn entries(&self) -> Vec<(QuotaKey, QuotaWindow)>;
}

/// Process-local store: one bucket per client holding that client's windows.
///
/// A bucket disappears with its last window, so the map stays bounded by the
/// number of clients with at least one live window.
#[derive(Debug, Default)]
pub struct InMemoryQuotaStore {
    clients: Mutex<HashMap<ClientIdentity, HashMap<ResourceKey, QuotaWindow>>>,
}

impl InMemoryQuotaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of clients with at least one stored window.
    pub fn client_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ClientIdentity, HashMap<ResourceKey, QuotaWindow>>> {
        // Window data stays consistent even if a holder panicked.
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl QuotaStore for InMemoryQuotaStore {
    fn get(&self, key: &QuotaKey) -> Option<QuotaWindow> {
        self.lock()
            .get(&key.client)
            .and_then(|windows| windows.get(&key.resource))
            .copied()
    }

    fn put(&self, key: &QuotaKey, window: QuotaWindow) {
        self.lock()
            .entry(key.client.clone())
            .or_default()
            .insert(key.resource.clone(), window);
    }

    fn delete(&self, key: &QuotaKey) -> bool {
        let mut clients = self.lock();
        let Some(windows) = clients.get_mut(&key.client) else {
            return false;
        };
        let removed = windows.remove(&key.resource).is_some();
        if windows.is_empty() {
            clients.remove(&key.client);
        }
        removed
    }

    fn entries(&self) -> Vec<(QuotaKey, QuotaWindow)> {
        self.lock()
            .iter()
            .flat_map(|(client, windows)| {
                windows.iter().map(|(resource, window)| {
                    (QuotaKey::new(client.clone(), resource.clone()), *window)
                })
            })
            .collect()
    }
}
