use std::collections::HashMap;
use std::time::Duration;

use crate::clock::duration_to_ms;
use crate::domain::ResourceKey;

const HOUR: Duration = Duration::from_secs(60 * 60);

/// Static admission policy for one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaPolicy {
    pub max_requests: u32,
    pub window: Duration,
    /// Shown to the client when the quota is exhausted.
    pub message: String,
}

impl QuotaPolicy {
    pub fn new(max_requests: u32, window: Duration, message: impl Into<String>) -> Self {
        Self {
            max_requests,
            window,
            message: message.into(),
        }
    }

    pub(crate) fn window_ms(&self) -> i64 {
        duration_to_ms(self.window)
    }
}

/// Policy table keyed by resource. Resources without an entry are unmetered.
#[derive(Debug, Clone, Default)]
pub struct QuotaPolicies {
    policies: HashMap<ResourceKey, QuotaPolicy>,
}

impl QuotaPolicies {
    /// An empty table: every resource unmetered.
    pub fn new() -> Self {
        Self::default()
    }

    /// The production policies, sized to upstream cost.
    ///
    /// Text generation is the most expensive (generation plus the audio that
    /// usually follows), audio is billed per character, quotes are free but
    /// still bounded.
    pub fn builtin() -> Self {
        Self::new()
            .with(
                ResourceKey::generate_text(),
                QuotaPolicy::new(
                    10,
                    HOUR,
                    "Meditation limit reached. Please wait before generating a new meditation.",
                ),
            )
            .with(
                ResourceKey::synthesize_audio(),
                QuotaPolicy::new(
                    15,
                    HOUR,
                    "Audio generation limit reached. Please try again in a few minutes.",
                ),
            )
            .with(
                ResourceKey::quote(),
                QuotaPolicy::new(60, HOUR, "Too many requests. Please wait a moment."),
            )
    }

    #[must_use]
    pub fn with(mut self, resource: ResourceKey, policy: QuotaPolicy) -> Self {
        self.insert(resource, policy);
        self
    }

    pub fn insert(&mut self, resource: ResourceKey, policy: QuotaPolicy) {
        self.policies.insert(resource, policy);
    }

    /// Remove a policy, making the resource unmetered.
    pub fn remove(&mut self, resource: &ResourceKey) -> Option<QuotaPolicy> {
        self.policies.remove(resource)
    }

    pub fn get(&self, resource: &ResourceKey) -> Option<&QuotaPolicy> {
        self.policies.get(resource)
    }

    pub fn get_mut(&mut self, resource: &ResourceKey) -> Option<&mut QuotaPolicy> {
        self.policies.get_mut(resource)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ResourceKey, &QuotaPolicy)> {
        self.policies.iter()
    }
}
