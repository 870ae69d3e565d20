//! Per-client, per-resource request quotas.
//!
//! Each `(client, resource)` pair owns one fixed window counter. Windows are
//! created on first use, reset lazily once their reset instant has passed,
//! and evicted by a periodic sweep that is housekeeping only: an expired
//! window is already treated as fresh whether or not it was swept.
//!
//! Storage goes through [`QuotaStore`] so the tracker's algorithm does not
//! depend on where windows live.

mod policy;
mod store;
mod sweeper;
mod tracker;

pub use policy::{QuotaPolicies, QuotaPolicy};
pub use store::{InMemoryQuotaStore, QuotaKey, QuotaStore, QuotaWindow};
pub use sweeper::spawn_sweeper;
pub use tracker::{QuotaDecision, QuotaStats, QuotaTracker, Remaining, ResourceStats};
