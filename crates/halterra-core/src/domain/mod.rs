//! Core domain types.
//!
//! These types represent the pure domain model, independent of any
//! transport concerns (HTTP headers, SSE framing, upstream wire formats).
//!
//! # Structure
//!
//! - `identity` - who is asking (`ClientIdentity`) and for what (`ResourceKey`)
//! - `session` - what a generation session is about (`MeditationBrief`, `GuideType`, `Voice`, `Quote`)

mod identity;
mod session;

pub use identity::{ClientIdentity, ResourceKey};
pub use session::{GuideType, MeditationBrief, Mood, Quote, Voice};
