//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces that the request pipeline expects from the
//! upstream collaborators. They contain no HTTP client details and use only
//! domain types.
//!
//! # Design Rules
//!
//! - No `reqwest` or `axum` types in any signature
//! - Every upstream failure is reported as an [`UpstreamError`] so retry
//!   classification lives in one place
//! - Prompt authoring is a collaborator too; the pipeline only relies on the
//!   output contract it asks for

mod inspiration;
mod prompt;
mod speech;
mod text_generator;
mod upstream;

use thiserror::Error;

pub use inspiration::{InspirationSource, fallback_quote, quote_or_fallback};
pub use prompt::{DefaultPromptComposer, OutputContract, PromptComposer};
pub use speech::SpeechSynthesizer;
pub use text_generator::{DeltaStream, GenerationRequest, TextGenerator};
pub use upstream::{UpstreamError, UpstreamErrorKind};

/// Errors surfaced by the pipeline to its hosting adapter.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Missing or malformed request input. Safe to show to the caller.
    #[error("{0}")]
    Validation(String),

    /// An upstream collaborator failed and nothing recovered it.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// Internal error (unexpected condition).
    #[error("Internal error: {0}")]
    Internal(String),
}
