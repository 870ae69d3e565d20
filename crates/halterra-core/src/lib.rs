#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

pub mod clock;
pub mod domain;
pub mod ports;
pub mod quota;
pub mod retry;
pub mod stream;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export commonly used types for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use domain::{ClientIdentity, GuideType, MeditationBrief, Mood, Quote, ResourceKey, Voice};
pub use ports::{
    CoreError, DefaultPromptComposer, DeltaStream, GenerationRequest, InspirationSource,
    OutputContract, PromptComposer, SpeechSynthesizer, TextGenerator, UpstreamError,
    UpstreamErrorKind, quote_or_fallback,
};
pub use quota::{
    InMemoryQuotaStore, QuotaDecision, QuotaKey, QuotaPolicies, QuotaPolicy, QuotaStats,
    QuotaStore, QuotaTracker, QuotaWindow, Remaining, ResourceStats, spawn_sweeper,
};
pub use retry::{RetryPolicy, call_with_retry, sleep_cancellable};
pub use stream::{
    Artifacts, SessionOptions, StreamEvent, reassemble, reassemble_combined, reassemble_stream,
};

#[cfg(test)]
use tokio_test as _;
