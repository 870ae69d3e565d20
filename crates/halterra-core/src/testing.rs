//! Scripted fakes for the upstream ports.
//!
//! Available to this crate's tests and, through the `test-utils` feature, to
//! the adapter crates' test suites.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{StreamExt, stream};

use crate::domain::{Quote, Voice};
use crate::ports::{
    DeltaStream, GenerationRequest, InspirationSource, SpeechSynthesizer, TextGenerator,
    UpstreamError,
};

const SERVICE: &str = "text-generation";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

enum StreamScript {
    Deltas {
        items: Vec<Result<String, UpstreamError>>,
        hang: bool,
    },
    OpenError(UpstreamError),
    StalledOpen,
}

/// A [`TextGenerator`] that replays queued results in order.
///
/// Each `complete` call pops the next scripted completion, each `stream`
/// call the next scripted stream. An exhausted script answers with a
/// non-transient 500 so a test never waits on a missing entry.
#[derive(Default)]
pub struct ScriptedGenerator {
    completions: Mutex<VecDeque<Result<String, UpstreamError>>>,
    streams: Mutex<VecDeque<StreamScript>>,
    complete_calls: AtomicUsize,
    stream_calls: AtomicUsize,
    last_request: Mutex<Option<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_completion(self, result: Result<String, UpstreamError>) -> Self {
        lock(&self.completions).push_back(result);
        self
    }

    /// Queue a stream that yields `items` and then ends.
    #[must_use]
    pub fn with_stream(self, items: Vec<Result<String, UpstreamError>>) -> Self {
        lock(&self.streams).push_back(StreamScript::Deltas { items, hang: false });
        self
    }

    /// Queue a stream that yields `items` and then never produces again.
    #[must_use]
    pub fn with_hanging_stream(self, items: Vec<Result<String, UpstreamError>>) -> Self {
        lock(&self.streams).push_back(StreamScript::Deltas { items, hang: true });
        self
    }

    /// Queue a stream that fails before producing anything.
    #[must_use]
    pub fn with_stream_open_error(self, error: UpstreamError) -> Self {
        lock(&self.streams).push_back(StreamScript::OpenError(error));
        self
    }

    /// Queue a stream whose opening never completes.
    #[must_use]
    pub fn with_stalled_stream_open(self) -> Self {
        lock(&self.streams).push_back(StreamScript::StalledOpen);
        self
    }

    pub fn complete_calls(&self) -> usize {
        self.complete_calls.load(Ordering::SeqCst)
    }

    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<GenerationRequest> {
        lock(&self.last_request).clone()
    }

    fn exhausted() -> UpstreamError {
        UpstreamError::http(SERVICE, 500, "script exhausted")
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn complete(&self, request: &GenerationRequest) -> Result<String, UpstreamError> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last_request) = Some(request.clone());
        lock(&self.completions)
            .pop_front()
            .unwrap_or_else(|| Err(Self::exhausted()))
    }

    async fn stream(&self, request: &GenerationRequest) -> Result<DeltaStream, UpstreamError> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last_request) = Some(request.clone());
        let script = lock(&self.streams).pop_front();

        match script {
            Some(StreamScript::Deltas { items, hang: false }) => Ok(stream::iter(items).boxed()),
            Some(StreamScript::Deltas { items, hang: true }) => {
                Ok(stream::iter(items).chain(stream::pending()).boxed())
            }
            Some(StreamScript::OpenError(error)) => Err(error),
            Some(StreamScript::StalledOpen) => std::future::pending().await,
            None => Err(Self::exhausted()),
        }
    }
}

/// A [`SpeechSynthesizer`] with one fixed answer.
pub struct FakeSynthesizer {
    result: Result<Bytes, UpstreamError>,
    calls: AtomicUsize,
    last_voice: Mutex<Option<Voice>>,
}

impl FakeSynthesizer {
    pub fn returning(audio: impl Into<Bytes>) -> Self {
        Self::with_result(Ok(audio.into()))
    }

    pub fn failing() -> Self {
        Self::with_result(Err(UpstreamError::http(
            "speech-synthesis",
            401,
            "invalid api key",
        )))
    }

    fn with_result(result: Result<Bytes, UpstreamError>) -> Self {
        Self {
            result,
            calls: AtomicUsize::new(0),
            last_voice: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_voice(&self) -> Option<Voice> {
        *lock(&self.last_voice)
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSynthesizer {
    async fn synthesize(&self, _text: &str, voice: Voice) -> Result<Bytes, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last_voice) = Some(voice);
        self.result.clone()
    }
}

/// An [`InspirationSource`] that always returns the same quote, or always fails.
pub struct StaticInspiration {
    quote: Option<Quote>,
}

impl StaticInspiration {
    pub const fn new(quote: Quote) -> Self {
        Self { quote: Some(quote) }
    }

    pub const fn failing() -> Self {
        Self { quote: None }
    }
}

#[async_trait]
impl InspirationSource for StaticInspiration {
    async fn random_quote(&self) -> Result<Quote, UpstreamError> {
        self.quote
            .clone()
            .ok_or_else(|| UpstreamError::transport("inspiration", "connection refused"))
    }
}
