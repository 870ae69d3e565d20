use std::time::Duration;

use futures_util::{Stream, StreamExt};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{error, info};

use super::reassemble;
use crate::ports::{DeltaStream, UpstreamError};

/// Message shown to the client when a session breaks.
const STREAM_FAILED: &str = "Streaming failed";

/// One event of a streaming session, as sent to the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    Chunk {
        content: String,
    },
    Complete {
        #[serde(rename = "displayText")]
        display_text: String,
        #[serde(rename = "audioText")]
        audio_text: String,
        #[serde(flatten)]
        metadata: Map<String, Value>,
    },
    Error {
        message: String,
    },
}

impl StreamEvent {
    /// The generic terminal error event. Causes stay in the logs.
    pub fn failed() -> Self {
        Self::Error {
            message: STREAM_FAILED.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Longest allowed gap between upstream deltas. `None` waits forever.
    pub idle_timeout: Option<Duration>,
    /// Extra fields merged into the `complete` event.
    pub metadata: Map<String, Value>,
}

struct SessionState {
    upstream: DeltaStream,
    buffer: String,
    options: SessionOptions,
    done: bool,
}

impl SessionState {
    async fn next_delta(&mut self) -> Option<Result<String, UpstreamError>> {
        match self.options.idle_timeout {
            Some(limit) => tokio::time::timeout(limit, self.upstream.next())
                .await
                .unwrap_or_else(|_| Some(Err(UpstreamError::timeout("text-generation", limit)))),
            None => self.upstream.next().await,
        }
    }
}

/// Turn upstream deltas into client events.
///
/// Every delta is forwarded as a `chunk` the moment it arrives. A clean end
/// of the upstream yields exactly one `complete` event with the reassembled
/// artifacts; a failure or an idle timeout yields exactly one generic
/// `error` event. Nothing follows either terminal event.
///
/// Dropping the returned stream drops the upstream with it.
pub fn reassemble_stream(
    upstream: DeltaStream,
    options: SessionOptions,
) -> impl Stream<Item = StreamEvent> + Send + 'static {
    let state = SessionState {
        upstream,
        buffer: String::new(),
        options,
        done: false,
    };

    futures_util::stream::unfold(state, |mut st| async move {
        if st.done {
            return None;
        }

        match st.next_delta().await {
            Some(Ok(delta)) => {
                st.buffer.push_str(&delta);
                Some((StreamEvent::Chunk { content: delta }, st))
            }
            Some(Err(e)) => {
                error!(error = %e, received = st.buffer.len(), "Generation stream failed");
                st.done = true;
                Some((StreamEvent::failed(), st))
            }
            None => {
                st.done = true;
                let artifacts = reassemble(&st.buffer);
                info!(
                    display_len = artifacts.display.len(),
                    narration_len = artifacts.narration.len(),
                    "Generation stream complete"
                );
                let event = StreamEvent::Complete {
                    display_text: artifacts.display,
                    audio_text: artifacts.narration,
                    metadata: std::mem::take(&mut st.options.metadata),
                };
                Some((event, st))
            }
        }
    })
}
