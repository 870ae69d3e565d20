//! Decoder for the Anthropic Messages streaming format.
//!
//! The wire format is Server-Sent Events; only `data:` lines matter:
//!
//! ```text
//! event: content_block_delta
//! data: {"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hi"}}
//!
//! event: message_stop
//! data: {"type":"message_stop"}
//! ```

use std::fmt::Display;

use bytes::{Bytes, BytesMut};
use futures_util::stream::BoxStream;
use futures_util::{Stream, StreamExt};
use halterra_core::{DeltaStream, UpstreamError};
use serde::Deserialize;
use tracing::debug;

use crate::http::from_stream_error;

const SERVICE: &str = "text-generation";

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamRecord {
    ContentBlockDelta { delta: Delta },
    MessageStop,
    Error,
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Delta {
    TextDelta {
        text: String,
    },
    #[serde(other)]
    Other,
}

enum Frame {
    Text(String),
    Stop,
    Failed(UpstreamError),
    Skip,
}

fn parse_line(line: &str) -> Frame {
    let Some(data) = line.strip_prefix("data:") else {
        return Frame::Skip;
    };
    let data = data.trim();

    match serde_json::from_str::<StreamRecord>(data) {
        Ok(StreamRecord::ContentBlockDelta {
            delta: Delta::TextDelta { text },
        }) if !text.is_empty() => Frame::Text(text),
        Ok(StreamRecord::MessageStop) => Frame::Stop,
        Ok(StreamRecord::Error) => Frame::Failed(from_stream_error(SERVICE, data)),
        Ok(_) => Frame::Skip,
        Err(e) => {
            debug!(error = %e, "Ignoring unrecognised stream record");
            Frame::Skip
        }
    }
}

struct DecoderState {
    stream: BoxStream<'static, Result<Bytes, String>>,
    buf: BytesMut,
}

impl DecoderState {
    fn next_line(&mut self) -> Option<String> {
        let end = self.buf.iter().position(|b| *b == b'\n')?;
        let line = self.buf.split_to(end + 1);
        Some(String::from_utf8_lossy(&line).trim().to_string())
    }

    fn take_rest(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let rest = self.buf.split();
        Some(String::from_utf8_lossy(&rest).trim().to_string())
    }
}

/// Decode a raw SSE byte stream into text deltas.
///
/// Ends cleanly on `message_stop`. An `error` record, a transport failure,
/// or the body ending before `message_stop` yields one `Err` and ends the
/// stream.
pub fn text_deltas<S, E>(byte_stream: S) -> DeltaStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display,
{
    let state = DecoderState {
        stream: byte_stream.map(|r| r.map_err(|e| e.to_string())).boxed(),
        buf: BytesMut::new(),
    };

    futures_util::stream::unfold(Some(state), |state| async move {
        let mut st = state?;

        loop {
            if let Some(line) = st.next_line() {
                match parse_line(&line) {
                    Frame::Text(text) => return Some((Ok(text), Some(st))),
                    Frame::Stop => return None,
                    Frame::Failed(err) => return Some((Err(err), None)),
                    Frame::Skip => continue,
                }
            }

            match st.stream.next().await {
                Some(Ok(chunk)) => st.buf.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    return Some((Err(UpstreamError::transport(SERVICE, e)), None));
                }
                None => {
                    // The final line may lack its newline.
                    if let Some(line) = st.take_rest() {
                        match parse_line(&line) {
                            Frame::Text(text) => return Some((Ok(text), Some(st))),
                            Frame::Stop => return None,
                            Frame::Failed(err) => return Some((Err(err), None)),
                            Frame::Skip => {}
                        }
                    }
                    return Some((
                        Err(UpstreamError::transport(
                            SERVICE,
                            "stream ended before message_stop",
                        )),
                        None,
                    ));
                }
            }
        }
    })
    .boxed()
}
