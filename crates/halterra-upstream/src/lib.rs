#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

mod anthropic;
mod elevenlabs;
mod http;
mod sse;
mod zenquotes;

pub use anthropic::{AnthropicClient, AnthropicConfig};
pub use elevenlabs::{ElevenLabsClient, ElevenLabsConfig};
pub use sse::text_deltas;
pub use zenquotes::{ZenQuotesClient, ZenQuotesConfig};

#[cfg(test)]
use tokio_test as _;
