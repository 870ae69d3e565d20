use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Network identity of a caller, used only to keep quotas fair.
///
/// Not authenticated: it is whatever the nearest proxy claims, falling back
/// to the socket peer and finally to [`ClientIdentity::UNKNOWN`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    /// Sentinel used when no address information is available.
    pub const UNKNOWN: &'static str = "unknown";

    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn unknown() -> Self {
        Self(Self::UNKNOWN.to_string())
    }

    /// Resolve the identity from the first source that yields a value.
    ///
    /// Precedence: first entry of `X-Forwarded-For`, then `X-Real-IP`, then
    /// the peer address of the connection.
    pub fn resolve(
        forwarded_for: Option<&str>,
        real_ip: Option<&str>,
        peer: Option<IpAddr>,
    ) -> Self {
        let forwarded = forwarded_for
            .and_then(|list| list.split(',').next())
            .map(str::trim)
            .filter(|s| !s.is_empty());

        if let Some(addr) = forwarded {
            return Self::new(addr);
        }

        if let Some(addr) = real_ip.map(str::trim).filter(|s| !s.is_empty()) {
            return Self::new(addr);
        }

        peer.map_or_else(Self::unknown, |ip| Self::new(ip.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The logical resource a quota applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceKey(String);

impl ResourceKey {
    pub const GENERATE_TEXT: &'static str = "generate-text";
    pub const SYNTHESIZE_AUDIO: &'static str = "synthesize-audio";
    pub const QUOTE: &'static str = "quote";

    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn generate_text() -> Self {
        Self::new(Self::GENERATE_TEXT)
    }

    pub fn synthesize_audio() -> Self {
        Self::new(Self::SYNTHESIZE_AUDIO)
    }

    pub fn quote() -> Self {
        Self::new(Self::QUOTE)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
