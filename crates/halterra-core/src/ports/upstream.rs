use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Broad failure category of an upstream call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamErrorKind {
    /// The service answered with a non-success status.
    Http,
    /// The connection failed or dropped.
    Transport,
    /// The call exceeded its time bound.
    Timeout,
    /// The service answered but the payload was not understood.
    Decode,
    /// The adapter is not configured to reach the service (e.g. no API key).
    Configuration,
}

impl fmt::Display for UpstreamErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Http => "http error",
            Self::Transport => "transport error",
            Self::Timeout => "timeout",
            Self::Decode => "decode error",
            Self::Configuration => "configuration error",
        };
        f.write_str(label)
    }
}

/// A failed call to an upstream collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{service} {kind}{}: {message}", status_suffix(.status))]
pub struct UpstreamError {
    /// Short name of the service, for logs.
    pub service: &'static str,
    pub kind: UpstreamErrorKind,
    /// HTTP status, when the service answered.
    pub status: Option<u16>,
    /// Service-specific error type from the response body, if any.
    pub error_type: Option<String>,
    pub message: String,
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

impl UpstreamError {
    pub fn http(service: &'static str, status: u16, message: impl Into<String>) -> Self {
        Self {
            service,
            kind: UpstreamErrorKind::Http,
            status: Some(status),
            error_type: None,
            message: message.into(),
        }
    }

    pub fn transport(service: &'static str, message: impl Into<String>) -> Self {
        Self::without_status(service, UpstreamErrorKind::Transport, message)
    }

    pub fn timeout(service: &'static str, after: Duration) -> Self {
        Self::without_status(
            service,
            UpstreamErrorKind::Timeout,
            format!("no response within {}ms", after.as_millis()),
        )
    }

    pub fn decode(service: &'static str, message: impl Into<String>) -> Self {
        Self::without_status(service, UpstreamErrorKind::Decode, message)
    }

    pub fn configuration(service: &'static str, message: impl Into<String>) -> Self {
        Self::without_status(service, UpstreamErrorKind::Configuration, message)
    }

    fn without_status(
        service: &'static str,
        kind: UpstreamErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            service,
            kind,
            status: None,
            error_type: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn with_error_type(mut self, error_type: impl Into<String>) -> Self {
        self.error_type = Some(error_type.into());
        self
    }

    /// Whether a retry has a reasonable chance of succeeding.
    ///
    /// Overload (529 or an `overloaded_error` body), rate limiting (429),
    /// 500, 502 and 503 are transient, as are dropped connections and
    /// timeouts. Everything else is fatal.
    pub fn is_transient(&self) -> bool {
        match self.kind {
            UpstreamErrorKind::Transport | UpstreamErrorKind::Timeout => true,
            UpstreamErrorKind::Http => {
                matches!(self.status, Some(429 | 500 | 502 | 503 | 529))
                    || self.error_type.as_deref() == Some("overloaded_error")
            }
            UpstreamErrorKind::Decode | UpstreamErrorKind::Configuration => false,
        }
    }
}
