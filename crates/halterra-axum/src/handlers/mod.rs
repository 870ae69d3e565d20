//! HTTP request handlers for the Axum web server.
//!
//! Each submodule owns one `/api` endpoint. Origin and quota checks have
//! already run by the time a handler is called.

pub mod audio;
pub mod meditation;
pub mod quote;

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::error::HttpError;

/// Decode a JSON request body.
///
/// Bodies are decoded by hand instead of through `Json<T>` so a missing
/// content type or a malformed body still answers with the JSON 400 shape.
/// An empty body reads as `{}`, leaving field validation to the handler.
pub(crate) fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, HttpError> {
    let bytes: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
        b"{}"
    } else {
        body
    };
    serde_json::from_slice(bytes)
        .map_err(|e| HttpError::Validation(format!("Invalid request body: {e}")))
}

/// `Some(s)` when `s` has non-whitespace content.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Probe {
        text: Option<String>,
    }

    #[test]
    fn empty_body_reads_as_empty_object() {
        let probe: Probe = parse_body(&Bytes::from_static(b"  ")).unwrap();
        assert!(probe.text.is_none());
    }

    #[test]
    fn malformed_body_is_a_validation_error() {
        let err = parse_body::<Probe>(&Bytes::from_static(b"{not json")).unwrap_err();
        assert!(matches!(err, HttpError::Validation(msg) if msg.starts_with("Invalid request body")));
    }

    #[test]
    fn blank_strings_are_missing() {
        assert_eq!(non_blank(Some("  ".into())), None);
        assert_eq!(non_blank(Some("Alex".into())), Some("Alex".into()));
    }
}
