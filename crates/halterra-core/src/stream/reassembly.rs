use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

/// The two texts produced by one generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifacts {
    /// Prose for reading on screen.
    pub display: String,
    /// Script for speech synthesis.
    pub narration: String,
}

impl Artifacts {
    fn mirrored(text: &str) -> Self {
        Self {
            display: text.to_string(),
            narration: text.to_string(),
        }
    }
}

/// A pure parse attempt over the complete buffer.
pub type ParseStrategy = fn(&str) -> Option<Artifacts>;

#[derive(Debug, Deserialize)]
struct LineRecord {
    key: String,
    content: String,
}

/// Remove a leading `` ```json `` / `` ``` `` and a trailing `` ``` ``.
fn strip_fences(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    text.strip_suffix("```").unwrap_or(text).trim()
}

/// One `{"key":..,"content":..}` record per line. Later records win.
pub fn line_records(buffer: &str) -> Option<Artifacts> {
    let mut display = None;
    let mut narration = None;

    for line in buffer.lines() {
        let line = strip_fences(line);
        if line.is_empty() {
            continue;
        }

        let record = match serde_json::from_str::<LineRecord>(line) {
            Ok(record) => record,
            Err(e) => {
                debug!(error = %e, "Skipping unparseable stream line");
                continue;
            }
        };

        match record.key.as_str() {
            "display" | "displayText" => display = Some(record.content),
            "narration" | "audioText" => narration = Some(record.content),
            other => debug!(key = other, "Skipping stream line with unknown key"),
        }
    }

    match (display, narration) {
        (Some(display), Some(narration)) => Some(Artifacts { display, narration }),
        (Some(only), None) | (None, Some(only)) => Some(Artifacts::mirrored(&only)),
        (None, None) => None,
    }
}

/// One JSON object for the whole buffer.
pub fn whole_record(buffer: &str) -> Option<Artifacts> {
    let Value::Object(record) = serde_json::from_str::<Value>(strip_fences(buffer)).ok()? else {
        return None;
    };

    let pick = |primary: &str, alias: &str| {
        [primary, alias]
            .iter()
            .find_map(|key| record.get(*key).and_then(Value::as_str))
            .filter(|text| !text.is_empty())
            .map_or_else(|| buffer.to_string(), str::to_string)
    };

    Some(Artifacts {
        display: pick("displayText", "display"),
        narration: pick("audioText", "narration"),
    })
}

/// Both artifacts are the buffer verbatim.
#[allow(clippy::unnecessary_wraps)]
pub fn raw(buffer: &str) -> Option<Artifacts> {
    Some(Artifacts::mirrored(buffer))
}

fn first_match(buffer: &str, strategies: &[ParseStrategy]) -> Artifacts {
    let last = strategies.len().saturating_sub(1);
    for (index, strategy) in strategies.iter().enumerate() {
        if let Some(artifacts) = strategy(buffer) {
            if index == last && index > 0 {
                warn!(len = buffer.len(), "Generation not in expected format, using raw text");
            }
            return artifacts;
        }
    }
    Artifacts::mirrored(buffer)
}

/// Parse a streamed buffer: line records, then a whole record, then raw.
pub fn reassemble(buffer: &str) -> Artifacts {
    first_match(buffer, &[line_records, whole_record, raw])
}

/// Parse a one-shot completion: a whole record, then raw.
pub fn reassemble_combined(buffer: &str) -> Artifacts {
    first_match(buffer, &[whole_record, raw])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifacts(display: &str, narration: &str) -> Artifacts {
        Artifacts {
            display: display.into(),
            narration: narration.into(),
        }
    }

    #[test]
    fn two_line_records() {
        let buffer = "{\"key\":\"display\",\"content\":\"D\"}\n{\"key\":\"narration\",\"content\":\"N\"}";
        assert_eq!(reassemble(buffer), artifacts("D", "N"));
    }

    #[test]
    fn fenced_records_with_blank_lines() {
        let buffer = "```json\n\n{\"key\":\"display\",\"content\":\"D\"}\n\n{\"key\":\"narration\",\"content\":\"N\"}\n```";
        assert_eq!(reassemble(buffer), artifacts("D", "N"));
    }

    #[test]
    fn fence_on_same_line_as_record() {
        let buffer = "```json{\"key\":\"display\",\"content\":\"D\"}\n{\"key\":\"narration\",\"content\":\"N\"}```";
        assert_eq!(line_records(buffer), Some(artifacts("D", "N")));
    }

    #[test]
    fn aliases_and_garbage_lines() {
        let buffer = "Here you go:\n{\"key\":\"displayText\",\"content\":\"D\"}\nnot json\n{\"key\":\"audioText\",\"content\":\"N\"}";
        assert_eq!(reassemble(buffer), artifacts("D", "N"));
    }

    #[test]
    fn single_artifact_is_mirrored() {
        let buffer = "{\"key\":\"narration\",\"content\":\"only\"}";
        assert_eq!(reassemble(buffer), artifacts("only", "only"));
    }

    #[test]
    fn later_record_overrides() {
        let buffer = "{\"key\":\"display\",\"content\":\"first\"}\n{\"key\":\"display\",\"content\":\"second\"}\n{\"key\":\"narration\",\"content\":\"N\"}";
        assert_eq!(reassemble(buffer), artifacts("second", "N"));
    }

    #[test]
    fn whole_object_when_no_line_records() {
        let buffer = "```json\n{\"displayText\":\"D\",\n\"audioText\":\"N\"}\n```";
        assert_eq!(reassemble(buffer), artifacts("D", "N"));
    }

    #[test]
    fn whole_object_missing_key_defaults_to_raw() {
        let buffer = "{\"displayText\":\"D\",\"audioText\":\"\"}";
        assert_eq!(whole_record(buffer), Some(artifacts("D", buffer)));
    }

    #[test]
    fn whole_record_rejects_non_objects() {
        assert_eq!(whole_record("[1,2]"), None);
        assert_eq!(whole_record("plain words"), None);
    }

    #[test]
    fn plain_text_falls_back_to_raw() {
        let buffer = "Close your eyes.\nBreathe in.";
        assert_eq!(reassemble(buffer), artifacts(buffer, buffer));
    }

    #[test]
    fn empty_buffer_yields_empty_artifacts() {
        assert_eq!(reassemble(""), artifacts("", ""));
    }

    #[test]
    fn combined_path_ignores_line_records() {
        let buffer = "{\"displayText\":\"D\",\"audioText\":\"N\"}";
        assert_eq!(reassemble_combined(buffer), artifacts("D", "N"));

        let lines = "{\"key\":\"display\",\"content\":\"D\"}\n{\"key\":\"narration\",\"content\":\"N\"}";
        assert_eq!(reassemble_combined(lines), artifacts(lines, lines));
    }
}
