use std::fmt;

use serde::{Deserialize, Serialize};

/// Which guide persona a session is generated for.
///
/// Anything other than `"reflection"` selects the meditation guide, so an
/// unexpected value from an older client degrades to the default persona
/// instead of failing the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", rename_all = "lowercase")]
pub enum GuideType {
    #[default]
    Meditation,
    Reflection,
}

impl From<String> for GuideType {
    fn from(value: String) -> Self {
        if value.eq_ignore_ascii_case("reflection") {
            Self::Reflection
        } else {
            Self::Meditation
        }
    }
}

impl GuideType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Meditation => "meditation",
            Self::Reflection => "reflection",
        }
    }
}

/// Voice selector passed to the speech synthesizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Voice {
    /// Soft, slow voice used for guided meditations.
    Meditation,
    /// Conversational voice used for reflections.
    Reflection,
}

impl From<GuideType> for Voice {
    fn from(guide: GuideType) -> Self {
        match guide {
            GuideType::Meditation => Self::Meditation,
            GuideType::Reflection => Self::Reflection,
        }
    }
}

/// Mood the user reported before requesting a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mood {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Everything the prompt composer needs to describe one session.
#[derive(Debug, Clone, PartialEq)]
pub struct MeditationBrief {
    pub user_name: String,
    pub mood: Mood,
    pub category: String,
    pub intention: String,
    pub guide_type: GuideType,
    /// Target length in minutes.
    pub duration_minutes: u32,
    /// Opaque profile computed client-side; forwarded as context only.
    pub profile: Option<serde_json::Value>,
    /// Inspiration quote woven into the session.
    pub inspiration: Option<String>,
}

impl MeditationBrief {
    #[must_use]
    pub fn with_inspiration(mut self, inspiration: impl Into<String>) -> Self {
        self.inspiration = Some(inspiration.into());
        self
    }
}

/// A short attributed quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub quote: String,
    pub author: String,
}

impl Quote {
    pub fn new(quote: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            quote: quote.into(),
            author: author.into(),
        }
    }
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\" - {}", self.quote, self.author)
    }
}
