//! Boundary to the prompt-authoring collaborator.
//!
//! Copy tables, persona voice and astrology-aware tone live outside this
//! crate. What the pipeline does own is the output contract: the streaming
//! path needs line-delimited artifact records, the plain path one combined
//! record. [`DefaultPromptComposer`] states that contract and little else.

use std::fmt::Write as _;

use super::GenerationRequest;
use crate::domain::{GuideType, MeditationBrief};

/// Shape the generator is asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputContract {
    /// One JSON record per line: `{"key":"display"|"narration","content":...}`.
    LineDelimited,
    /// A single JSON object: `{"displayText":...,"audioText":...}`.
    CombinedRecord,
}

pub trait PromptComposer: Send + Sync {
    fn compose(&self, brief: &MeditationBrief, contract: OutputContract) -> GenerationRequest;
}

/// Minimal composer: persona header, session facts and the output contract.
#[derive(Debug, Clone)]
pub struct DefaultPromptComposer {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for DefaultPromptComposer {
    fn default() -> Self {
        Self {
            max_tokens: 4000,
            temperature: 0.85,
        }
    }
}

impl DefaultPromptComposer {
    fn persona(guide: GuideType) -> &'static str {
        match guide {
            GuideType::Meditation => {
                "You are a warm meditation guide. You write guided meditations that are calm, \
                 embodied and personal."
            }
            GuideType::Reflection => {
                "You are a thoughtful reflection guide. You write reflective pieces built \
                 around open questions rather than instructions."
            }
        }
    }

    fn contract_instructions(contract: OutputContract) -> &'static str {
        match contract {
            OutputContract::LineDelimited => {
                "Produce two texts. display: written prose for reading on screen, with \
                 paragraphs. narration: the same session written to be spoken aloud, with \
                 natural pauses (\"...\").\n\
                 Answer with exactly two lines of JSON, no code fences:\n\
                 {\"key\":\"display\",\"content\":\"...\"}\n\
                 {\"key\":\"narration\",\"content\":\"...\"}"
            }
            OutputContract::CombinedRecord => {
                "Produce two texts. displayText: written prose for reading on screen, with \
                 paragraphs. audioText: the same session written to be spoken aloud, with \
                 natural pauses (\"...\").\n\
                 Answer with one JSON object, no code fences:\n\
                 {\"displayText\":\"...\",\"audioText\":\"...\"}"
            }
        }
    }
}

impl PromptComposer for DefaultPromptComposer {
    fn compose(&self, brief: &MeditationBrief, contract: OutputContract) -> GenerationRequest {
        let system = format!(
            "{}\n\n{}",
            Self::persona(brief.guide_type),
            Self::contract_instructions(contract)
        );

        let mut prompt = format!(
            "Write a {}-minute {} for {}.\nMood: {}",
            brief.duration_minutes,
            brief.guide_type.as_str(),
            brief.user_name,
            brief.mood.name
        );
        if let Some(description) = &brief.mood.description {
            let _ = write!(prompt, " ({description})");
        }
        let _ = write!(
            prompt,
            "\nCategory: {}\nIntention: {}",
            brief.category, brief.intention
        );
        if let Some(inspiration) = &brief.inspiration {
            let _ = write!(prompt, "\nLet this thought quietly inspire the session: {inspiration}");
        }
        if let Some(profile) = &brief.profile {
            let _ = write!(prompt, "\nPersonal profile (context only): {profile}");
        }

        GenerationRequest {
            system,
            prompt,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}
