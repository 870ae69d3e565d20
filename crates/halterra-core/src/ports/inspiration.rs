use async_trait::async_trait;
use chrono::Datelike;
use tracing::warn;

use super::UpstreamError;
use crate::domain::Quote;

/// Source of short inspirational quotes.
#[async_trait]
pub trait InspirationSource: Send + Sync {
    async fn random_quote(&self) -> Result<Quote, UpstreamError>;
}

const FALLBACK_QUOTES: &[(&str, &str)] = &[
    ("The present moment is all we ever really have", "Thich Nhat Hanh"),
    ("Peace comes from within. Do not seek it without", "Buddha"),
    ("Awareness is the silent witness of all experience", "Ramana Maharshi"),
    ("You can't stop the waves, but you can learn to surf", "Jon Kabat-Zinn"),
    (
        "Between stimulus and response there is a space. In that space is our power to choose",
        "Viktor Frankl",
    ),
    ("Stillness is where creativity and solutions are found", "Eckhart Tolle"),
    ("Calm is not the absence of noise, but the presence of peace", "Anonymous"),
    ("Every breath is a chance to begin again", "Anonymous"),
    ("The journey of a thousand miles begins with a single step", "Lao Tzu"),
    ("Simplicity is the ultimate sophistication", "Leonardo da Vinci"),
];

/// Deterministic fallback quote for a given day of the year.
pub fn fallback_quote(day_of_year: u32) -> Quote {
    let index = day_of_year as usize % FALLBACK_QUOTES.len();
    let (quote, author) = FALLBACK_QUOTES[index];
    Quote::new(quote, author)
}

/// Fetch a quote, substituting the fallback of the day on any failure.
///
/// Inspiration is decoration: a failing quote service must never fail the
/// request that asked for it.
pub async fn quote_or_fallback(source: &dyn InspirationSource) -> Quote {
    match source.random_quote().await {
        Ok(quote) => quote,
        Err(e) => {
            warn!(error = %e, "Inspiration source failed, using fallback quote");
            fallback_quote(chrono::Utc::now().ordinal0())
        }
    }
}
