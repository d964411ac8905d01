//! Mood shaping: emoji lookup and human-readable mood strings.

use crate::types::{Emotion, EmotionResult};
use std::fmt;

/// Emoji annotation for each emotion.
pub const EMOJI_TABLE: [(Emotion, &str); 7] = [
    (Emotion::Happy, "😊"),
    (Emotion::Sad, "😢"),
    (Emotion::Angry, "😠"),
    (Emotion::Fear, "😨"),
    (Emotion::Surprise, "😲"),
    (Emotion::Neutral, "😐"),
    (Emotion::Disgust, "🤢"),
];

/// Annotation for labels outside the vocabulary.
pub const FALLBACK_EMOJI: &str = "😐";

/// Emoji for a label; unrecognised labels get [`FALLBACK_EMOJI`].
pub fn emoji_for(label: &str) -> &'static str {
    Emotion::from_label(label)
        .and_then(|emotion| {
            EMOJI_TABLE
                .iter()
                .find(|(e, _)| *e == emotion)
                .map(|(_, glyph)| *glyph)
        })
        .unwrap_or(FALLBACK_EMOJI)
}

/// Upper-case the first character, lower-case the rest ("hAPPY" -> "Happy").
pub fn capitalize(label: &str) -> String {
    let mut chars = label.trim().chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Display form of a dominant emotion.
#[derive(Debug, Clone, PartialEq)]
pub struct Mood {
    pub emoji: &'static str,
    pub label: String,
    /// Percentage in [0, 100], when the source reported one.
    pub confidence: Option<f32>,
}

impl Mood {
    pub fn from_label(label: &str, confidence: Option<f32>) -> Self {
        Self {
            emoji: emoji_for(label),
            label: capitalize(label),
            confidence,
        }
    }

    pub fn from_result(result: &EmotionResult) -> Self {
        Self::from_label(result.dominant(), Some(result.dominant_score()))
    }

    /// "😊 Happy"
    pub fn headline(&self) -> String {
        format!("{} {}", self.emoji, self.label)
    }

    /// "😊 Happy (92.3%)", or just the headline without a confidence.
    pub fn with_confidence(&self) -> String {
        match self.confidence {
            Some(pct) => format!("{} ({})", self.headline(), format_percent(pct)),
            None => self.headline(),
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.emoji, self.label)
    }
}

/// One decimal place with a percent sign: 92.34 -> "92.3%".
pub fn format_percent(pct: f32) -> String {
    format!("{:.1}%", (pct * 10.0).round() / 10.0)
}
