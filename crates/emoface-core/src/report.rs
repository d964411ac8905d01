//! Console rendering of an emotion result with a textual bar chart.

use crate::mood::{emoji_for, format_percent};
use crate::types::EmotionResult;

pub const BAR_GLYPH: char = '█';
/// Percentage points represented by one bar glyph.
pub const PERCENT_PER_GLYPH: f32 = 5.0;

/// Bar of [`BAR_GLYPH`]s, one per full [`PERCENT_PER_GLYPH`] points.
pub fn bar(score: f32) -> String {
    let glyphs = (score / PERCENT_PER_GLYPH).floor();
    if glyphs.is_finite() && glyphs > 0.0 {
        std::iter::repeat(BAR_GLYPH).take(glyphs as usize).collect()
    } else {
        String::new()
    }
}

/// Multi-line console block. The first line names the dominant emotion,
/// followed by its confidence and every score ranked high to low.
pub fn console_report(result: &EmotionResult) -> String {
    let dominant = result.dominant();
    let mut out = format!(
        "🎯 Dominant Emotion: {} {}\n",
        dominant.to_uppercase(),
        emoji_for(dominant)
    );
    out.push_str(&format!(
        "📊 Confidence: {}\n",
        format_percent(result.dominant_score())
    ));
    out.push_str("\nAll emotions:\n");

    for entry in result.ranked() {
        out.push_str(&format!(
            "  {} {:<9} {:>6} {}\n",
            emoji_for(&entry.label),
            entry.label,
            format_percent(entry.score),
            bar(entry.score)
        ));
    }

    out
}
