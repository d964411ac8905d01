//! HTML rendering for the upload page.

use emoface_core::mood::format_percent;
use emoface_core::{emoji_for, Outcome};

const INDEX_TEMPLATE: &str = include_str!("../templates/index.html");
const RESULT_SLOT: &str = "{{result}}";

/// Values the page template displays after an upload.
pub struct PageContext<'a> {
    pub mood: String,
    pub filename: &'a str,
    pub image_url: String,
    pub outcome: &'a Outcome,
}

/// Render the upload page, with a result section when `ctx` is present.
pub fn render_index(ctx: Option<&PageContext<'_>>) -> String {
    let section = ctx.map(render_result).unwrap_or_default();
    INDEX_TEMPLATE.replace(RESULT_SLOT, &section)
}

fn render_result(ctx: &PageContext<'_>) -> String {
    let mut html = String::from("<section class=\"result\">\n");
    html.push_str(&format!(
        "    <p class=\"mood\">{}</p>\n",
        escape_html(&ctx.mood)
    ));
    // Nothing was stored when the upload failed before reaching disk.
    if !ctx.image_url.is_empty() {
        html.push_str(&format!(
            "    <img class=\"preview\" src=\"{}\" alt=\"{}\">\n",
            escape_html(&ctx.image_url),
            escape_html(ctx.filename)
        ));
    }

    if let Outcome::Detected { result } = ctx.outcome {
        html.push_str("    <table>\n");
        for entry in result.ranked() {
            html.push_str(&format!(
                "      <tr><td>{} {}</td><td class=\"score\">{}</td></tr>\n",
                emoji_for(&entry.label),
                escape_html(&entry.label),
                format_percent(entry.score)
            ));
        }
        html.push_str("    </table>\n");
    }

    html.push_str("  </section>");
    html
}

/// Escape text for HTML element content and double-quoted attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
