//! Prompt construction and content truncation.

use super::schema::{EventTag, MetricKey};

/// Default number of characters of source text sent to the model.
pub const DEFAULT_MAX_CONTENT_CHARS: usize = 10_000;

/// Returns the first `max_chars` characters of `text`.
///
/// Only the tail is dropped and the cut always lands on a character
/// boundary.
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Builds the fixed extraction prompt around already-truncated content.
#[must_use]
pub fn build_prompt(content: &str) -> String {
    let vocabulary = EventTag::ALL
        .iter()
        .map(|tag| tag.label())
        .collect::<Vec<_>>()
        .join(", ");
    let metrics = MetricKey::ALL
        .iter()
        .map(|key| format!("- {}: percent change as a number, or null if not stated", key.key()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are reading text from a company's earnings call or results document.\n\
         Return ONLY a JSON object with exactly these keys:\n\
         {metrics}\n\
         - events: array of the corporate events mentioned, using only these names: {vocabulary}\n\
         - prospects: management's outlook, one of \"Challenging\", \"Good\" or \"Favorable\"\n\
         QoQ compares with the previous quarter and YoY with the same quarter last year.\n\
         Do not invent figures; use null when the text does not give one.\n\n\
         Text:\n{content}"
    )
}
