//! Reply extraction from raw accessibility dumps.
//!
//! Best-effort text heuristics, not a structured parse: the accessibility
//! tree flattens the conversation, the chrome, and the disclaimers into one
//! stream of static-text values, and this module makes a plausible guess at
//! where the reply starts and where the chrome begins.

use crate::config::Markers;

/// Isolate the application's reply from `raw`, given the prompt that was
/// submitted.
///
/// The candidate region is everything after the first verbatim occurrence
/// of `prompt`, truncated at the earliest known chrome marker. When the
/// prompt cannot be found (the app may have autoformatted it), falls back
/// to the chrome-stripped full text if it clears `min_reply_len` and is not
/// just an empty-state placeholder. Returns `None` when no reply is
/// detectable yet.
pub fn extract_reply(
    raw: &str,
    prompt: &str,
    markers: &Markers,
    min_reply_len: usize,
) -> Option<String> {
    let region = match raw.find(prompt) {
        Some(idx) => &raw[idx + prompt.len()..],
        None => return fallback(raw, markers, min_reply_len),
    };

    let candidate = truncate_at_earliest_marker(region, markers).trim();
    if candidate.is_empty() {
        None
    } else {
        Some(candidate.to_string())
    }
}

/// Cut `text` at the first occurrence of any chrome or empty-state marker.
/// The returned prefix cannot contain a marker: any occurrence inside it
/// would itself have been the earliest.
fn truncate_at_earliest_marker<'a>(text: &'a str, markers: &Markers) -> &'a str {
    let cut = all_markers(markers)
        .filter_map(|m| text.find(m))
        .min()
        .unwrap_or(text.len());
    &text[..cut]
}

fn all_markers(markers: &Markers) -> impl Iterator<Item = &str> {
    markers
        .chrome
        .iter()
        .chain(markers.empty_states.iter())
        .map(String::as_str)
        .filter(|m| !m.is_empty())
}

/// No prompt anchor: keep only lines free of chrome, and accept the result
/// when it is long enough to plausibly be a reply and is not just the app's
/// idle placeholder.
fn fallback(raw: &str, markers: &Markers, min_reply_len: usize) -> Option<String> {
    let cleaned = raw
        .lines()
        .filter(|line| {
            !markers
                .chrome
                .iter()
                .filter(|m| !m.is_empty())
                .any(|m| line.contains(m.as_str()))
        })
        .collect::<Vec<_>>()
        .join("\n");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() < min_reply_len {
        return None;
    }
    if markers.empty_states.iter().any(|e| cleaned == e) {
        return None;
    }
    Some(cleaned.to_string())
}
