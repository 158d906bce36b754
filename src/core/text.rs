// Review text helpers for list rows and map callouts

/// Maximum characters shown in a review preview before truncation.
pub const SNIPPET_MAX_CHARS: usize = 90;

/// Shown when a review carries no body text.
pub const SNIPPET_PLACEHOLDER: &str = "No written review";

/// Preview text for a review body: text at or under the limit passes through
/// unmodified, longer text is cut at the limit and marked with an ellipsis.
/// Absent (or blank) text yields the fixed placeholder. The limit counts
/// characters, not bytes, so multibyte text never splits mid-character.
pub fn review_snippet(body: Option<&str>) -> String {
    let text = match body {
        Some(t) if !t.trim().is_empty() => t,
        _ => return SNIPPET_PLACEHOLDER.to_string(),
    };

    if text.chars().count() <= SNIPPET_MAX_CHARS {
        return text.to_string();
    }

    let mut snippet: String = text.chars().take(SNIPPET_MAX_CHARS).collect();
    snippet.push('…');
    snippet
}
