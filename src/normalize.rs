// Text normalization for filter definitions and log lines
//
// DESIGN: Two separate rules that must never be merged.
// - term_tokens: filter definitions. Trim, lower-case, split. Punctuation is kept.
// - line_tokens: submitted log lines. Trim, strip punctuation, lower-case,
//   split, deduplicate.

use std::collections::HashSet;

/// Deduplicated tokens of one submitted log line.
pub type LineTokens = HashSet<String>;

/// Normalize a raw filter definition into its ordered terms.
///
/// Duplicates are preserved. An empty or whitespace-only definition yields a
/// single empty term, so a filter built from it can never match a line.
pub fn term_tokens(raw: &str) -> Vec<String> {
    let lowered = raw.trim().to_lowercase();
    if lowered.is_empty() {
        return vec![String::new()];
    }

    lowered.split_whitespace().map(str::to_owned).collect()
}

/// Normalize a raw log line into its token set.
///
/// Punctuation is the ASCII `[:punct:]` class; it is removed, not replaced,
/// so `can't` becomes `cant`. The result never contains an empty token.
pub fn line_tokens(raw: &str) -> LineTokens {
    let stripped: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_ascii_punctuation())
        .collect();

    stripped
        .to_lowercase()
        .split_whitespace()
        .map(str::to_owned)
        .collect()
}
