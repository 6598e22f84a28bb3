//! Text normalization for fuzzy matching and filesystem-safe naming.
//!
//! All matching math runs on normalized text so that punctuation and casing
//! differences between a lyric sheet and a transcript never affect scores.

/// Normalize text for matching: lowercase, keep ASCII alphanumerics and
/// apostrophes, map everything else to whitespace, and collapse runs of
/// whitespace to single spaces.
///
/// Apostrophes survive so contractions stay single words ("don't" is one
/// word, not "don" and "t").
pub fn normalize(text: &str) -> String {
    let mapped: String = text
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '\'' {
                c
            } else {
                ' '
            }
        })
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split text into normalized words.
pub fn words(text: &str) -> Vec<String> {
    normalize(text)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Reduce a free-form artist or title to a filesystem-safe identifier.
///
/// Keeps ASCII alphanumerics, collapses every run of other characters to a
/// single underscore, trims leading/trailing underscores, and caps the result
/// at 40 characters. Inputs with no usable characters become `"unknown"` so a
/// file name never ends up with an empty segment.
pub fn sanitize_identifier(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len().min(40));
    let mut pending_sep = false;
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(ch);
        } else {
            pending_sep = true;
        }
    }
    // Output is pure ASCII, so the byte cap is also a char cap.
    out.truncate(40);
    while out.ends_with('_') {
        out.pop();
    }
    if out.is_empty() {
        "unknown".to_string()
    } else {
        out
    }
}
