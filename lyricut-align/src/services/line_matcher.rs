//! Fuzzy matching of lyric lines against transcript windows.
//!
//! Transcripts of sung vocals are noisy: words get dropped, misheard, or
//! split differently than the lyric sheet. Three complementary strategies
//! score a line against each window, and each line takes the best window by
//! the weighted maximum of the three:
//!
//! 1. **Word-set overlap** (weight 0.85) — fraction of the line's distinct
//!    words present anywhere in the window. Order-blind, so it survives
//!    rearranged hearings.
//! 2. **Consecutive alignment** (weight 0.95) — slide the line's word
//!    sequence across the transcript; at the best offset, the fraction of
//!    positions whose words are character-similar. Tolerates misspellings
//!    but rewards order.
//! 3. **Whole-string similarity** (weight 1.0) — normalized Levenshtein
//!    over the joined normalized text. Only near-verbatim hearings score
//!    high, hence the full weight.
//!
//! The weights bias acceptance toward strategies with stronger positional
//! evidence while letting any single strong signal carry a match.

use std::collections::HashSet;

use strsim::normalized_levenshtein;

use crate::config::AlignConfig;
use crate::types::{MatchResult, TranscribedWindow};
use crate::utils::text;

pub struct LineMatcher {
    overlap_weight: f32,
    consecutive_weight: f32,
    whole_string_weight: f32,
    char_similarity_tolerance: f64,
    min_confidence: f32,
}

impl LineMatcher {
    pub fn new(config: &AlignConfig) -> Self {
        Self {
            overlap_weight: config.overlap_weight,
            consecutive_weight: config.consecutive_weight,
            whole_string_weight: config.whole_string_weight,
            char_similarity_tolerance: config.char_similarity_tolerance,
            min_confidence: config.min_match_confidence,
        }
    }

    /// Match one lyric line against every usable window.
    ///
    /// Instrumental-sentinel windows and windows with no words are never
    /// candidates. A line with no words after normalization is unmatched
    /// with confidence 0 without scoring anything. Ties go to the earliest
    /// window.
    pub fn match_line(&self, lyric: &str, windows: &[TranscribedWindow]) -> MatchResult {
        let lyric_words = text::words(lyric);
        if lyric_words.is_empty() {
            return MatchResult::unmatched();
        }
        let lyric_joined = lyric_words.join(" ");

        let mut best_index: Option<usize> = None;
        let mut best_score = 0.0f32;
        for window in windows {
            if window.is_instrumental() {
                continue;
            }
            let transcript_words = text::words(&window.text);
            if transcript_words.is_empty() {
                continue;
            }
            let score = self.score(&lyric_words, &lyric_joined, &transcript_words);
            // Strictly-greater comparison keeps the earliest window on ties
            if score > best_score {
                best_score = score;
                best_index = Some(window.index);
            }
        }

        if best_index.is_some() && best_score >= self.min_confidence {
            MatchResult {
                window_index: best_index,
                confidence: best_score,
            }
        } else {
            MatchResult {
                window_index: None,
                confidence: best_score,
            }
        }
    }

    /// Weighted-maximum score of one lyric against one transcript.
    fn score(&self, lyric_words: &[String], lyric_joined: &str, transcript_words: &[String]) -> f32 {
        let overlap = word_overlap_ratio(lyric_words, transcript_words);
        let consecutive =
            best_word_offset(lyric_words, transcript_words, self.char_similarity_tolerance)
                .map_or(0.0, |(_, ratio)| ratio);
        let whole = normalized_levenshtein(lyric_joined, &transcript_words.join(" "));

        [
            overlap as f32 * self.overlap_weight,
            consecutive as f32 * self.consecutive_weight,
            whole as f32 * self.whole_string_weight,
        ]
        .into_iter()
        .fold(0.0f32, f32::max)
    }
}

/// Fraction of the lyric's distinct words present in the transcript.
fn word_overlap_ratio(lyric_words: &[String], transcript_words: &[String]) -> f64 {
    let lyric_set: HashSet<&str> = lyric_words.iter().map(String::as_str).collect();
    if lyric_set.is_empty() {
        return 0.0;
    }
    let transcript_set: HashSet<&str> = transcript_words.iter().map(String::as_str).collect();
    let hits = lyric_set.intersection(&transcript_set).count();
    hits as f64 / lyric_set.len() as f64
}

/// Best alignment of the lyric word sequence inside the transcript word
/// sequence: `(offset, hit_ratio)` where a hit is a position whose words
/// exceed `tolerance` normalized character similarity.
///
/// `None` when the transcript carries fewer words than the lyric (no offset
/// exists). Ties between offsets go to the earliest. Also used by the
/// timestamp refiner to locate a matched line inside its window.
pub(crate) fn best_word_offset(
    lyric_words: &[String],
    transcript_words: &[String],
    tolerance: f64,
) -> Option<(usize, f64)> {
    if lyric_words.is_empty() || transcript_words.len() < lyric_words.len() {
        return None;
    }
    let mut best: Option<(usize, f64)> = None;
    for offset in 0..=(transcript_words.len() - lyric_words.len()) {
        let hits = lyric_words
            .iter()
            .zip(&transcript_words[offset..offset + lyric_words.len()])
            .filter(|(lyric, heard)| normalized_levenshtein(lyric, heard) > tolerance)
            .count();
        let ratio = hits as f64 / lyric_words.len() as f64;
        if best.map_or(true, |(_, best_ratio)| ratio > best_ratio) {
            best = Some((offset, ratio));
        }
    }
    best
}
