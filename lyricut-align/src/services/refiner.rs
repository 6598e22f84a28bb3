//! Timestamp estimation for matched lines.
//!
//! A match only says "this line was heard in this window". The refiner
//! turns that into a `[start, end)` estimate using the window's own speech
//! rate: words heard per second of window. The line's position inside the
//! window comes from the same best-offset search the consecutive matching
//! strategy uses, and its duration from word count over the rate.
//!
//! Estimates are deliberately conservative: duration is clamped to the
//! configured phrase bounds and both edges are clamped into the song, so a
//! refined phrase is always a valid slice of the waveform.

use crate::config::AlignConfig;
use crate::services::line_matcher::best_word_offset;
use crate::types::TranscribedWindow;
use crate::utils::text;

pub struct TimestampRefiner {
    min_phrase_duration: f64,
    max_phrase_duration: f64,
    fallback_words_per_second: f64,
    char_similarity_tolerance: f64,
}

impl TimestampRefiner {
    pub fn new(config: &AlignConfig) -> Self {
        Self {
            min_phrase_duration: config.min_phrase_duration,
            max_phrase_duration: config.max_phrase_duration,
            fallback_words_per_second: config.fallback_words_per_second,
            char_similarity_tolerance: config.char_similarity_tolerance,
        }
    }

    /// Estimate `[start, end)` in song time for a lyric inside its matched
    /// window.
    pub fn refine(
        &self,
        lyric: &str,
        window: &TranscribedWindow,
        song_duration: f64,
    ) -> (f64, f64) {
        let lyric_words = text::words(lyric);
        let transcript_words = text::words(&window.text);

        let words_per_second = self.words_per_second(&transcript_words, window);

        // Position within the window: word offset over speech rate. When no
        // offset exists (transcript shorter than the lyric), the window
        // start is the best available anchor.
        let est_start = match best_word_offset(
            &lyric_words,
            &transcript_words,
            self.char_similarity_tolerance,
        ) {
            Some((offset, _)) => window.start_time + offset as f64 / words_per_second,
            None => window.start_time,
        };

        let est_duration = (lyric_words.len() as f64 / words_per_second)
            .clamp(self.min_phrase_duration, self.max_phrase_duration);
        let est_end = est_start + est_duration;

        // Clamp into the song, keeping room for a minimum-length phrase
        let start = est_start
            .min(song_duration - self.min_phrase_duration)
            .max(0.0);
        let end = est_end.max(start + self.min_phrase_duration).min(song_duration);
        (start, end)
    }

    /// Speech rate observed in the window, or the configured fallback when
    /// the window carries no usable transcript timing.
    fn words_per_second(&self, transcript_words: &[String], window: &TranscribedWindow) -> f64 {
        let duration = window.duration();
        if transcript_words.is_empty() || duration <= 0.0 {
            return self.fallback_words_per_second;
        }
        let rate = transcript_words.len() as f64 / duration;
        if rate > 0.0 {
            rate
        } else {
            self.fallback_words_per_second
        }
    }
}
