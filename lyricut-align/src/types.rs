//! Core data model for the alignment pipeline.
//!
//! Everything that crosses a service boundary lives here: decoded audio,
//! lyric sheets, transcript windows, match results, aligned phrases, written
//! clips, and the cache records that make reruns idempotent.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use lyricut_common::time;
use lyricut_common::{AlignMethod, Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::utils::text;

/// Transcript text a transcriber emits for windows it judges to carry no
/// vocals. Windows holding exactly this sentinel are excluded from matching.
pub const INSTRUMENTAL_SENTINEL: &str = "[INSTRUMENTAL]";

/// Version stamp written into cache records. Bump when the record layout or
/// the semantics behind it change; records with another version are ignored.
pub const CACHE_VERSION: u32 = 1;

/// Decoded mono audio at its native sample rate.
///
/// Samples are `f32` in `[-1.0, 1.0]`. The waveform is immutable after
/// construction; services slice it by sample index and never mutate it.
#[derive(Debug, Clone)]
pub struct Waveform {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(Error::Audio("waveform sample rate must be > 0".to_string()));
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Total duration in seconds.
    pub fn duration(&self) -> f64 {
        time::samples_to_seconds(self.samples.len(), self.sample_rate)
    }

    /// Slice the waveform by a `[start, end)` range in seconds, clamped to
    /// the buffer. An inverted or out-of-range request yields an empty slice.
    pub fn segment(&self, start_seconds: f64, end_seconds: f64) -> &[f32] {
        let (start, end) = time::sample_range(
            start_seconds,
            end_seconds,
            self.sample_rate,
            self.samples.len(),
        );
        &self.samples[start..end]
    }

    /// Content hash of the decoded audio. Cache records carry this so a file
    /// replaced in place (same path, new content) invalidates its entries.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.sample_rate.to_le_bytes());
        let mut buf = Vec::with_capacity(4096 * 4);
        for chunk in self.samples.chunks(4096) {
            buf.clear();
            for sample in chunk {
                buf.extend_from_slice(&sample.to_le_bytes());
            }
            hasher.update(&buf);
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Root-mean-square level of a sample slice. Empty input reports 0.0.
pub fn rms_of(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|s| (*s as f64) * (*s as f64)).sum();
    (sum / samples.len() as f64).sqrt() as f32
}

/// One line of a lyric sheet, tagged with its position among the non-empty
/// lines of the source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LyricLine {
    pub index: usize,
    pub text: String,
}

/// Lyric sheet split into non-empty lines.
#[derive(Debug, Clone, Default)]
pub struct LyricSheet {
    pub lines: Vec<LyricLine>,
    /// Where the sheet came from, for diagnostics.
    pub source: String,
}

impl LyricSheet {
    /// Split raw lyric text into trimmed, non-empty lines. Indices count the
    /// non-empty lines, so blank-line formatting never shifts them.
    pub fn from_text(raw: &str, source: impl Into<String>) -> Self {
        let lines = raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .enumerate()
            .map(|(index, line)| LyricLine {
                index,
                text: line.to_string(),
            })
            .collect();
        Self {
            lines,
            source: source.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// One overlapping transcription window and the text heard in it.
///
/// A failed or timed-out transcription leaves `text` empty; the window still
/// occupies its slot so indices stay aligned with the window plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscribedWindow {
    pub index: usize,
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
}

impl TranscribedWindow {
    pub fn duration(&self) -> f64 {
        (self.end_time - self.start_time).max(0.0)
    }

    /// Whether the transcriber marked this window as carrying no vocals.
    pub fn is_instrumental(&self) -> bool {
        self.text.trim() == INSTRUMENTAL_SENTINEL
    }
}

/// Outcome of matching one lyric line against the transcript windows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchResult {
    /// Best-scoring window, or `None` when no window cleared the confidence
    /// threshold. The confidence of the best candidate is reported either
    /// way for diagnostics.
    pub window_index: Option<usize>,
    pub confidence: f32,
}

impl MatchResult {
    pub fn unmatched() -> Self {
        Self {
            window_index: None,
            confidence: 0.0,
        }
    }

    pub fn is_match(&self) -> bool {
        self.window_index.is_some()
    }
}

/// Validation bounds for phrase timestamps, derived from the alignment
/// config.
#[derive(Debug, Clone, Copy)]
pub struct PhraseBounds {
    pub min_duration: f64,
    pub max_duration: f64,
    pub duration_tolerance: f64,
}

impl PhraseBounds {
    /// Longest duration a phrase may legitimately carry after end-extension.
    pub fn max_with_tolerance(&self) -> f64 {
        self.max_duration + self.duration_tolerance
    }
}

/// An aligned lyric phrase: one selected line with refined timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phrase {
    pub line_index: usize,
    pub text: String,
    pub start_time: f64,
    pub end_time: f64,
    pub confidence: f32,
    pub method: AlignMethod,
}

impl Phrase {
    /// Build a phrase, rejecting timestamps the refiner and segmenter can
    /// never legitimately produce.
    ///
    /// The minimum-duration floor is deliberately not checked here: a phrase
    /// squeezed against the end of the song can be shorter than the floor and
    /// is still a valid alignment. Clip extraction enforces the floor.
    pub fn new(
        line_index: usize,
        text: impl Into<String>,
        start_time: f64,
        end_time: f64,
        confidence: f32,
        method: AlignMethod,
        bounds: &PhraseBounds,
    ) -> Result<Self> {
        let phrase = Self {
            line_index,
            text: text.into(),
            start_time,
            end_time,
            confidence,
            method,
        };
        phrase.check(bounds)?;
        Ok(phrase)
    }

    /// Re-validate timestamps. Runs at construction and again when phrases
    /// are loaded from cache, so a tampered or stale record cannot smuggle
    /// impossible timestamps into clip extraction.
    pub fn check(&self, bounds: &PhraseBounds) -> Result<()> {
        if !self.start_time.is_finite() || !self.end_time.is_finite() {
            return Err(Error::InvalidInput(format!(
                "phrase for line {} has non-finite timestamps",
                self.line_index
            )));
        }
        if self.start_time < 0.0 {
            return Err(Error::InvalidInput(format!(
                "phrase for line {} starts before 0 ({:.3}s)",
                self.line_index, self.start_time
            )));
        }
        if self.end_time <= self.start_time {
            return Err(Error::InvalidInput(format!(
                "phrase for line {} has inverted timestamps ({:.3}s..{:.3}s)",
                self.line_index, self.start_time, self.end_time
            )));
        }
        let duration = self.end_time - self.start_time;
        if duration > bounds.max_with_tolerance() + 1e-6 {
            return Err(Error::InvalidInput(format!(
                "phrase for line {} is {:.3}s long, over the {:.3}s ceiling",
                self.line_index,
                duration,
                bounds.max_with_tolerance()
            )));
        }
        Ok(())
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// One clip written to disk, as recorded in the song's metadata manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub file_name: String,
    pub artist: String,
    pub title: String,
    pub lyric: String,
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    pub rms: f32,
    pub song_index: usize,
    /// Position of the source phrase in the selected list. Rejected phrases
    /// keep their position, so written clips may skip numbers.
    pub clip_index: usize,
    pub confidence: f32,
    pub method: AlignMethod,
    /// Set when the content classifier flagged the lyric text.
    pub flagged: bool,
}

/// Stable identifier for a song within a batch: zero-padded index plus
/// sanitized artist and title. Used for cache keys, log fields, and output
/// naming.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SongId(String);

impl SongId {
    pub fn new(song_index: usize, artist: &str, title: &str) -> Self {
        Self(format!(
            "{:03}_{}_{}",
            song_index,
            text::sanitize_identifier(artist),
            text::sanitize_identifier(title),
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SongId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One song queued for alignment.
#[derive(Debug, Clone)]
pub struct SongRequest {
    pub song_index: usize,
    pub artist: String,
    pub title: String,
    pub audio_path: PathBuf,
}

impl SongRequest {
    pub fn song_id(&self) -> SongId {
        SongId::new(self.song_index, &self.artist, &self.title)
    }
}

/// Transcript cache entry for one song.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptCacheRecord {
    pub version: u32,
    pub fingerprint: String,
    pub transcriber: String,
    pub window_duration: f64,
    pub window_step: f64,
    pub windows: Vec<TranscribedWindow>,
    pub created_at: DateTime<Utc>,
}

impl TranscriptCacheRecord {
    /// Whether this record can stand in for a fresh transcription run of the
    /// given audio under the given windowing parameters.
    pub fn matches(
        &self,
        fingerprint: &str,
        transcriber: &str,
        window_duration: f64,
        window_step: f64,
    ) -> bool {
        self.version == CACHE_VERSION
            && self.fingerprint == fingerprint
            && self.transcriber == transcriber
            && self.window_duration == window_duration
            && self.window_step == window_step
    }
}

/// Phrase cache entry for one song: the full aligned phrase list from a
/// previous run, reusable wholesale or as priors for realignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhraseCacheRecord {
    pub version: u32,
    pub fingerprint: String,
    pub phrases: Vec<Phrase>,
    pub created_at: DateTime<Utc>,
}

impl PhraseCacheRecord {
    pub fn matches(&self, fingerprint: &str) -> bool {
        self.version == CACHE_VERSION && self.fingerprint == fingerprint
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> PhraseBounds {
        PhraseBounds {
            min_duration: 0.6,
            max_duration: 4.0,
            duration_tolerance: 1.0,
        }
    }

    #[test]
    fn test_waveform_rejects_zero_rate() {
        assert!(Waveform::new(vec![0.0; 10], 0).is_err());
    }

    #[test]
    fn test_waveform_duration() {
        let wav = Waveform::new(vec![0.0; 44100], 44100).unwrap();
        assert!((wav.duration() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_waveform_segment_clamps() {
        let wav = Waveform::new(vec![0.5; 100], 10).unwrap();
        assert_eq!(wav.segment(0.0, 1.0).len(), 10);
        assert_eq!(wav.segment(9.0, 20.0).len(), 10);
        assert!(wav.segment(5.0, 3.0).is_empty());
    }

    #[test]
    fn test_fingerprint_tracks_content_and_rate() {
        let a = Waveform::new(vec![0.1, 0.2, 0.3], 44100).unwrap();
        let b = Waveform::new(vec![0.1, 0.2, 0.3], 44100).unwrap();
        let c = Waveform::new(vec![0.1, 0.2, 0.4], 44100).unwrap();
        let d = Waveform::new(vec![0.1, 0.2, 0.3], 48000).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_ne!(a.fingerprint(), d.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }

    #[test]
    fn test_rms_of() {
        assert_eq!(rms_of(&[]), 0.0);
        assert!((rms_of(&[0.5, -0.5, 0.5, -0.5]) - 0.5).abs() < 1e-6);
        assert_eq!(rms_of(&[0.0; 32]), 0.0);
    }

    #[test]
    fn test_lyric_sheet_skips_blank_lines() {
        let sheet = LyricSheet::from_text("first line\n\n  \nsecond line\n", "test");
        assert_eq!(sheet.len(), 2);
        assert_eq!(sheet.lines[0].index, 0);
        assert_eq!(sheet.lines[0].text, "first line");
        assert_eq!(sheet.lines[1].index, 1);
        assert_eq!(sheet.lines[1].text, "second line");
    }

    #[test]
    fn test_instrumental_detection_trims() {
        let make = |text: &str| TranscribedWindow {
            index: 0,
            start_time: 0.0,
            end_time: 10.0,
            text: text.to_string(),
        };
        assert!(make("[INSTRUMENTAL]").is_instrumental());
        assert!(make("  [INSTRUMENTAL]  ").is_instrumental());
        assert!(!make("guitar [INSTRUMENTAL] solo").is_instrumental());
        assert!(!make("").is_instrumental());
    }

    #[test]
    fn test_phrase_validation() {
        let b = bounds();
        assert!(Phrase::new(0, "ok", 1.0, 3.0, 0.9, AlignMethod::Matched, &b).is_ok());
        // negative start
        assert!(Phrase::new(0, "x", -0.1, 3.0, 0.9, AlignMethod::Matched, &b).is_err());
        // inverted
        assert!(Phrase::new(0, "x", 3.0, 3.0, 0.9, AlignMethod::Matched, &b).is_err());
        // over the extended ceiling
        assert!(Phrase::new(0, "x", 0.0, 5.1, 0.9, AlignMethod::Matched, &b).is_err());
        // exactly at the extended ceiling is allowed
        assert!(Phrase::new(0, "x", 0.0, 5.0, 0.9, AlignMethod::Matched, &b).is_ok());
        // shorter than the clip floor is still a valid phrase
        assert!(Phrase::new(0, "x", 0.0, 0.3, 0.9, AlignMethod::Fallback, &b).is_ok());
    }

    #[test]
    fn test_song_id_sanitizes() {
        let id = SongId::new(7, "AC/DC", "Back in Black!");
        assert_eq!(id.as_str(), "007_AC_DC_Back_in_Black");
    }

    #[test]
    fn test_transcript_record_matching() {
        let record = TranscriptCacheRecord {
            version: CACHE_VERSION,
            fingerprint: "abc".to_string(),
            transcriber: "scripted".to_string(),
            window_duration: 10.0,
            window_step: 5.0,
            windows: Vec::new(),
            created_at: lyricut_common::time::now(),
        };
        assert!(record.matches("abc", "scripted", 10.0, 5.0));
        assert!(!record.matches("other", "scripted", 10.0, 5.0));
        assert!(!record.matches("abc", "different", 10.0, 5.0));
        assert!(!record.matches("abc", "scripted", 8.0, 5.0));

        let mut stale = record;
        stale.version = CACHE_VERSION + 1;
        assert!(!stale.matches("abc", "scripted", 10.0, 5.0));
    }

    #[test]
    fn test_phrase_record_matching() {
        let record = PhraseCacheRecord {
            version: CACHE_VERSION,
            fingerprint: "abc".to_string(),
            phrases: Vec::new(),
            created_at: lyricut_common::time::now(),
        };
        assert!(record.matches("abc"));
        assert!(!record.matches("def"));
    }
}
