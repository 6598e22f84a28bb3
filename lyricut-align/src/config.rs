//! Configuration for the alignment engine.
//!
//! Two layers:
//! 1. **TOML file**: directories, logging, and the alignment knobs. Optional;
//!    every field has a built-in default so the engine runs with no file at
//!    all.
//! 2. **Command-line overrides**: a small set of flags applied on top of the
//!    TOML values (highest priority).
//!
//! All tunables the matching, refinement, segmentation, and extraction math
//! depends on live in [`AlignConfig`] so tests can pin them explicitly.

use std::path::{Path, PathBuf};
use std::time::Duration;

use lyricut_common::config::{load_toml_file, LoggingConfig};
use lyricut_common::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::types::PhraseBounds;

/// How cached artifacts from previous runs are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachePolicy {
    /// Reuse valid cached phrases wholesale; transcribe only on cache miss.
    #[default]
    ReadThrough,
    /// Re-run alignment but treat cached phrases as priors: a cached phrase
    /// survives unless the fresh match beats its confidence.
    Realign,
    /// Drop both caches up front and recompute everything.
    Force,
}

/// Tunables for matching, refinement, fallback segmentation, and clip
/// extraction.
///
/// Deserialized from the `[align]` table of the config file; any field may be
/// omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignConfig {
    // === Transcription windows ===
    /// Window length in seconds.
    pub window_duration: f64,
    /// Stride between window starts in seconds. Must be below
    /// `window_duration` so consecutive windows overlap.
    pub window_step: f64,

    // === Fuzzy matching ===
    /// Weight applied to the word-set overlap strategy.
    pub overlap_weight: f32,
    /// Weight applied to the consecutive sliding-window strategy.
    pub consecutive_weight: f32,
    /// Weight applied to the whole-string similarity strategy.
    pub whole_string_weight: f32,
    /// Per-word similarity a transcript word must reach to count as a hit in
    /// the consecutive strategy.
    pub char_similarity_tolerance: f64,
    /// Weighted score a line must reach to count as matched. Useful values
    /// sit around 0.25..0.30; higher pushes more lines to the acoustic
    /// fallback.
    pub min_match_confidence: f32,

    // === Phrase durations ===
    /// Shortest clip worth keeping, in seconds.
    pub min_phrase_duration: f64,
    /// Longest duration the refiner will estimate, in seconds.
    pub max_phrase_duration: f64,
    /// Extra seconds a fallback segment may run past `max_phrase_duration`
    /// when its end is extended toward the next onset.
    pub duration_tolerance: f64,
    /// Speech rate assumed when a matched window has no usable transcript
    /// timing, in words per second.
    pub fallback_words_per_second: f64,

    // === Line selection ===
    /// Lines with fewer normalized words than this are dropped.
    pub min_line_words: usize,
    /// Hard cap on selected lines (and so on clips) per song.
    pub max_clips_per_song: usize,
    /// Free-form guidance passed to a line ranker, when one is configured.
    pub ranking_guidance: String,

    // === Acoustic onset fallback ===
    /// Samples per analysis frame for the energy envelope.
    pub onset_frame_size: usize,
    /// Samples between frame starts.
    pub onset_hop_size: usize,
    /// Normalized energy-flux level a peak must exceed to count as an onset.
    pub onset_threshold: f32,
    /// Onsets closer than this many seconds are merged.
    pub onset_merge_gap: f64,

    // === Clip extraction ===
    /// Symmetric padding added around each phrase before cutting, in seconds.
    pub clip_padding: f64,
    /// Clips whose RMS falls below this are rejected as near-silence.
    pub silence_rms: f32,

    // === Concurrency ===
    /// Songs processed in parallel.
    pub song_workers: usize,
    /// Windows transcribed in parallel per song. Valid range 1..=8.
    pub window_workers: usize,
    /// Concurrent CPU-bound jobs: decoding, onset analysis, and clip
    /// writing. Transcription is not gated here.
    pub cpu_workers: usize,

    // === Transcription service ===
    /// Per-window transcription timeout in seconds.
    pub transcription_timeout_secs: u64,
    /// Attempts per window before giving up and recording an empty
    /// transcript.
    pub retry_max_attempts: u32,
    /// Fixed delay between attempts in milliseconds.
    pub retry_backoff_ms: u64,
    /// Transcription requests permitted per second across all windows and
    /// songs.
    pub transcription_rps: u32,

    // === Run behavior ===
    /// Cache handling for this run.
    pub cache_policy: CachePolicy,
    /// When set, run the full pipeline but write no clips or manifests.
    pub dry_run: bool,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            window_duration: 10.0,
            window_step: 5.0,
            overlap_weight: 0.85,
            consecutive_weight: 0.95,
            whole_string_weight: 1.0,
            char_similarity_tolerance: 0.75,
            min_match_confidence: 0.28,
            min_phrase_duration: 0.6,
            max_phrase_duration: 4.0,
            duration_tolerance: 1.0,
            fallback_words_per_second: 5.0,
            min_line_words: 3,
            max_clips_per_song: 50,
            ranking_guidance: String::new(),
            onset_frame_size: 2048,
            onset_hop_size: 512,
            onset_threshold: 0.3,
            onset_merge_gap: 0.3,
            clip_padding: 0.05,
            silence_rms: 0.005,
            song_workers: 5,
            window_workers: 6,
            cpu_workers: default_cpu_workers(),
            transcription_timeout_secs: 30,
            retry_max_attempts: 3,
            retry_backoff_ms: 1000,
            transcription_rps: 2,
            cache_policy: CachePolicy::default(),
            dry_run: false,
        }
    }
}

fn default_cpu_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl AlignConfig {
    /// Validate every tunable, returning the first violation found.
    pub fn validate(&self) -> Result<()> {
        fn fail(msg: String) -> Result<()> {
            Err(Error::Config(msg))
        }

        if self.window_duration <= 0.0 {
            return fail(format!(
                "window_duration must be > 0, got {}",
                self.window_duration
            ));
        }
        if self.window_step <= 0.0 || self.window_step >= self.window_duration {
            return fail(format!(
                "window_step must be in (0, window_duration), got {} (window_duration {})",
                self.window_step, self.window_duration
            ));
        }
        for (name, weight) in [
            ("overlap_weight", self.overlap_weight),
            ("consecutive_weight", self.consecutive_weight),
            ("whole_string_weight", self.whole_string_weight),
        ] {
            if !(0.0..=1.0).contains(&weight) || weight == 0.0 {
                return fail(format!("{} must be in (0, 1], got {}", name, weight));
            }
        }
        if !(0.0..1.0).contains(&self.char_similarity_tolerance)
            || self.char_similarity_tolerance == 0.0
        {
            return fail(format!(
                "char_similarity_tolerance must be in (0, 1), got {}",
                self.char_similarity_tolerance
            ));
        }
        if !(0.0..=1.0).contains(&self.min_match_confidence) {
            return fail(format!(
                "min_match_confidence must be in [0, 1], got {}",
                self.min_match_confidence
            ));
        }
        if self.min_phrase_duration <= 0.0 {
            return fail(format!(
                "min_phrase_duration must be > 0, got {}",
                self.min_phrase_duration
            ));
        }
        if self.max_phrase_duration <= self.min_phrase_duration {
            return fail(format!(
                "max_phrase_duration must exceed min_phrase_duration, got {} <= {}",
                self.max_phrase_duration, self.min_phrase_duration
            ));
        }
        if self.duration_tolerance < 0.0 {
            return fail(format!(
                "duration_tolerance must be >= 0, got {}",
                self.duration_tolerance
            ));
        }
        if self.fallback_words_per_second <= 0.0 {
            return fail(format!(
                "fallback_words_per_second must be > 0, got {}",
                self.fallback_words_per_second
            ));
        }
        if self.min_line_words == 0 {
            return fail("min_line_words must be >= 1".to_string());
        }
        if self.max_clips_per_song == 0 {
            return fail("max_clips_per_song must be >= 1".to_string());
        }
        if self.onset_frame_size < 2 {
            return fail(format!(
                "onset_frame_size must be >= 2, got {}",
                self.onset_frame_size
            ));
        }
        if self.onset_hop_size == 0 || self.onset_hop_size > self.onset_frame_size {
            return fail(format!(
                "onset_hop_size must be in 1..=onset_frame_size, got {}",
                self.onset_hop_size
            ));
        }
        if !(0.0..1.0).contains(&self.onset_threshold) || self.onset_threshold == 0.0 {
            return fail(format!(
                "onset_threshold must be in (0, 1), got {}",
                self.onset_threshold
            ));
        }
        if self.onset_merge_gap < 0.0 {
            return fail(format!(
                "onset_merge_gap must be >= 0, got {}",
                self.onset_merge_gap
            ));
        }
        if self.clip_padding < 0.0 {
            return fail(format!(
                "clip_padding must be >= 0, got {}",
                self.clip_padding
            ));
        }
        if self.silence_rms < 0.0 {
            return fail(format!("silence_rms must be >= 0, got {}", self.silence_rms));
        }
        if self.song_workers == 0 {
            return fail("song_workers must be >= 1".to_string());
        }
        if !(1..=8).contains(&self.window_workers) {
            return fail(format!(
                "window_workers must be in 1..=8, got {}",
                self.window_workers
            ));
        }
        if self.cpu_workers == 0 {
            return fail("cpu_workers must be >= 1".to_string());
        }
        if self.transcription_timeout_secs == 0 {
            return fail("transcription_timeout_secs must be >= 1".to_string());
        }
        if self.retry_max_attempts == 0 {
            return fail("retry_max_attempts must be >= 1".to_string());
        }
        if self.transcription_rps == 0 {
            return fail("transcription_rps must be >= 1".to_string());
        }
        Ok(())
    }

    /// Per-window transcription timeout as a Duration.
    pub fn transcription_timeout(&self) -> Duration {
        Duration::from_secs(self.transcription_timeout_secs)
    }

    /// Delay between transcription attempts as a Duration.
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Timestamp validation bounds for phrases built under this config.
    pub fn phrase_bounds(&self) -> PhraseBounds {
        PhraseBounds {
            min_duration: self.min_phrase_duration,
            max_duration: self.max_phrase_duration,
            duration_tolerance: self.duration_tolerance,
        }
    }
}

/// Full configuration file layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Directory scanned for audio files.
    pub audio_dir: PathBuf,
    /// Directory holding `{Artist} - {Title}.txt` lyric sheets.
    pub lyrics_dir: PathBuf,
    /// Directory for transcript and phrase caches.
    pub cache_dir: PathBuf,
    /// Directory clips and manifests are written under.
    pub output_dir: PathBuf,
    /// Logging configuration.
    pub logging: LoggingConfig,
    /// Alignment engine tunables.
    pub align: AlignConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            audio_dir: PathBuf::from("audio"),
            lyrics_dir: PathBuf::from("lyrics"),
            cache_dir: PathBuf::from("cache"),
            output_dir: PathBuf::from("output"),
            logging: LoggingConfig::default(),
            align: AlignConfig::default(),
        }
    }
}

impl TomlConfig {
    /// Load configuration, apply CLI overrides, and validate.
    ///
    /// A missing file is not an error: built-in defaults are used so the
    /// engine runs with nothing but directories on the command line.
    pub fn load(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let config: TomlConfig = load_toml_file(path)?;
                info!(path = %path.display(), "Loaded configuration file");
                config
            }
            Some(path) => {
                return Err(Error::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            None => TomlConfig::default(),
        };
        overrides.apply(&mut config);
        config.align.validate()?;
        Ok(config)
    }
}

/// Command-line overrides applied on top of the configuration file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub audio_dir: Option<PathBuf>,
    pub lyrics_dir: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub song_workers: Option<usize>,
    pub window_workers: Option<usize>,
    pub max_clips_per_song: Option<usize>,
    pub min_match_confidence: Option<f32>,
    pub cache_policy: Option<CachePolicy>,
    pub dry_run: Option<bool>,
}

impl ConfigOverrides {
    fn apply(&self, config: &mut TomlConfig) {
        if let Some(dir) = &self.audio_dir {
            config.audio_dir = dir.clone();
        }
        if let Some(dir) = &self.lyrics_dir {
            config.lyrics_dir = dir.clone();
        }
        if let Some(dir) = &self.cache_dir {
            config.cache_dir = dir.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(n) = self.song_workers {
            config.align.song_workers = n;
        }
        if let Some(n) = self.window_workers {
            config.align.window_workers = n;
        }
        if let Some(n) = self.max_clips_per_song {
            config.align.max_clips_per_song = n;
        }
        if let Some(c) = self.min_match_confidence {
            config.align.min_match_confidence = c;
        }
        if let Some(policy) = self.cache_policy {
            config.align.cache_policy = policy;
        }
        if let Some(dry) = self.dry_run {
            config.align.dry_run = dry;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        AlignConfig::default().validate().unwrap();
    }

    #[test]
    fn test_window_step_must_be_below_duration() {
        let mut config = AlignConfig::default();
        config.window_step = 10.0;
        assert!(config.validate().is_err());
        config.window_step = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_window_workers_range() {
        let mut config = AlignConfig::default();
        config.window_workers = 0;
        assert!(config.validate().is_err());
        config.window_workers = 9;
        assert!(config.validate().is_err());
        config.window_workers = 8;
        config.validate().unwrap();
    }

    #[test]
    fn test_duration_ordering_enforced() {
        let mut config = AlignConfig::default();
        config.max_phrase_duration = config.min_phrase_duration;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let parsed: TomlConfig = toml::from_str(
            r#"
            audio_dir = "/music"

            [align]
            min_match_confidence = 0.3
            song_workers = 2
            "#,
        )
        .unwrap();
        assert_eq!(parsed.audio_dir, PathBuf::from("/music"));
        assert_eq!(parsed.lyrics_dir, PathBuf::from("lyrics"));
        assert_eq!(parsed.align.min_match_confidence, 0.3);
        assert_eq!(parsed.align.song_workers, 2);
        assert_eq!(parsed.align.window_duration, 10.0);
    }

    #[test]
    fn test_cache_policy_serde_names() {
        let parsed: TomlConfig = toml::from_str(
            r#"
            [align]
            cache_policy = "realign"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.align.cache_policy, CachePolicy::Realign);
    }

    #[test]
    fn test_overrides_apply() {
        let mut config = TomlConfig::default();
        let overrides = ConfigOverrides {
            output_dir: Some(PathBuf::from("/out")),
            song_workers: Some(1),
            cache_policy: Some(CachePolicy::Force),
            dry_run: Some(true),
            ..Default::default()
        };
        overrides.apply(&mut config);
        assert_eq!(config.output_dir, PathBuf::from("/out"));
        assert_eq!(config.align.song_workers, 1);
        assert_eq!(config.align.cache_policy, CachePolicy::Force);
        assert!(config.align.dry_run);
    }

    #[test]
    fn test_missing_explicit_config_file_errors() {
        let result = TomlConfig::load(
            Some(Path::new("/nonexistent/lyricut.toml")),
            &ConfigOverrides::default(),
        );
        assert!(result.is_err());
    }
}
