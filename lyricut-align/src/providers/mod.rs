//! Service provider traits and bundled adapters.
//!
//! The engine core stays IO-agnostic: audio decoding, lyric lookup, external
//! transcription, optional line ranking, and content classification all
//! arrive through the traits here. Bundled implementations cover local files
//! plus no-network defaults, so the binary runs with nothing external
//! configured (every song then lands on the acoustic fallback).

pub mod file_audio;
pub mod file_lyrics;
pub mod retry;

pub use file_audio::FileAudioSource;
pub use file_lyrics::FileLyricsProvider;
pub use retry::{RetryPolicy, TranscriberClient};

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use lyricut_common::Result;

use crate::types::{LyricLine, LyricSheet, SongRequest, Waveform};

/// Boxed future used by the object-safe async traits below.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Decodes an audio file into a mono waveform at its native rate.
///
/// Implementations may block; callers run them on blocking threads.
pub trait AudioSource: Send + Sync {
    fn load(&self, path: &Path) -> Result<Waveform>;
}

/// Looks up the lyric sheet for a song. `Ok(None)` means the song has no
/// sheet and should be skipped with a diagnostic, not failed.
pub trait LyricsProvider: Send + Sync {
    fn lyrics(&self, request: &SongRequest) -> Result<Option<LyricSheet>>;
}

/// External speech-to-text service invoked once per window.
pub trait TranscriptionService: Send + Sync {
    /// Short name recorded in transcript cache records, so switching
    /// services invalidates cached transcripts.
    fn name(&self) -> &str;

    /// Sample rate the service expects its input at, or `None` to accept
    /// the waveform's native rate.
    fn required_sample_rate(&self) -> Option<u32>;

    /// Transcribe one window of mono audio. `segment_id` identifies the
    /// window for service-side logging and correlation. An all-instrumental
    /// window is reported by returning the `[INSTRUMENTAL]` sentinel text.
    fn transcribe<'a>(
        &'a self,
        segment_id: &'a str,
        samples: &'a [f32],
        sample_rate: u32,
    ) -> BoxFuture<'a, Result<String>>;
}

/// Optional ranking of lyric lines by suitability for clipping.
///
/// Returns indices into `lines` in preference order. Errors and unusable
/// responses fall back to sheet order at the call site, so implementations
/// are free to fail.
pub trait LineRanker: Send + Sync {
    fn rank<'a>(
        &'a self,
        lines: &'a [LyricLine],
        guidance: &'a str,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<usize>>>;
}

/// Flags lyric text that downstream consumers may want to exclude. The flag
/// is recorded per clip; flagged clips are still written.
pub trait ContentClassifier: Send + Sync {
    fn is_sensitive(&self, text: &str) -> bool;
}

/// Stand-in transcription service for offline runs.
///
/// Hears nothing: every window transcribes to the empty string, so no line
/// ever matches and every song is aligned by the acoustic fallback.
#[derive(Debug, Default)]
pub struct UnavailableTranscriber;

impl TranscriptionService for UnavailableTranscriber {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn required_sample_rate(&self) -> Option<u32> {
        None
    }

    fn transcribe<'a>(
        &'a self,
        _segment_id: &'a str,
        _samples: &'a [f32],
        _sample_rate: u32,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async { Ok(String::new()) })
    }
}

/// Classifier that flags nothing.
#[derive(Debug, Default)]
pub struct PermissiveClassifier;

impl ContentClassifier for PermissiveClassifier {
    fn is_sensitive(&self, _text: &str) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unavailable_transcriber_hears_nothing() {
        let service = UnavailableTranscriber;
        let text = service
            .transcribe("001_a_b_w000", &[0.0; 100], 44100)
            .await
            .unwrap();
        assert!(text.is_empty());
        assert_eq!(service.name(), "unavailable");
        assert_eq!(service.required_sample_rate(), None);
    }

    #[test]
    fn test_permissive_classifier_flags_nothing() {
        let classifier = PermissiveClassifier;
        assert!(!classifier.is_sensitive("anything at all"));
    }
}
