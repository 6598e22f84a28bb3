//! Clip extraction: aligned phrases become WAV files on disk.
//!
//! Each phrase is padded slightly so consonants at the edges survive, then
//! gated: clips whose padded duration falls outside the accepted range, or
//! whose audio is effectively silent, are rejected rather than written.
//! Rejected phrases keep their clip index, so file numbering has gaps that
//! line up with the rejection report.

use std::fs;
use std::path::Path;

use tracing::debug;

use lyricut_common::{Error, Result};

use crate::config::AlignConfig;
use crate::providers::ContentClassifier;
use crate::types::{rms_of, Clip, Phrase, SongRequest, Waveform};
use crate::utils::text;

/// A phrase that did not become a clip, and why.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipRejection {
    pub line_index: usize,
    pub clip_index: usize,
    pub reason: String,
}

/// Everything one chop pass produced.
#[derive(Debug, Default)]
pub struct ChopOutcome {
    pub clips: Vec<Clip>,
    pub rejections: Vec<ClipRejection>,
}

pub struct ClipChopper {
    padding: f64,
    min_duration: f64,
    max_duration: f64,
    duration_tolerance: f64,
    silence_rms: f32,
    max_clips: usize,
}

impl ClipChopper {
    pub fn new(config: &AlignConfig) -> Self {
        Self {
            padding: config.clip_padding,
            min_duration: config.min_phrase_duration,
            max_duration: config.max_phrase_duration,
            duration_tolerance: config.duration_tolerance,
            silence_rms: config.silence_rms,
            max_clips: config.max_clips_per_song,
        }
    }

    /// Write clips for the given phrases under `clips_dir`. Stops once the
    /// per-song cap of accepted clips is reached. Only I/O failures abort;
    /// per-phrase rejections are collected in the outcome.
    pub fn chop(
        &self,
        request: &SongRequest,
        waveform: &Waveform,
        phrases: &[Phrase],
        classifier: &dyn ContentClassifier,
        clips_dir: &Path,
    ) -> Result<ChopOutcome> {
        fs::create_dir_all(clips_dir).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("creating clips directory {}: {}", clips_dir.display(), e),
            ))
        })?;

        let song_duration = waveform.duration();
        let cap = self.max_duration + self.duration_tolerance;
        let artist = text::sanitize_identifier(&request.artist);
        let title = text::sanitize_identifier(&request.title);

        let mut outcome = ChopOutcome::default();
        for (clip_index, phrase) in phrases.iter().enumerate() {
            if outcome.clips.len() >= self.max_clips {
                break;
            }

            let start = (phrase.start_time - self.padding).max(0.0);
            let end = (phrase.end_time + self.padding).min(song_duration);
            let duration = end - start;
            if duration < self.min_duration || duration > cap {
                outcome.rejections.push(ClipRejection {
                    line_index: phrase.line_index,
                    clip_index,
                    reason: format!(
                        "padded duration {:.2}s outside {:.2}s..{:.2}s",
                        duration, self.min_duration, cap
                    ),
                });
                continue;
            }

            let samples = waveform.segment(start, end);
            let rms = rms_of(samples);
            if rms < self.silence_rms {
                outcome.rejections.push(ClipRejection {
                    line_index: phrase.line_index,
                    clip_index,
                    reason: format!(
                        "rms {:.4} below silence threshold {:.4}",
                        rms, self.silence_rms
                    ),
                });
                continue;
            }

            let file_name = format!(
                "{:03}_{}_{}_p{:03}.wav",
                request.song_index, artist, title, clip_index
            );
            write_wav(&clips_dir.join(&file_name), samples, waveform.sample_rate())?;
            debug!(file = %file_name, start, end, "wrote clip");

            outcome.clips.push(Clip {
                file_name,
                artist: request.artist.clone(),
                title: request.title.clone(),
                lyric: phrase.text.clone(),
                start_time: start,
                end_time: end,
                duration,
                rms,
                song_index: request.song_index,
                clip_index,
                confidence: phrase.confidence,
                method: phrase.method,
                flagged: classifier.is_sensitive(&phrase.text),
            });
        }
        Ok(outcome)
    }
}

/// 16-bit mono PCM at the waveform's native rate.
fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| Error::Audio(format!("creating {}: {}", path.display(), e)))?;
    for &sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
        writer
            .write_sample(value)
            .map_err(|e| Error::Audio(format!("writing {}: {}", path.display(), e)))?;
    }
    writer
        .finalize()
        .map_err(|e| Error::Audio(format!("finalizing {}: {}", path.display(), e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::PermissiveClassifier;
    use crate::types::PhraseBounds;
    use lyricut_common::AlignMethod;
    use tempfile::TempDir;

    const RATE: u32 = 22050;

    struct FlagEverything;

    impl ContentClassifier for FlagEverything {
        fn is_sensitive(&self, _text: &str) -> bool {
            true
        }
    }

    fn bounds() -> PhraseBounds {
        PhraseBounds {
            min_duration: 0.6,
            max_duration: 4.0,
            duration_tolerance: 1.0,
        }
    }

    fn chopper() -> ClipChopper {
        ClipChopper::new(&AlignConfig::default())
    }

    /// A 10 second tone, loud everywhere.
    fn tone() -> Waveform {
        let samples: Vec<f32> = (0..10 * RATE as usize)
            .map(|i| 0.4 * (i as f32 * 0.25).sin())
            .collect();
        Waveform::new(samples, RATE).unwrap()
    }

    /// Tone for the first `loud` seconds, silence after.
    fn tone_then_silence(loud: f64) -> Waveform {
        let cutover = (loud * RATE as f64) as usize;
        let samples: Vec<f32> = (0..10 * RATE as usize)
            .map(|i| {
                if i < cutover {
                    0.4 * (i as f32 * 0.25).sin()
                } else {
                    0.0
                }
            })
            .collect();
        Waveform::new(samples, RATE).unwrap()
    }

    fn request() -> SongRequest {
        SongRequest {
            song_index: 7,
            artist: "AC/DC".to_string(),
            title: "Back in Black".to_string(),
            audio_path: "unused.mp3".into(),
        }
    }

    fn phrase(line_index: usize, start: f64, end: f64) -> Phrase {
        Phrase::new(
            line_index,
            "rolling thunder on the highway",
            start,
            end,
            0.9,
            AlignMethod::Matched,
            &bounds(),
        )
        .unwrap()
    }

    #[test]
    fn test_clip_files_are_named_and_padded() {
        let dir = TempDir::new().unwrap();
        let outcome = chopper()
            .chop(
                &request(),
                &tone(),
                &[phrase(2, 1.0, 3.0)],
                &PermissiveClassifier,
                dir.path(),
            )
            .unwrap();

        assert_eq!(outcome.clips.len(), 1);
        assert!(outcome.rejections.is_empty());
        let clip = &outcome.clips[0];
        assert_eq!(clip.file_name, "007_AC_DC_Back_in_Black_p000.wav");
        assert!((clip.start_time - 0.95).abs() < 1e-9);
        assert!((clip.end_time - 3.05).abs() < 1e-9);
        assert!((clip.duration - 2.1).abs() < 1e-9);
        assert!(!clip.flagged);
        assert!(dir.path().join(&clip.file_name).is_file());
    }

    #[test]
    fn test_written_wav_reads_back_mono_16bit() {
        let dir = TempDir::new().unwrap();
        let outcome = chopper()
            .chop(
                &request(),
                &tone(),
                &[phrase(0, 2.0, 4.0)],
                &PermissiveClassifier,
                dir.path(),
            )
            .unwrap();

        let path = dir.path().join(&outcome.clips[0].file_name);
        let reader = hound::WavReader::open(path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, RATE);
        assert_eq!(spec.bits_per_sample, 16);
        // 2.0s phrase plus 0.05s padding each side
        let expected = (2.1 * RATE as f64) as usize;
        assert!((reader.len() as i64 - expected as i64).abs() <= 1);
    }

    #[test]
    fn test_rejections_leave_gaps_in_numbering() {
        let dir = TempDir::new().unwrap();
        // Middle phrase lands in silence and is rejected
        let outcome = chopper()
            .chop(
                &request(),
                &tone_then_silence(4.0),
                &[phrase(0, 1.0, 3.0), phrase(1, 6.0, 8.0), phrase(2, 1.5, 3.5)],
                &PermissiveClassifier,
                dir.path(),
            )
            .unwrap();

        assert_eq!(outcome.clips.len(), 2);
        assert_eq!(outcome.clips[0].file_name, "007_AC_DC_Back_in_Black_p000.wav");
        assert_eq!(outcome.clips[1].file_name, "007_AC_DC_Back_in_Black_p002.wav");
        assert_eq!(outcome.rejections.len(), 1);
        assert_eq!(outcome.rejections[0].clip_index, 1);
        assert_eq!(outcome.rejections[0].line_index, 1);
        assert!(outcome.rejections[0].reason.contains("silence"));
    }

    #[test]
    fn test_duration_gate_rejects_out_of_range_phrases() {
        let dir = TempDir::new().unwrap();
        // Constructed under looser bounds so the chopper's own gate decides
        let loose = PhraseBounds {
            min_duration: 0.01,
            max_duration: 60.0,
            duration_tolerance: 1.0,
        };
        let short = Phrase::new(0, "x y z", 1.0, 1.3, 0.9, AlignMethod::Matched, &loose).unwrap();
        let long = Phrase::new(1, "x y z", 1.0, 8.0, 0.9, AlignMethod::Matched, &loose).unwrap();

        let outcome = chopper()
            .chop(
                &request(),
                &tone(),
                &[short, long],
                &PermissiveClassifier,
                dir.path(),
            )
            .unwrap();

        assert!(outcome.clips.is_empty());
        assert_eq!(outcome.rejections.len(), 2);
        assert!(outcome.rejections[0].reason.contains("duration"));
        assert!(outcome.rejections[1].reason.contains("duration"));
    }

    #[test]
    fn test_padding_clamps_at_song_edges() {
        let dir = TempDir::new().unwrap();
        let outcome = chopper()
            .chop(
                &request(),
                &tone(),
                &[phrase(0, 0.0, 2.0), phrase(1, 8.5, 10.0)],
                &PermissiveClassifier,
                dir.path(),
            )
            .unwrap();

        assert_eq!(outcome.clips.len(), 2);
        assert!((outcome.clips[0].start_time - 0.0).abs() < 1e-9);
        assert!((outcome.clips[1].end_time - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_stops_at_the_clip_cap() {
        let dir = TempDir::new().unwrap();
        let config = AlignConfig {
            max_clips_per_song: 2,
            ..AlignConfig::default()
        };
        let phrases: Vec<Phrase> = (0..5).map(|i| phrase(i, 1.0, 3.0)).collect();
        let outcome = ClipChopper::new(&config)
            .chop(
                &request(),
                &tone(),
                &phrases,
                &PermissiveClassifier,
                dir.path(),
            )
            .unwrap();

        assert_eq!(outcome.clips.len(), 2);
        // Later phrases were never attempted, so they are not rejections
        assert!(outcome.rejections.is_empty());
        assert_eq!(outcome.clips[1].file_name, "007_AC_DC_Back_in_Black_p001.wav");
    }

    #[test]
    fn test_classifier_flag_is_recorded() {
        let dir = TempDir::new().unwrap();
        let outcome = chopper()
            .chop(
                &request(),
                &tone(),
                &[phrase(0, 1.0, 3.0)],
                &FlagEverything,
                dir.path(),
            )
            .unwrap();
        assert!(outcome.clips[0].flagged);
    }
}
