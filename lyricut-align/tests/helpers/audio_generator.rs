//! Audio fixture generator
//!
//! Builds WAV files and in-memory sample buffers shaped like songs: a tone
//! standing in for vocals, optionally broken into bursts separated by
//! silence so onset detection has energy edges to find.

use std::path::{Path, PathBuf};

/// Shape of a generated fixture.
#[derive(Debug, Clone)]
pub struct AudioConfig {
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    /// Silence before the first burst.
    pub lead_in_seconds: f64,
    /// Length of each tone burst. `None` keeps the tone on for the whole
    /// file (no detectable onsets past the start).
    pub burst_seconds: Option<f64>,
    /// Silence between bursts.
    pub gap_seconds: f64,
    pub amplitude: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            duration_seconds: 16.0,
            sample_rate: 22050,
            channels: 1,
            lead_in_seconds: 0.25,
            burst_seconds: Some(1.5),
            gap_seconds: 1.0,
            amplitude: 0.3,
        }
    }
}

/// Mono samples for the configured shape. Each burst restarts the tone
/// phase so every burst opens with a sharp energy rise.
pub fn generate_samples(config: &AudioConfig) -> Vec<f32> {
    let rate = config.sample_rate as f64;
    let total = (config.duration_seconds * rate) as usize;
    let mut samples = vec![0.0f32; total];

    let Some(burst) = config.burst_seconds else {
        for (i, sample) in samples.iter_mut().enumerate() {
            *sample = config.amplitude * (i as f32 * 0.3).sin();
        }
        return samples;
    };

    let cycle = burst + config.gap_seconds;
    let mut start = config.lead_in_seconds;
    while start < config.duration_seconds {
        let from = ((start * rate) as usize).min(total);
        let to = (((start + burst) * rate) as usize).min(total);
        for (i, sample) in samples[from..to].iter_mut().enumerate() {
            *sample = config.amplitude * (i as f32 * 0.3).sin();
        }
        if cycle <= 0.0 {
            break;
        }
        start += cycle;
    }
    samples
}

/// Write the configured shape as a 16-bit WAV file.
pub fn generate_song_wav(path: &Path, config: &AudioConfig) -> anyhow::Result<PathBuf> {
    let spec = hound::WavSpec {
        channels: config.channels,
        sample_rate: config.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    for sample in generate_samples(config) {
        let value = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
        for _ in 0..config.channels {
            writer.write_sample(value)?;
        }
    }
    writer.finalize()?;
    Ok(path.to_path_buf())
}

/// Generate one `{Artist} - {Title}.wav` per pair under `dir`.
pub fn generate_song_library(
    dir: &Path,
    songs: &[(&str, &str)],
    config: &AudioConfig,
) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for (artist, title) in songs {
        let path = dir.join(format!("{artist} - {title}.wav"));
        generate_song_wav(&path, config)?;
        files.push(path);
    }
    Ok(files)
}

/// Write a `{Artist} - {Title}.txt` lyric sheet, one line per entry.
pub fn write_lyric_sheet(
    dir: &Path,
    artist: &str,
    title: &str,
    lines: &[&str],
) -> anyhow::Result<PathBuf> {
    let path = dir.join(format!("{artist} - {title}.txt"));
    std::fs::write(&path, format!("{}\n", lines.join("\n")))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_generated_wav_reads_back_with_expected_length() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fixture.wav");
        let config = AudioConfig {
            duration_seconds: 2.0,
            ..Default::default()
        };

        generate_song_wav(&path, &config).unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, config.sample_rate);
        assert_eq!(reader.len(), (2.0 * config.sample_rate as f64) as u32);
    }

    #[test]
    fn test_gaps_between_bursts_are_silent() {
        let config = AudioConfig {
            duration_seconds: 4.0,
            lead_in_seconds: 0.0,
            burst_seconds: Some(1.0),
            gap_seconds: 1.0,
            ..Default::default()
        };
        let samples = generate_samples(&config);

        // Middle of the first gap: 1.5s in
        let gap_sample = samples[(1.5 * config.sample_rate as f64) as usize];
        assert_eq!(gap_sample, 0.0);

        // Middle of the first burst carries energy
        let burst: &[f32] = &samples[..config.sample_rate as usize];
        assert!(burst.iter().any(|s| s.abs() > 0.1));
    }
}
