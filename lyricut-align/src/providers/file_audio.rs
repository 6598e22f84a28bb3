//! Audio decoding via symphonia.
//!
//! Decodes any format symphonia recognizes (MP3, FLAC, AAC, WAV, OGG, ...)
//! to mono f32 at the file's native sample rate. Multi-channel audio is
//! downmixed by averaging channels per frame.

use std::path::Path;

use lyricut_common::{Error, Result};
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::conv::FromSample;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;
use tracing::debug;

use crate::providers::AudioSource;
use crate::types::Waveform;

/// Decodes local audio files with symphonia.
#[derive(Debug, Default)]
pub struct FileAudioSource;

impl AudioSource for FileAudioSource {
    fn load(&self, path: &Path) -> Result<Waveform> {
        decode_to_mono(path)
    }
}

/// Decode a file to a mono waveform at its native rate.
pub fn decode_to_mono(path: &Path) -> Result<Waveform> {
    let file = std::fs::File::open(path).map_err(|e| {
        Error::Audio(format!("open audio file {}: {}", path.display(), e))
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| Error::Audio(format!("probe {}: {}", path.display(), e)))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| Error::Audio(format!("no audio track in {}", path.display())))?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| Error::Audio(format!("unknown sample rate in {}", path.display())))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| Error::Audio(format!("create decoder for {}: {}", path.display(), e)))?;

    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                // End of stream
                break;
            }
            Err(e) => {
                return Err(Error::Audio(format!(
                    "read packet from {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder
            .decode(&packet)
            .map_err(|e| Error::Audio(format!("decode packet in {}: {}", path.display(), e)))?;
        mixdown_into(&decoded, &mut samples);
    }

    if samples.is_empty() {
        return Err(Error::Audio(format!(
            "no audio samples decoded from {}",
            path.display()
        )));
    }

    let waveform = Waveform::new(samples, sample_rate)?;
    debug!(
        path = %path.display(),
        sample_rate,
        duration_seconds = format!("{:.2}", waveform.duration()),
        "Decoded audio file"
    );
    Ok(waveform)
}

/// Downmix one decoded buffer to mono f32 and append it to `out`.
fn mixdown_into(decoded: &AudioBufferRef, out: &mut Vec<f32>) {
    match decoded {
        AudioBufferRef::U8(buf) => mixdown(buf, out),
        AudioBufferRef::U16(buf) => mixdown(buf, out),
        AudioBufferRef::U24(buf) => mixdown(buf, out),
        AudioBufferRef::U32(buf) => mixdown(buf, out),
        AudioBufferRef::S8(buf) => mixdown(buf, out),
        AudioBufferRef::S16(buf) => mixdown(buf, out),
        AudioBufferRef::S24(buf) => mixdown(buf, out),
        AudioBufferRef::S32(buf) => mixdown(buf, out),
        AudioBufferRef::F32(buf) => mixdown(buf, out),
        AudioBufferRef::F64(buf) => mixdown(buf, out),
    }
}

fn mixdown<S>(buf: &AudioBuffer<S>, out: &mut Vec<f32>)
where
    S: Sample,
    f32: FromSample<S>,
{
    let channels = buf.spec().channels.count();
    let frames = buf.frames();
    if channels == 0 || frames == 0 {
        return;
    }
    out.reserve(frames);
    if channels == 1 {
        out.extend(buf.chan(0).iter().map(|s| f32::from_sample(*s)));
        return;
    }
    for frame in 0..frames {
        let mut sum = 0.0f32;
        for ch in 0..channels {
            sum += f32::from_sample(buf.chan(ch)[frame]);
        }
        out.push(sum / channels as f32);
    }
}
