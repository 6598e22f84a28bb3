//! Acoustic fallback segmentation.
//!
//! When a song has no usable transcript, phrase boundaries are guessed from
//! the audio alone: an energy-flux onset envelope marks moments where the
//! signal suddenly gets louder, and those onsets become candidate phrase
//! starts. The candidate list is then split or merged until it holds exactly
//! the requested number of segments.
//!
//! Onsets track percussion and attack transients, not vocal phrasing, so
//! this is a coarse last resort. It is CPU-bound and runs on the blocking
//! pool.

use lyricut_common::{Error, Result};

use crate::config::AlignConfig;
use crate::types::{rms_of, Waveform};

/// One fallback segment in song time, seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start_time: f64,
    pub end_time: f64,
}

pub struct OnsetSegmenter {
    frame_size: usize,
    hop_size: usize,
    onset_threshold: f32,
    merge_gap: f64,
    min_phrase_duration: f64,
    max_phrase_duration: f64,
    duration_tolerance: f64,
}

impl OnsetSegmenter {
    pub fn new(config: &AlignConfig) -> Self {
        Self {
            frame_size: config.onset_frame_size,
            hop_size: config.onset_hop_size,
            onset_threshold: config.onset_threshold,
            merge_gap: config.onset_merge_gap,
            min_phrase_duration: config.min_phrase_duration,
            max_phrase_duration: config.max_phrase_duration,
            duration_tolerance: config.duration_tolerance,
        }
    }

    /// Divide the waveform into exactly `target` segments anchored on
    /// detected onsets. With fewer than two onsets the waveform is divided
    /// uniformly instead.
    pub fn segment(&self, waveform: &Waveform, target: usize) -> Result<Vec<Segment>> {
        if target == 0 {
            return Err(Error::InvalidInput(
                "segment target must be >= 1".to_string(),
            ));
        }

        let duration = waveform.duration();
        let onsets = self.detect_onsets(waveform);

        let mut starts: Vec<f64> = if onsets.len() < 2 {
            (0..target)
                .map(|i| i as f64 * duration / target as f64)
                .collect()
        } else {
            onsets
        };

        // Bisect the longest span at its midpoint until we have enough
        while starts.len() < target {
            let mut longest = 0;
            let mut longest_span = -1.0f64;
            for i in 0..starts.len() {
                let end = starts.get(i + 1).copied().unwrap_or(duration);
                let span = end - starts[i];
                if span > longest_span {
                    longest_span = span;
                    longest = i;
                }
            }
            let end = starts.get(longest + 1).copied().unwrap_or(duration);
            let midpoint = (starts[longest] + end) / 2.0;
            starts.insert(longest + 1, midpoint);
        }

        // Drop the start closest to its predecessor until we are down to
        // the target; the first start is never removed
        while starts.len() > target {
            let mut closest = 1;
            let mut closest_gap = f64::MAX;
            for i in 1..starts.len() {
                let gap = starts[i] - starts[i - 1];
                if gap < closest_gap {
                    closest_gap = gap;
                    closest = i;
                }
            }
            starts.remove(closest);
        }

        let cap = self.max_phrase_duration + self.duration_tolerance;
        let segments = starts
            .iter()
            .enumerate()
            .map(|(i, &start)| {
                let natural_end = starts.get(i + 1).copied().unwrap_or(duration);
                let end_time = natural_end
                    .min(start + cap)
                    .max(start + self.min_phrase_duration)
                    .min(duration);
                Segment {
                    start_time: start,
                    end_time,
                }
            })
            .collect();
        Ok(segments)
    }

    /// Onset times in seconds, sorted, with near-simultaneous detections
    /// collapsed to the earliest.
    fn detect_onsets(&self, waveform: &Waveform) -> Vec<f64> {
        let samples = waveform.samples();
        let rate = f64::from(waveform.sample_rate());
        if samples.len() < self.frame_size {
            return Vec::new();
        }

        // RMS envelope over overlapping frames
        let mut envelope = Vec::new();
        let mut offset = 0;
        while offset + self.frame_size <= samples.len() {
            envelope.push(rms_of(&samples[offset..offset + self.frame_size]));
            offset += self.hop_size;
        }
        if envelope.len() < 3 {
            return Vec::new();
        }

        // Positive energy flux, normalized so the threshold is relative to
        // the loudest attack in this recording
        let mut flux = vec![0.0f32; envelope.len()];
        for i in 1..envelope.len() {
            flux[i] = (envelope[i] - envelope[i - 1]).max(0.0);
        }
        let peak = flux.iter().fold(0.0f32, |acc, &f| acc.max(f));
        if peak <= 0.0 {
            return Vec::new();
        }
        for f in &mut flux {
            *f /= peak;
        }

        let mut onsets = Vec::new();
        for i in 1..flux.len() - 1 {
            if flux[i] > self.onset_threshold && flux[i] >= flux[i - 1] && flux[i] >= flux[i + 1] {
                // Walk back to the energy valley preceding the attack, the
                // closest thing the envelope has to the true start
                let mut frame = i;
                while frame > 0 && envelope[frame - 1] < envelope[frame] {
                    frame -= 1;
                }
                onsets.push(frame as f64 * self.hop_size as f64 / rate);
            }
        }

        onsets.sort_by(|a, b| a.total_cmp(b));
        let mut merged: Vec<f64> = Vec::with_capacity(onsets.len());
        for onset in onsets {
            match merged.last() {
                Some(&last) if onset - last < self.merge_gap => {}
                _ => merged.push(onset),
            }
        }
        merged
    }
}
