//! Time and sample-index conversion helpers
//!
//! The alignment engine reasons about boundaries in f64 seconds (the unit the
//! matching and refinement math naturally produces) and slices audio by sample
//! index at the waveform's native rate. These helpers keep the two domains
//! consistent: conversions round to the nearest sample and clamp into the
//! addressable range, so a boundary computed in seconds can never index out of
//! bounds.

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert a time in seconds to a sample index at the given rate.
///
/// Rounds to the nearest sample. Negative times map to 0.
///
/// # Panics
///
/// Panics if `sample_rate` is 0.
///
/// # Examples
///
/// ```rust
/// use lyricut_common::time::seconds_to_samples;
///
/// assert_eq!(seconds_to_samples(0.0, 44100), 0);
/// assert_eq!(seconds_to_samples(1.0, 44100), 44_100);
/// assert_eq!(seconds_to_samples(0.5, 48000), 24_000);
/// assert_eq!(seconds_to_samples(-2.0, 44100), 0);
/// ```
pub fn seconds_to_samples(seconds: f64, sample_rate: u32) -> usize {
    assert!(sample_rate > 0, "sample_rate must be > 0");
    if seconds <= 0.0 {
        return 0;
    }
    (seconds * sample_rate as f64).round() as usize
}

/// Convert a sample index to seconds at the given rate.
///
/// # Panics
///
/// Panics if `sample_rate` is 0.
///
/// # Examples
///
/// ```rust
/// use lyricut_common::time::samples_to_seconds;
///
/// assert_eq!(samples_to_seconds(44_100, 44100), 1.0);
/// assert_eq!(samples_to_seconds(0, 44100), 0.0);
/// ```
pub fn samples_to_seconds(samples: usize, sample_rate: u32) -> f64 {
    assert!(sample_rate > 0, "sample_rate must be > 0");
    samples as f64 / sample_rate as f64
}

/// Convert a `[start, end)` range in seconds to a clamped sample range.
///
/// The result is guaranteed to satisfy `start <= end <= total_samples`, so it
/// can be used directly to slice a sample buffer. An inverted or fully
/// out-of-range input collapses to an empty range rather than erroring;
/// callers that care about empty slices check the result.
///
/// # Examples
///
/// ```rust
/// use lyricut_common::time::sample_range;
///
/// // 1.0..2.0 seconds of a 3-second buffer at 10 Hz
/// assert_eq!(sample_range(1.0, 2.0, 10, 30), (10, 20));
/// // End clamped to the buffer
/// assert_eq!(sample_range(2.0, 9.0, 10, 30), (20, 30));
/// // Inverted range collapses
/// assert_eq!(sample_range(2.0, 1.0, 10, 30), (20, 20));
/// ```
pub fn sample_range(
    start_seconds: f64,
    end_seconds: f64,
    sample_rate: u32,
    total_samples: usize,
) -> (usize, usize) {
    let start = seconds_to_samples(start_seconds, sample_rate).min(total_samples);
    let end = seconds_to_samples(end_seconds, sample_rate).min(total_samples);
    (start, end.max(start))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // Should be a reasonable timestamp (after year 2000)
        assert!(timestamp.timestamp() > 946_684_800);
    }

    #[test]
    fn test_seconds_to_samples_rounds() {
        // 0.01s at 44.1kHz is 441 samples exactly
        assert_eq!(seconds_to_samples(0.01, 44100), 441);
        // Just under half a sample rounds down
        assert_eq!(seconds_to_samples(0.4 / 44100.0, 44100), 0);
        // Just over half a sample rounds up
        assert_eq!(seconds_to_samples(0.6 / 44100.0, 44100), 1);
    }

    #[test]
    fn test_roundtrip_at_common_rates() {
        for rate in [8000u32, 22050, 44100, 48000] {
            let samples = seconds_to_samples(2.5, rate);
            let seconds = samples_to_seconds(samples, rate);
            assert!((seconds - 2.5).abs() < 1.0 / rate as f64);
        }
    }

    #[test]
    fn test_sample_range_clamps_both_ends() {
        assert_eq!(sample_range(-1.0, 0.5, 10, 100), (0, 5));
        assert_eq!(sample_range(5.0, 50.0, 10, 100), (50, 100));
        assert_eq!(sample_range(50.0, 60.0, 10, 100), (100, 100));
    }

    #[test]
    fn test_sample_range_never_inverted() {
        let (start, end) = sample_range(3.0, 1.0, 10, 100);
        assert!(start <= end);
    }
}
