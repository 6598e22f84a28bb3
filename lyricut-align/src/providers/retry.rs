//! Safety wrapper around the external transcription service.
//!
//! External speech-to-text is the one dependency the engine cannot trust:
//! it rate-limits, times out, and fails transiently. [`TranscriberClient`]
//! concentrates all of that handling in one place so the transcription
//! pipeline itself stays a straight-line map over windows.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{Quota, RateLimiter};
use lyricut_common::{Error, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tokio::time::timeout;
use tracing::warn;

use crate::providers::TranscriptionService;

/// Retry behavior for transcription calls.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts per window, counting the first.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

type DirectRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Rate limiting, timeout, retry, and sample-rate adaptation around a
/// [`TranscriptionService`].
///
/// One client is shared by every window task in the process, so the request
/// rate limit holds across songs. `transcribe_window` never fails: a window
/// the service cannot transcribe after all attempts is recorded as an empty
/// transcript, and alignment degrades to the acoustic fallback instead of
/// aborting the song.
pub struct TranscriberClient {
    service: Arc<dyn TranscriptionService>,
    limiter: DirectRateLimiter,
    policy: RetryPolicy,
    call_timeout: Duration,
}

impl TranscriberClient {
    pub fn new(
        service: Arc<dyn TranscriptionService>,
        requests_per_second: u32,
        policy: RetryPolicy,
        call_timeout: Duration,
    ) -> Self {
        let quota =
            Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
        Self {
            service,
            limiter: RateLimiter::direct(quota),
            policy,
            call_timeout,
        }
    }

    /// Name of the wrapped service, recorded in transcript cache records.
    pub fn service_name(&self) -> &str {
        self.service.name()
    }

    /// Transcribe one window of mono audio, absorbing every failure into an
    /// empty transcript. `segment_id` names the window in logs and is passed
    /// through to the service.
    pub async fn transcribe_window(
        &self,
        segment_id: &str,
        samples: &[f32],
        sample_rate: u32,
    ) -> String {
        let prepared;
        let (samples, sample_rate) = match self.service.required_sample_rate() {
            Some(target) if target != sample_rate => {
                match resample_mono(samples, sample_rate, target) {
                    Ok(resampled) => {
                        prepared = resampled;
                        (&prepared[..], target)
                    }
                    Err(e) => {
                        warn!(
                            segment_id,
                            error = %e,
                            "Resample for transcription failed, recording empty transcript"
                        );
                        return String::new();
                    }
                }
            }
            _ => (samples, sample_rate),
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            self.limiter.until_ready().await;
            let call = self.service.transcribe(segment_id, samples, sample_rate);
            match timeout(self.call_timeout, call).await {
                Ok(Ok(text)) => return text,
                Ok(Err(e)) if attempt < self.policy.max_attempts => {
                    warn!(
                        segment_id,
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        error = %e,
                        "Transcription failed, retrying"
                    );
                    tokio::time::sleep(self.policy.backoff).await;
                }
                Ok(Err(e)) => {
                    warn!(
                        segment_id,
                        attempts = attempt,
                        error = %e,
                        "Transcription failed, recording empty transcript"
                    );
                    return String::new();
                }
                Err(_) if attempt < self.policy.max_attempts => {
                    warn!(
                        segment_id,
                        attempt,
                        timeout_secs = self.call_timeout.as_secs(),
                        "Transcription timed out, retrying"
                    );
                    tokio::time::sleep(self.policy.backoff).await;
                }
                Err(_) => {
                    warn!(
                        segment_id,
                        attempts = attempt,
                        "Transcription timed out, recording empty transcript"
                    );
                    return String::new();
                }
            }
        }
    }
}

/// Resample a mono buffer in one pass with rubato's polynomial resampler.
pub fn resample_mono(input: &[f32], input_rate: u32, output_rate: u32) -> Result<Vec<f32>> {
    if input_rate == output_rate || input.is_empty() {
        return Ok(input.to_vec());
    }
    let mut resampler = FastFixedIn::<f32>::new(
        output_rate as f64 / input_rate as f64,
        1.0,
        PolynomialDegree::Septic,
        input.len(),
        1,
    )
    .map_err(|e| Error::Audio(format!("create resampler: {}", e)))?;
    let mut output = resampler.process(&[input], None).map_err(|e| {
        Error::Audio(format!(
            "resample {} Hz -> {} Hz: {}",
            input_rate, output_rate, e
        ))
    })?;
    Ok(output.remove(0))
}
