//! Windowed transcription with a per-recording cache.
//!
//! The song is covered by overlapping fixed-length windows so a phrase cut
//! in half by one window boundary lands whole in a neighbor. Windows are
//! transcribed concurrently under a bounded worker pool; results land in
//! index-addressed slots so completion order never reorders the transcript.
//!
//! The transcript cache is the sole idempotence mechanism: a record keyed by
//! the audio fingerprint, transcriber name, and windowing parameters is
//! reused wholesale, and anything else is re-transcribed from scratch.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use lyricut_common::{Error, Result};

use crate::cache::Cache;
use crate::config::AlignConfig;
use crate::providers::TranscriberClient;
use crate::types::{SongId, TranscribedWindow, TranscriptCacheRecord, Waveform, CACHE_VERSION};

/// Window plan for a song: `(start, end)` pairs in seconds covering
/// `[0, duration)`, stepped by `window_step`, the last one truncated at the
/// song end.
pub fn plan_windows(duration: f64, window_duration: f64, window_step: f64) -> Vec<(f64, f64)> {
    let mut plan = Vec::new();
    let mut start = 0.0;
    while start < duration {
        plan.push((start, (start + window_duration).min(duration)));
        start += window_step;
    }
    plan
}

/// The transcript for one song, plus where it came from.
#[derive(Debug, Clone)]
pub struct TranscribeOutcome {
    pub windows: Vec<TranscribedWindow>,
    pub from_cache: bool,
}

pub struct WindowedTranscriber {
    client: Arc<TranscriberClient>,
    cache: Arc<dyn Cache<TranscriptCacheRecord>>,
    window_duration: f64,
    window_step: f64,
    window_workers: usize,
}

impl WindowedTranscriber {
    pub fn new(
        config: &AlignConfig,
        client: Arc<TranscriberClient>,
        cache: Arc<dyn Cache<TranscriptCacheRecord>>,
    ) -> Self {
        Self {
            client,
            cache,
            window_duration: config.window_duration,
            window_step: config.window_step,
            window_workers: config.window_workers,
        }
    }

    /// Transcribe every window of the song, or reuse the cached transcript
    /// when fingerprint, service, and windowing all still match.
    ///
    /// Window-level failures produce empty window text and never fail the
    /// song; only task panics and cache read errors surface as `Err`.
    pub async fn transcribe_song(
        &self,
        song_id: &SongId,
        waveform: &Arc<Waveform>,
        fingerprint: &str,
    ) -> Result<TranscribeOutcome> {
        if let Some(record) = self.cache.get(song_id)? {
            if record.matches(
                fingerprint,
                self.client.service_name(),
                self.window_duration,
                self.window_step,
            ) {
                debug!(song = %song_id, windows = record.windows.len(), "transcript cache hit");
                return Ok(TranscribeOutcome {
                    windows: record.windows,
                    from_cache: true,
                });
            }
            debug!(song = %song_id, "transcript cache is stale, re-transcribing");
        }

        let plan = plan_windows(waveform.duration(), self.window_duration, self.window_step);
        let mut slots: Vec<Option<TranscribedWindow>> = vec![None; plan.len()];

        let pool = Arc::new(Semaphore::new(self.window_workers));
        let mut tasks = JoinSet::new();
        for (index, &(start, end)) in plan.iter().enumerate() {
            let permit = pool
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| Error::Internal(format!("window pool closed: {e}")))?;
            let client = Arc::clone(&self.client);
            let waveform = Arc::clone(waveform);
            let segment_id = format!("{}_w{:03}", song_id, index);
            tasks.spawn(async move {
                let _permit = permit;
                let samples = waveform.segment(start, end);
                let text = client
                    .transcribe_window(&segment_id, samples, waveform.sample_rate())
                    .await;
                (index, start, end, text)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let (index, start_time, end_time, text) =
                joined.map_err(|e| Error::Internal(format!("transcription task failed: {e}")))?;
            slots[index] = Some(TranscribedWindow {
                index,
                start_time,
                end_time,
                text,
            });
        }

        // One task per slot, each joined exactly once, so every slot is full
        let windows: Vec<TranscribedWindow> = slots.into_iter().flatten().collect();

        let record = TranscriptCacheRecord {
            version: CACHE_VERSION,
            fingerprint: fingerprint.to_string(),
            transcriber: self.client.service_name().to_string(),
            window_duration: self.window_duration,
            window_step: self.window_step,
            windows: windows.clone(),
            created_at: Utc::now(),
        };
        if let Err(e) = self.cache.put(song_id, &record) {
            warn!(song = %song_id, error = %e, "failed to store transcript cache record");
        }

        Ok(TranscribeOutcome {
            windows,
            from_cache: false,
        })
    }

    /// Drop the cached transcript so the next run starts fresh.
    pub fn invalidate(&self, song_id: &SongId) -> Result<()> {
        self.cache.invalidate(song_id)
    }
}
