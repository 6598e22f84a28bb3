//! Batch runner: bounded per-song concurrency and the output manifests.
//!
//! Songs run under a worker pool; one song failing (bad file, missing
//! lyrics) is recorded in the summary and never aborts the rest. After the
//! pool drains, clip metadata and the run summary are written under the
//! output root:
//!
//! ```text
//! output/
//!   clips/*.wav      written by the chopper as songs complete
//!   metadata.json    every clip record, atomically replaced
//!   clips.txt        one relative clip path per line
//!   summary.json     run id, timings, per-song outcomes
//! ```

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};
use uuid::Uuid;

use lyricut_common::{AlignEvent, Error, EventSender, Result, SongStats};

use crate::cache::write_json_atomic;
use crate::types::{Clip, SongRequest};
use crate::workflow::SongProcessor;

/// Per-song line in the run summary.
#[derive(Debug, Clone, Serialize)]
pub struct SongOutcome {
    pub song_id: String,
    pub song_index: usize,
    pub artist: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<SongStats>,
    pub from_cache: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Everything a batch run produced, also serialized to `summary.json`.
#[derive(Debug, Serialize)]
pub struct BatchSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub songs_processed: usize,
    pub songs_failed: usize,
    pub totals: SongStats,
    pub songs: Vec<SongOutcome>,
}

pub struct BatchOrchestrator {
    processor: Arc<SongProcessor>,
    song_workers: usize,
    output_dir: PathBuf,
    dry_run: bool,
    events: EventSender,
}

impl BatchOrchestrator {
    pub fn new(
        processor: Arc<SongProcessor>,
        song_workers: usize,
        output_dir: PathBuf,
        dry_run: bool,
        events: EventSender,
    ) -> Self {
        Self {
            processor,
            song_workers,
            output_dir,
            dry_run,
            events,
        }
    }

    pub async fn run(&self, requests: Vec<SongRequest>) -> Result<BatchSummary> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let total_songs = requests.len();
        self.events.send(AlignEvent::BatchStarted {
            run_id,
            total_songs,
            timestamp: started_at,
        });
        info!(%run_id, total_songs, dry_run = self.dry_run, "batch started");

        let pool = Arc::new(Semaphore::new(self.song_workers));
        let mut tasks = JoinSet::new();
        for request in requests {
            let permit = pool
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| Error::Internal(format!("song pool closed: {e}")))?;
            let processor = Arc::clone(&self.processor);
            let events = self.events.clone();
            tasks.spawn(async move {
                let _permit = permit;
                events.send(AlignEvent::SongStarted {
                    song_id: request.song_id().to_string(),
                    song_index: request.song_index,
                    total_songs,
                    timestamp: Utc::now(),
                });
                let result = processor.process(&request).await;
                (request, result)
            });
        }

        let mut outcomes: Vec<SongOutcome> = Vec::with_capacity(total_songs);
        let mut clips: Vec<Clip> = Vec::new();
        let mut totals = SongStats::default();
        let mut songs_failed = 0;

        while let Some(joined) = tasks.join_next().await {
            let (request, result) =
                joined.map_err(|e| Error::Internal(format!("song task failed: {e}")))?;
            let song_id = request.song_id().to_string();
            match result {
                Ok(report) => {
                    totals.merge(&report.stats);
                    self.events.send(AlignEvent::SongCompleted {
                        song_id: song_id.clone(),
                        stats: report.stats,
                        from_cache: report.from_cache,
                        timestamp: Utc::now(),
                    });
                    outcomes.push(SongOutcome {
                        song_id,
                        song_index: request.song_index,
                        artist: request.artist,
                        title: request.title,
                        stats: Some(report.stats),
                        from_cache: report.from_cache,
                        error: None,
                    });
                    clips.extend(report.clips);
                }
                Err(e) => {
                    songs_failed += 1;
                    if e.is_not_found() {
                        // A missing lyric sheet is an expected gap in the
                        // library, not a fault worth a warning
                        info!(song = %song_id, error = %e, "song skipped");
                    } else {
                        warn!(song = %song_id, error = %e, "song failed, continuing batch");
                    }
                    self.events.send(AlignEvent::SongFailed {
                        song_id: song_id.clone(),
                        error: e.to_string(),
                        timestamp: Utc::now(),
                    });
                    outcomes.push(SongOutcome {
                        song_id,
                        song_index: request.song_index,
                        artist: request.artist,
                        title: request.title,
                        stats: None,
                        from_cache: false,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        // Completion order is concurrency order; the manifests follow the
        // batch order instead
        outcomes.sort_by_key(|outcome| outcome.song_index);
        clips.sort_by(|a, b| (a.song_index, a.clip_index).cmp(&(b.song_index, b.clip_index)));

        let finished_at = Utc::now();
        let summary = BatchSummary {
            run_id,
            started_at,
            finished_at,
            songs_processed: outcomes.len() - songs_failed,
            songs_failed,
            totals,
            songs: outcomes,
        };

        if !self.dry_run {
            self.write_manifests(&clips, &summary)?;
        }

        self.events.send(AlignEvent::BatchCompleted {
            run_id,
            songs_processed: summary.songs_processed,
            songs_failed,
            clips_written: totals.clips_written,
            timestamp: finished_at,
        });
        info!(
            %run_id,
            songs = summary.songs_processed,
            failed = songs_failed,
            clips = totals.clips_written,
            "batch completed"
        );
        Ok(summary)
    }

    fn write_manifests(&self, clips: &[Clip], summary: &BatchSummary) -> Result<()> {
        write_json_atomic(&self.output_dir.join("metadata.json"), &clips)?;
        write_json_atomic(&self.output_dir.join("summary.json"), summary)?;

        let listing: String = clips
            .iter()
            .map(|clip| format!("clips/{}\n", clip.file_name))
            .collect();
        let path = self.output_dir.join("clips.txt");
        fs::write(&path, listing).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("writing {}: {}", path.display(), e),
            ))
        })?;
        Ok(())
    }
}
