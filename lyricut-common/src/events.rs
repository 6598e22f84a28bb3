//! Progress event types for the alignment engine
//!
//! Events are emitted over an optional mpsc channel while a batch runs, so a
//! consumer (the CLI, a test harness, a future service front-end) can observe
//! per-song and per-clip progress without coupling to the engine internals.
//! All variants serialize with a `type` tag for log shipping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

/// How a lyric line's timing was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignMethod {
    /// Fresh fuzzy match against the windowed transcript, refined in-window.
    Matched,
    /// A prior cached phrase was retained (unmatched line, or the prior had
    /// higher confidence than the new match).
    KeptPrevious,
    /// Acoustic onset segmentation placed the line without a transcript.
    Fallback,
}

impl std::fmt::Display for AlignMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlignMethod::Matched => write!(f, "matched"),
            AlignMethod::KeptPrevious => write!(f, "kept_previous"),
            AlignMethod::Fallback => write!(f, "fallback"),
        }
    }
}

/// Per-song alignment and chopping counters.
///
/// `matched` counts lines placed by a fresh accepted match; `unmatched` counts
/// lines the matcher rejected (score below the acceptance threshold), each of
/// which was then resolved as `kept_previous` or `fallback`. A line whose new
/// match lost to a higher-confidence prior counts under `kept_previous` only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongStats {
    pub matched: usize,
    pub unmatched: usize,
    pub kept_previous: usize,
    pub fallback: usize,
    pub clips_written: usize,
    pub clips_rejected: usize,
}

impl SongStats {
    /// Fold another song's counters into this aggregate.
    pub fn merge(&mut self, other: &SongStats) {
        self.matched += other.matched;
        self.unmatched += other.unmatched;
        self.kept_previous += other.kept_previous;
        self.fallback += other.fallback;
        self.clips_written += other.clips_written;
        self.clips_rejected += other.clips_rejected;
    }
}

/// Alignment engine progress events.
///
/// Emitted best-effort: a closed or full channel never stalls processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AlignEvent {
    /// Batch run started
    BatchStarted {
        /// Run identity, also recorded in the summary artifact
        run_id: Uuid,
        /// Number of songs queued
        total_songs: usize,
        /// When the batch started
        timestamp: DateTime<Utc>,
    },

    /// Song processing started
    SongStarted {
        /// Sanitized stable song identity
        song_id: String,
        /// Song position in the batch (0-based)
        song_index: usize,
        /// Total songs in the batch
        total_songs: usize,
        /// When processing started
        timestamp: DateTime<Utc>,
    },

    /// Windowed transcript obtained (transcribed or served from cache)
    TranscriptReady {
        song_id: String,
        /// Number of windows covering the recording
        windows: usize,
        /// True when the per-recording cache satisfied the request
        cached: bool,
    },

    /// One lyric line's timing resolved
    LineAligned {
        song_id: String,
        /// Original lyric line index
        line_index: usize,
        /// Match confidence in [0,1]; 0.0 on the fallback paths
        confidence: f64,
        /// How the timing was resolved
        method: AlignMethod,
    },

    /// The acoustic fallback segmenter was engaged for this song
    FallbackEngaged {
        song_id: String,
        /// Number of lines placed acoustically
        lines: usize,
    },

    /// Clip artifact written
    ClipWritten {
        song_id: String,
        /// Phrase position the clip was cut from
        clip_index: usize,
        /// Output file name (relative to the clips directory)
        file_name: String,
    },

    /// Phrase rejected by the chopper (silently dropped, not fatal)
    ClipRejected {
        song_id: String,
        /// Original lyric line index
        line_index: usize,
        /// Human-readable rejection reason (duration / energy gate)
        reason: String,
    },

    /// Song processing completed
    SongCompleted {
        song_id: String,
        stats: SongStats,
        /// True when a valid phrase cache allowed skipping alignment entirely
        from_cache: bool,
        /// When processing completed
        timestamp: DateTime<Utc>,
    },

    /// Song processing failed (song skipped, batch continues)
    SongFailed {
        song_id: String,
        /// Error rendered for the summary
        error: String,
        /// When the failure surfaced
        timestamp: DateTime<Utc>,
    },

    /// Batch run completed
    BatchCompleted {
        run_id: Uuid,
        songs_processed: usize,
        songs_failed: usize,
        clips_written: usize,
        /// When the batch completed
        timestamp: DateTime<Utc>,
    },
}

/// Best-effort progress event emitter. Sending never blocks and never
/// fails: with no consumer attached, or a consumer that hung up, events are
/// simply dropped.
#[derive(Clone)]
pub struct EventSender(Option<mpsc::UnboundedSender<AlignEvent>>);

impl EventSender {
    pub fn disabled() -> Self {
        Self(None)
    }

    pub fn send(&self, event: AlignEvent) {
        if let Some(tx) = &self.0 {
            let _ = tx.send(event);
        }
    }
}

/// An event channel plus the sender half wrapped for the engine.
pub fn event_channel() -> (EventSender, mpsc::UnboundedReceiver<AlignEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender(Some(tx)), rx)
}
