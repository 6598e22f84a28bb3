//! Orchestration: per-song pipeline and the batch runner around it.

pub mod batch;
pub mod song_processor;

pub use batch::{BatchOrchestrator, BatchSummary, SongOutcome};
pub use song_processor::{SongProcessor, SongReport};
