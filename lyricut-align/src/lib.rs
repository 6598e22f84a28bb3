//! # Lyricut Alignment Engine
//!
//! Aligns lyric lines to song audio and cuts short per-phrase WAV clips.
//! The pipeline per song: windowed transcription (cached per recording),
//! fuzzy line matching, in-window timestamp refinement, acoustic onset
//! fallback for lines no transcript could place, then clip extraction.
//!
//! External capabilities (audio decoding, lyric lookup, transcription,
//! ranking, content classification) enter through the traits in
//! [`providers`]; the binary wires file-based defaults.

pub mod cache;
pub mod config;
pub mod discovery;
pub mod providers;
pub mod services;
pub mod types;
pub mod utils;
pub mod workflow;

pub use config::{AlignConfig, CachePolicy, ConfigOverrides, TomlConfig};
pub use types::{Clip, LyricLine, LyricSheet, Phrase, SongId, SongRequest, Waveform};
pub use workflow::{BatchOrchestrator, BatchSummary, SongProcessor};
