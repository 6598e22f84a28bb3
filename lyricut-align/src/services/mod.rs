//! Alignment pipeline services.
//!
//! Each service owns one stage: windowed transcription, fuzzy line matching,
//! timestamp refinement, acoustic fallback segmentation, phrase selection,
//! and clip extraction. Services are built once from [`AlignConfig`] and
//! shared across song workers.
//!
//! [`AlignConfig`]: crate::config::AlignConfig

pub mod clip_chopper;
pub mod line_matcher;
pub mod onset_segmenter;
pub mod phrase_selector;
pub mod refiner;
pub mod transcriber;

pub use clip_chopper::{ChopOutcome, ClipChopper, ClipRejection};
pub use line_matcher::LineMatcher;
pub use onset_segmenter::{OnsetSegmenter, Segment};
pub use phrase_selector::PhraseSelector;
pub use refiner::TimestampRefiner;
pub use transcriber::{plan_windows, TranscribeOutcome, WindowedTranscriber};
