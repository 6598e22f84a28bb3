//! # Lyricut Common Library
//!
//! Shared code for the lyricut workspace including:
//! - Error type and result alias
//! - Progress event types (AlignEvent enum)
//! - Configuration loading helpers
//! - Time / sample-index conversion utilities

pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
pub use events::{event_channel, AlignEvent, AlignMethod, EventSender, SongStats};
