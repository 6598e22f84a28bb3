//! Lyric sheets from a local directory.

use std::io::ErrorKind;
use std::path::PathBuf;

use lyricut_common::{Error, Result};
use tracing::debug;

use crate::providers::LyricsProvider;
use crate::types::{LyricSheet, SongRequest};

/// Reads `{Artist} - {Title}.txt` files from a directory.
pub struct FileLyricsProvider {
    lyrics_dir: PathBuf,
}

impl FileLyricsProvider {
    pub fn new(lyrics_dir: impl Into<PathBuf>) -> Self {
        Self {
            lyrics_dir: lyrics_dir.into(),
        }
    }

    fn sheet_path(&self, request: &SongRequest) -> PathBuf {
        self.lyrics_dir
            .join(format!("{} - {}.txt", request.artist, request.title))
    }
}

impl LyricsProvider for FileLyricsProvider {
    fn lyrics(&self, request: &SongRequest) -> Result<Option<LyricSheet>> {
        let path = self.sheet_path(request);
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(Some(LyricSheet::from_text(
                &text,
                path.display().to_string(),
            ))),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "No lyric sheet found");
                Ok(None)
            }
            Err(e) => Err(Error::Io(std::io::Error::new(
                e.kind(),
                format!("read lyric sheet {}: {}", path.display(), e),
            ))),
        }
    }
}
