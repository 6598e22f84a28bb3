//! Audio library discovery.
//!
//! Walks the audio directory for supported files and turns them into song
//! requests. `{Artist} - {Title}.ext` stems split into artist and title;
//! anything else gets an "Unknown" artist. Files sort by (artist, title,
//! path) so batch indices are stable across runs of the same library.

use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use lyricut_common::{Error, Result};

use crate::types::SongRequest;

/// File extensions handed to the audio decoder.
pub const AUDIO_EXTENSIONS: [&str; 6] = ["mp3", "flac", "wav", "ogg", "m4a", "aac"];

/// Scan `audio_dir` recursively for audio files, keeping at most
/// `max_songs` after sorting.
pub fn discover_songs(audio_dir: &Path, max_songs: Option<usize>) -> Result<Vec<SongRequest>> {
    let mut found: Vec<(String, String, PathBuf)> = Vec::new();
    for entry in WalkDir::new(audio_dir).follow_links(true) {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if !AUDIO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let (artist, title) = split_stem(stem);
        debug!(path = %path.display(), artist, title, "found audio file");
        found.push((artist, title, path.to_path_buf()));
    }

    found.sort();
    if let Some(max) = max_songs {
        found.truncate(max);
    }
    Ok(found
        .into_iter()
        .enumerate()
        .map(|(song_index, (artist, title, audio_path))| SongRequest {
            song_index,
            artist,
            title,
            audio_path,
        })
        .collect())
}

fn split_stem(stem: &str) -> (String, String) {
    match stem.split_once(" - ") {
        Some((artist, title)) => (artist.trim().to_string(), title.trim().to_string()),
        None => ("Unknown".to_string(), stem.trim().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"").unwrap();
    }

    #[test]
    fn test_discovers_sorted_and_indexed() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "Queen - Bohemian Rhapsody.mp3");
        touch(dir.path(), "AC-DC - Thunderstruck.flac");
        touch(dir.path(), "notes.txt");
        touch(dir.path(), "cover.jpg");

        let songs = discover_songs(dir.path(), None).unwrap();
        assert_eq!(songs.len(), 2);
        assert_eq!(songs[0].artist, "AC-DC");
        assert_eq!(songs[0].title, "Thunderstruck");
        assert_eq!(songs[0].song_index, 0);
        assert_eq!(songs[1].artist, "Queen");
        assert_eq!(songs[1].song_index, 1);
    }

    #[test]
    fn test_stem_without_separator_gets_unknown_artist() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "freestyle.wav");

        let songs = discover_songs(dir.path(), None).unwrap();
        assert_eq!(songs[0].artist, "Unknown");
        assert_eq!(songs[0].title, "freestyle");
    }

    #[test]
    fn test_walks_subdirectories() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("album")).unwrap();
        touch(&dir.path().join("album"), "Artist - Deep Cut.OGG");

        let songs = discover_songs(dir.path(), None).unwrap();
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].title, "Deep Cut");
    }

    #[test]
    fn test_max_songs_truncates_after_sorting() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "Zebra - Last.mp3");
        touch(dir.path(), "Alpha - First.mp3");

        let songs = discover_songs(dir.path(), Some(1)).unwrap();
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].artist, "Alpha");
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        assert!(discover_songs(Path::new("/nonexistent/audio"), None).is_err());
    }
}
