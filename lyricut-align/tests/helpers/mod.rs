//! Test helper utilities
//!
//! Shared fixtures for the integration tests: generated audio, lyric
//! sheets, a temp directory layout, and scripted transcription services.

pub mod audio_generator;
pub mod fakes;

// Re-export commonly used items
pub use audio_generator::{
    generate_samples, generate_song_library, generate_song_wav, write_lyric_sheet, AudioConfig,
};
pub use fakes::{test_client, window_index, KeywordClassifier, ScriptedTranscriber};

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use lyricut_align::cache::JsonFileCache;
use lyricut_align::config::AlignConfig;
use lyricut_align::providers::{
    ContentClassifier, FileAudioSource, FileLyricsProvider, TranscriptionService,
};
use lyricut_align::workflow::SongProcessor;
use lyricut_common::EventSender;

/// The directory layout one engine run works against, rooted in a temp dir
/// that is removed when the value drops.
pub struct TestDirs {
    root: TempDir,
}

impl TestDirs {
    pub fn new() -> anyhow::Result<Self> {
        let root = TempDir::new()?;
        for sub in ["audio", "lyrics", "cache", "output"] {
            std::fs::create_dir_all(root.path().join(sub))?;
        }
        Ok(Self { root })
    }

    pub fn audio(&self) -> PathBuf {
        self.root.path().join("audio")
    }

    pub fn lyrics(&self) -> PathBuf {
        self.root.path().join("lyrics")
    }

    pub fn cache(&self) -> PathBuf {
        self.root.path().join("cache")
    }

    pub fn output(&self) -> PathBuf {
        self.root.path().join("output")
    }

    pub fn clips(&self) -> PathBuf {
        self.output().join("clips")
    }
}

/// A song processor wired to file providers and file caches under `dirs`,
/// with the given transcription service behind a permissive test client.
pub fn build_processor(
    config: &AlignConfig,
    dirs: &TestDirs,
    service: Arc<dyn TranscriptionService>,
    classifier: Arc<dyn ContentClassifier>,
    events: EventSender,
) -> anyhow::Result<SongProcessor> {
    Ok(SongProcessor::new(
        config,
        Arc::new(FileAudioSource),
        Arc::new(FileLyricsProvider::new(dirs.lyrics())),
        fakes::test_client(service),
        Arc::new(JsonFileCache::new(dirs.cache().join("transcripts"))?),
        Arc::new(JsonFileCache::new(dirs.cache().join("phrases"))?),
        None,
        classifier,
        dirs.clips(),
        events,
    ))
}
