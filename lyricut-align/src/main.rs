//! lyricut-align - lyric-to-audio alignment and clip extraction
//!
//! Scans an audio directory for `{Artist} - {Title}.ext` files, aligns each
//! song against its lyric sheet, and writes short per-phrase WAV clips plus
//! manifests under the output directory. Without an external transcription
//! service configured, every song is placed by the acoustic fallback.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lyricut_align::cache::JsonFileCache;
use lyricut_align::config::{CachePolicy, ConfigOverrides, TomlConfig};
use lyricut_align::discovery::discover_songs;
use lyricut_align::providers::{
    FileAudioSource, FileLyricsProvider, PermissiveClassifier, RetryPolicy, TranscriberClient,
    UnavailableTranscriber,
};
use lyricut_align::workflow::{BatchOrchestrator, SongProcessor};
use lyricut_common::config::env_override;
use lyricut_common::event_channel;

/// Command-line arguments for lyricut-align
#[derive(Parser, Debug)]
#[command(name = "lyricut-align")]
#[command(about = "Align lyric lines to audio and cut per-phrase clips")]
#[command(version)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "LYRICUT_CONFIG")]
    config: Option<PathBuf>,

    /// Directory scanned for audio files
    #[arg(long, env = "LYRICUT_AUDIO_DIR")]
    audio_dir: Option<PathBuf>,

    /// Directory holding "{Artist} - {Title}.txt" lyric sheets
    #[arg(long, env = "LYRICUT_LYRICS_DIR")]
    lyrics_dir: Option<PathBuf>,

    /// Directory for transcript and phrase caches
    #[arg(long, env = "LYRICUT_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Directory clips and manifests are written under
    #[arg(long, env = "LYRICUT_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Concurrent songs in flight
    #[arg(long)]
    song_workers: Option<usize>,

    /// Concurrent transcription windows per song (1-8)
    #[arg(long)]
    window_workers: Option<usize>,

    /// Maximum clips per song
    #[arg(long)]
    max_clips: Option<usize>,

    /// Minimum match confidence in (0, 1]
    #[arg(long)]
    min_confidence: Option<f32>,

    /// Ignore both caches and recompute everything
    #[arg(long, conflicts_with = "realign")]
    force: bool,

    /// Re-run alignment, keeping cached phrases where they are more
    /// confident than the new match
    #[arg(long)]
    realign: bool,

    /// Align and report without writing clips or manifests
    #[arg(long)]
    dry_run: bool,

    /// Process at most this many songs (after sorting)
    #[arg(long)]
    max_songs: Option<usize>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            audio_dir: self.audio_dir.clone(),
            lyrics_dir: self.lyrics_dir.clone(),
            cache_dir: self.cache_dir.clone(),
            output_dir: self.output_dir.clone(),
            song_workers: self.song_workers,
            window_workers: self.window_workers,
            max_clips_per_song: self.max_clips,
            min_match_confidence: self.min_confidence,
            cache_policy: if self.force {
                Some(CachePolicy::Force)
            } else if self.realign {
                Some(CachePolicy::Realign)
            } else {
                None
            },
            dry_run: self.dry_run.then_some(true),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = TomlConfig::load(args.config.as_deref(), &args.overrides())?;

    init_tracing(&config)?;
    info!("Starting lyricut-align");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &args.config {
        info!(path = %path.display(), "Configuration file");
    }
    info!(
        audio = %config.audio_dir.display(),
        lyrics = %config.lyrics_dir.display(),
        output = %config.output_dir.display(),
        cache_policy = ?config.align.cache_policy,
        dry_run = config.align.dry_run,
        "Run configuration"
    );

    let songs = discover_songs(&config.audio_dir, args.max_songs)?;
    if songs.is_empty() {
        warn!(dir = %config.audio_dir.display(), "no audio files found, nothing to do");
        return Ok(());
    }
    info!(songs = songs.len(), "discovered audio files");

    let transcript_cache = JsonFileCache::new(config.cache_dir.join("transcripts"))?;
    let phrase_cache = JsonFileCache::new(config.cache_dir.join("phrases"))?;

    let align = &config.align;
    let client = Arc::new(TranscriberClient::new(
        Arc::new(UnavailableTranscriber),
        align.transcription_rps,
        RetryPolicy {
            max_attempts: align.retry_max_attempts,
            backoff: align.retry_backoff(),
        },
        align.transcription_timeout(),
    ));

    let (events, mut event_rx) = event_channel();
    let consumer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            debug!(?event, "progress");
        }
    });

    let processor = Arc::new(SongProcessor::new(
        align,
        Arc::new(FileAudioSource),
        Arc::new(FileLyricsProvider::new(&config.lyrics_dir)),
        client,
        Arc::new(transcript_cache),
        Arc::new(phrase_cache),
        None,
        Arc::new(PermissiveClassifier),
        config.output_dir.join("clips"),
        events.clone(),
    ));
    let orchestrator = BatchOrchestrator::new(
        processor,
        align.song_workers,
        config.output_dir.clone(),
        align.dry_run,
        events,
    );

    let summary = orchestrator.run(songs).await?;

    // Dropping the engine closes the event channel so the consumer drains
    drop(orchestrator);
    let _ = consumer.await;

    info!(
        run_id = %summary.run_id,
        songs = summary.songs_processed,
        failed = summary.songs_failed,
        clips = summary.totals.clips_written,
        "Run complete"
    );
    if summary.songs_processed == 0 && summary.songs_failed > 0 {
        anyhow::bail!("all {} songs failed", summary.songs_failed);
    }
    Ok(())
}

fn init_tracing(config: &TomlConfig) -> Result<()> {
    // RUST_LOG wins outright; LYRICUT_LOG overrides the configured level
    let level = env_override("LYRICUT_LOG").unwrap_or_else(|| config.logging.level.clone());
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "lyricut_align={level},lyricut_common={level}"
        ))
    });

    match &config.logging.file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(Arc::new(file))
                        .with_ansi(false),
                )
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
    Ok(())
}
