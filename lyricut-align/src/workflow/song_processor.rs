//! One song, end to end: lyrics → transcript → aligned phrases → clips.
//!
//! The processor wires the services together and owns the per-song cache
//! policy. Per-line and per-window failures degrade (unmatched lines fall
//! back to acoustic segmentation, failed windows transcribe as silence);
//! only song-level problems, a missing lyric sheet or an undecodable file,
//! surface as errors.
//!
//! CPU-bound stages (decode, onset analysis, clip writing) run on the
//! blocking pool behind a shared semaphore so a batch of songs cannot pile
//! unbounded blocking work onto the runtime.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task;
use tracing::{debug, info, warn};

use lyricut_common::{AlignEvent, AlignMethod, Error, EventSender, Result, SongStats};

use crate::cache::Cache;
use crate::config::{AlignConfig, CachePolicy};
use crate::providers::{
    AudioSource, ContentClassifier, LineRanker, LyricsProvider, TranscriberClient,
};
use crate::services::{
    ClipChopper, LineMatcher, OnsetSegmenter, PhraseSelector, TimestampRefiner,
    WindowedTranscriber,
};
use crate::types::{
    Clip, Phrase, PhraseBounds, PhraseCacheRecord, SongId, SongRequest, TranscriptCacheRecord,
    Waveform,
};

/// What one song's run produced.
#[derive(Debug, Clone)]
pub struct SongReport {
    pub song_id: SongId,
    pub stats: SongStats,
    pub clips: Vec<Clip>,
    /// True when a cached alignment was reused wholesale.
    pub from_cache: bool,
}

pub struct SongProcessor {
    audio: Arc<dyn AudioSource>,
    lyrics: Arc<dyn LyricsProvider>,
    transcriber: WindowedTranscriber,
    matcher: LineMatcher,
    refiner: TimestampRefiner,
    segmenter: Arc<OnsetSegmenter>,
    selector: PhraseSelector,
    chopper: Arc<ClipChopper>,
    classifier: Arc<dyn ContentClassifier>,
    cpu_gate: Arc<Semaphore>,
    clips_dir: PathBuf,
    bounds: PhraseBounds,
    cache_policy: CachePolicy,
    dry_run: bool,
    events: EventSender,
}

impl SongProcessor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &AlignConfig,
        audio: Arc<dyn AudioSource>,
        lyrics: Arc<dyn LyricsProvider>,
        transcription: Arc<TranscriberClient>,
        transcript_cache: Arc<dyn Cache<TranscriptCacheRecord>>,
        phrase_cache: Arc<dyn Cache<PhraseCacheRecord>>,
        ranker: Option<Arc<dyn LineRanker>>,
        classifier: Arc<dyn ContentClassifier>,
        clips_dir: PathBuf,
        events: EventSender,
    ) -> Self {
        Self {
            audio,
            lyrics,
            transcriber: WindowedTranscriber::new(config, transcription, transcript_cache),
            matcher: LineMatcher::new(config),
            refiner: TimestampRefiner::new(config),
            segmenter: Arc::new(OnsetSegmenter::new(config)),
            selector: PhraseSelector::new(config, ranker, phrase_cache),
            chopper: Arc::new(ClipChopper::new(config)),
            classifier,
            cpu_gate: Arc::new(Semaphore::new(config.cpu_workers)),
            clips_dir,
            bounds: config.phrase_bounds(),
            cache_policy: config.cache_policy,
            dry_run: config.dry_run,
            events,
        }
    }

    pub async fn process(&self, request: &SongRequest) -> Result<SongReport> {
        let song_id = request.song_id();

        // Lyrics first: a song without a sheet fails before any decode work
        let sheet = self.lyrics.lyrics(request)?.ok_or_else(|| {
            Error::NotFound(format!("no lyric sheet for {} ({})", song_id, request.title))
        })?;

        let (waveform, fingerprint) = self.load_audio(request).await?;
        let waveform = Arc::new(waveform);
        debug!(song = %song_id, duration = waveform.duration(), %fingerprint, "audio loaded");

        match self.cache_policy {
            CachePolicy::Force => {
                self.transcriber.invalidate(&song_id)?;
                self.selector.invalidate(&song_id)?;
            }
            CachePolicy::ReadThrough => {
                if let Some(phrases) =
                    self.selector
                        .cached_phrases(&song_id, &fingerprint, &self.bounds)?
                {
                    return self
                        .reuse_previous(request, &song_id, &waveform, phrases)
                        .await;
                }
            }
            CachePolicy::Realign => {}
        }

        // Under realignment the previous run's phrases become per-line priors
        let priors: HashMap<usize, Phrase> = if self.cache_policy == CachePolicy::Realign {
            self.selector
                .cached_phrases(&song_id, &fingerprint, &self.bounds)?
                .map(|phrases| {
                    phrases
                        .into_iter()
                        .map(|phrase| (phrase.line_index, phrase))
                        .collect()
                })
                .unwrap_or_default()
        } else {
            HashMap::new()
        };

        let selected = self.selector.select(&sheet).await;
        if selected.is_empty() {
            warn!(song = %song_id, source = %sheet.source, "no usable lyric lines, nothing to align");
            return Ok(SongReport {
                song_id,
                stats: SongStats::default(),
                clips: Vec::new(),
                from_cache: false,
            });
        }

        let transcript = self
            .transcriber
            .transcribe_song(&song_id, &waveform, &fingerprint)
            .await?;
        self.events.send(AlignEvent::TranscriptReady {
            song_id: song_id.to_string(),
            windows: transcript.windows.len(),
            cached: transcript.from_cache,
        });

        let mut stats = SongStats::default();
        let mut slots: Vec<Option<Phrase>> = vec![None; selected.len()];
        let mut fallback_positions: Vec<usize> = Vec::new();

        for (position, line) in selected.iter().enumerate() {
            let result = self.matcher.match_line(&line.text, &transcript.windows);
            match result.window_index {
                Some(window_index) => {
                    let prior = priors.get(&line.index);
                    if let Some(prior) = prior.filter(|p| p.confidence > result.confidence) {
                        // The previous run was more confident; its timing stands
                        slots[position] = Some(Phrase {
                            method: AlignMethod::KeptPrevious,
                            ..prior.clone()
                        });
                        stats.kept_previous += 1;
                        self.emit_aligned(&song_id, line.index, prior.confidence, AlignMethod::KeptPrevious);
                    } else {
                        let window = &transcript.windows[window_index];
                        let (start, end) =
                            self.refiner.refine(&line.text, window, waveform.duration());
                        slots[position] = Some(Phrase::new(
                            line.index,
                            &line.text,
                            start,
                            end,
                            result.confidence,
                            AlignMethod::Matched,
                            &self.bounds,
                        )?);
                        stats.matched += 1;
                        self.emit_aligned(&song_id, line.index, result.confidence, AlignMethod::Matched);
                    }
                }
                None => {
                    stats.unmatched += 1;
                    if let Some(prior) = priors.get(&line.index) {
                        slots[position] = Some(Phrase {
                            method: AlignMethod::KeptPrevious,
                            ..prior.clone()
                        });
                        stats.kept_previous += 1;
                        self.emit_aligned(&song_id, line.index, prior.confidence, AlignMethod::KeptPrevious);
                    } else {
                        fallback_positions.push(position);
                    }
                }
            }
        }

        if !fallback_positions.is_empty() {
            self.events.send(AlignEvent::FallbackEngaged {
                song_id: song_id.to_string(),
                lines: fallback_positions.len(),
            });
            let segments = self.segment_audio(&waveform, selected.len()).await?;
            for &position in &fallback_positions {
                let line = &selected[position];
                let segment = segments[position];
                slots[position] = Some(Phrase::new(
                    line.index,
                    &line.text,
                    segment.start_time,
                    segment.end_time,
                    0.0,
                    AlignMethod::Fallback,
                    &self.bounds,
                )?);
                stats.fallback += 1;
                self.emit_aligned(&song_id, line.index, 0.0, AlignMethod::Fallback);
            }
        }

        // Every position was resolved by exactly one of the arms above
        let phrases: Vec<Phrase> = slots.into_iter().flatten().collect();

        // Persist the alignment even under dry-run, so a later real run can
        // reuse it
        if let Err(e) = self
            .selector
            .store_phrases(&song_id, &fingerprint, &phrases)
        {
            warn!(song = %song_id, error = %e, "failed to store phrase cache record");
        }

        let clips = if self.dry_run {
            Vec::new()
        } else {
            self.chop(request, &song_id, &waveform, phrases, &mut stats)
                .await?
        };

        info!(
            song = %song_id,
            matched = stats.matched,
            unmatched = stats.unmatched,
            kept_previous = stats.kept_previous,
            fallback = stats.fallback,
            clips = stats.clips_written,
            "song aligned"
        );
        Ok(SongReport {
            song_id,
            stats,
            clips,
            from_cache: false,
        })
    }

    /// Wholesale reuse of a previous run's alignment. The stats recount how
    /// each stored phrase was originally resolved; nothing was re-matched,
    /// so `unmatched` stays zero.
    async fn reuse_previous(
        &self,
        request: &SongRequest,
        song_id: &SongId,
        waveform: &Arc<Waveform>,
        phrases: Vec<Phrase>,
    ) -> Result<SongReport> {
        debug!(song = %song_id, phrases = phrases.len(), "reusing cached alignment");
        let mut stats = SongStats::default();
        for phrase in &phrases {
            match phrase.method {
                AlignMethod::Matched => stats.matched += 1,
                AlignMethod::KeptPrevious => stats.kept_previous += 1,
                AlignMethod::Fallback => stats.fallback += 1,
            }
            self.emit_aligned(song_id, phrase.line_index, phrase.confidence, phrase.method);
        }

        let clips = if self.dry_run {
            Vec::new()
        } else {
            self.chop(request, song_id, waveform, phrases, &mut stats)
                .await?
        };
        Ok(SongReport {
            song_id: song_id.clone(),
            stats,
            clips,
            from_cache: true,
        })
    }

    /// Decode and fingerprint on the blocking pool, gated by the CPU
    /// semaphore.
    async fn load_audio(&self, request: &SongRequest) -> Result<(Waveform, String)> {
        let _cpu = self
            .cpu_gate
            .acquire()
            .await
            .map_err(|e| Error::Internal(format!("cpu pool closed: {e}")))?;
        let audio = Arc::clone(&self.audio);
        let path = request.audio_path.clone();
        task::spawn_blocking(move || {
            let waveform = audio.load(&path)?;
            let fingerprint = waveform.fingerprint();
            Ok((waveform, fingerprint))
        })
        .await
        .map_err(|e| Error::Internal(format!("decode task failed: {e}")))?
    }

    async fn segment_audio(
        &self,
        waveform: &Arc<Waveform>,
        target: usize,
    ) -> Result<Vec<crate::services::Segment>> {
        let _cpu = self
            .cpu_gate
            .acquire()
            .await
            .map_err(|e| Error::Internal(format!("cpu pool closed: {e}")))?;
        let segmenter = Arc::clone(&self.segmenter);
        let waveform = Arc::clone(waveform);
        task::spawn_blocking(move || segmenter.segment(&waveform, target))
            .await
            .map_err(|e| Error::Internal(format!("segmentation task failed: {e}")))?
    }

    async fn chop(
        &self,
        request: &SongRequest,
        song_id: &SongId,
        waveform: &Arc<Waveform>,
        phrases: Vec<Phrase>,
        stats: &mut SongStats,
    ) -> Result<Vec<Clip>> {
        let outcome = {
            let _cpu = self
                .cpu_gate
                .acquire()
                .await
                .map_err(|e| Error::Internal(format!("cpu pool closed: {e}")))?;
            let chopper = Arc::clone(&self.chopper);
            let classifier = Arc::clone(&self.classifier);
            let waveform = Arc::clone(waveform);
            let request = request.clone();
            let clips_dir = self.clips_dir.clone();
            task::spawn_blocking(move || {
                chopper.chop(&request, &waveform, &phrases, classifier.as_ref(), &clips_dir)
            })
            .await
            .map_err(|e| Error::Internal(format!("chop task failed: {e}")))??
        };

        for clip in &outcome.clips {
            self.events.send(AlignEvent::ClipWritten {
                song_id: song_id.to_string(),
                clip_index: clip.clip_index,
                file_name: clip.file_name.clone(),
            });
        }
        for rejection in &outcome.rejections {
            self.events.send(AlignEvent::ClipRejected {
                song_id: song_id.to_string(),
                line_index: rejection.line_index,
                reason: rejection.reason.clone(),
            });
        }
        stats.clips_written = outcome.clips.len();
        stats.clips_rejected = outcome.rejections.len();
        Ok(outcome.clips)
    }

    fn emit_aligned(
        &self,
        song_id: &SongId,
        line_index: usize,
        confidence: f32,
        method: AlignMethod,
    ) {
        self.events.send(AlignEvent::LineAligned {
            song_id: song_id.to_string(),
            line_index,
            confidence: f64::from(confidence),
            method,
        });
    }
}
