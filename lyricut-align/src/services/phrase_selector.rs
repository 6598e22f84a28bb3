//! Line selection and the phrase cache.
//!
//! Not every lyric line makes a good clip. The selector drops lines too
//! short to match reliably, applies the per-song cap, and optionally lets an
//! external ranker pick which lines matter most. It also owns the phrase
//! cache, where finished alignments are stored for wholesale reuse or as
//! priors for a later realignment pass.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use lyricut_common::Result;

use crate::cache::Cache;
use crate::config::AlignConfig;
use crate::providers::LineRanker;
use crate::types::{
    LyricLine, LyricSheet, Phrase, PhraseBounds, PhraseCacheRecord, SongId, CACHE_VERSION,
};
use crate::utils::text;

pub struct PhraseSelector {
    min_line_words: usize,
    max_clips: usize,
    ranking_guidance: String,
    ranker: Option<Arc<dyn LineRanker>>,
    cache: Arc<dyn Cache<PhraseCacheRecord>>,
}

impl PhraseSelector {
    pub fn new(
        config: &AlignConfig,
        ranker: Option<Arc<dyn LineRanker>>,
        cache: Arc<dyn Cache<PhraseCacheRecord>>,
    ) -> Self {
        Self {
            min_line_words: config.min_line_words,
            max_clips: config.max_clips_per_song,
            ranking_guidance: config.ranking_guidance.clone(),
            ranker,
            cache,
        }
    }

    /// Pick the lines worth aligning: long enough to match, at most the
    /// per-song cap, always returned in sheet order.
    pub async fn select(&self, sheet: &LyricSheet) -> Vec<LyricLine> {
        let mut candidates: Vec<LyricLine> = sheet
            .lines
            .iter()
            .filter(|line| text::words(&line.text).len() >= self.min_line_words)
            .cloned()
            .collect();

        if let Some(ranker) = &self.ranker {
            if !candidates.is_empty() {
                match ranker
                    .rank(&candidates, &self.ranking_guidance, self.max_clips)
                    .await
                {
                    Ok(ranked) => match Self::apply_ranking(&candidates, &ranked) {
                        Some(subset) => candidates = subset,
                        None => {
                            warn!(
                                source = %sheet.source,
                                "ranker returned unusable indices, keeping sheet order"
                            );
                        }
                    },
                    Err(e) => {
                        warn!(source = %sheet.source, error = %e, "line ranking failed, keeping sheet order");
                    }
                }
            }
        }

        candidates.truncate(self.max_clips);
        candidates
    }

    /// Resolve ranker output (indices into the candidate list) back into
    /// lines. Ranking chooses WHICH lines survive; the subset is re-sorted
    /// so clips still come out in the order the song sings them.
    ///
    /// `None` when the indices are empty, out of bounds, or repeated.
    fn apply_ranking(candidates: &[LyricLine], ranked: &[usize]) -> Option<Vec<LyricLine>> {
        if ranked.is_empty() {
            return None;
        }
        let mut seen = vec![false; candidates.len()];
        let mut subset = Vec::with_capacity(ranked.len());
        for &index in ranked {
            let line = candidates.get(index)?;
            if seen[index] {
                return None;
            }
            seen[index] = true;
            subset.push(line.clone());
        }
        subset.sort_by_key(|line| line.index);
        Some(subset)
    }

    /// Phrases from a previous run over the same audio, or `None` when the
    /// cache holds nothing trustworthy. Records that fail validation are
    /// dropped from the cache on the spot.
    pub fn cached_phrases(
        &self,
        song_id: &SongId,
        fingerprint: &str,
        bounds: &PhraseBounds,
    ) -> Result<Option<Vec<Phrase>>> {
        let Some(record) = self.cache.get(song_id)? else {
            return Ok(None);
        };
        if !record.matches(fingerprint) {
            debug!(song = %song_id, "cached phrases are for different audio, ignoring");
            return Ok(None);
        }
        if record.phrases.is_empty() {
            return Ok(None);
        }
        for phrase in &record.phrases {
            if let Err(e) = phrase.check(bounds) {
                warn!(song = %song_id, error = %e, "discarding cached phrases that fail validation");
                self.cache.invalidate(song_id)?;
                return Ok(None);
            }
        }
        Ok(Some(record.phrases))
    }

    pub fn store_phrases(
        &self,
        song_id: &SongId,
        fingerprint: &str,
        phrases: &[Phrase],
    ) -> Result<()> {
        let record = PhraseCacheRecord {
            version: CACHE_VERSION,
            fingerprint: fingerprint.to_string(),
            phrases: phrases.to_vec(),
            created_at: Utc::now(),
        };
        self.cache.put(song_id, &record)
    }

    pub fn invalidate(&self, song_id: &SongId) -> Result<()> {
        self.cache.invalidate(song_id)
    }
}
