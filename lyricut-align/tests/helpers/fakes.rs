//! Scripted collaborators
//!
//! Stand-ins for the external transcription and classification services, so
//! tests can pin exactly what the pipeline hears without any network.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lyricut_align::providers::{
    BoxFuture, ContentClassifier, RetryPolicy, TranscriberClient, TranscriptionService,
};
use lyricut_common::Result;

/// Window index parsed from a segment id of the form `{song}_w{index:03}`.
pub fn window_index(segment_id: &str) -> usize {
    segment_id
        .rsplit("_w")
        .next()
        .and_then(|digits| digits.parse().ok())
        .unwrap_or(0)
}

/// Transcribes each window to a fixed script entry, keyed by window index.
/// Windows past the end of the script come back empty. Tracks total calls
/// and the peak number of concurrent in-flight calls.
pub struct ScriptedTranscriber {
    name: String,
    script: Vec<String>,
    delays: Vec<Duration>,
    uniform_delay: Option<Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl ScriptedTranscriber {
    pub fn new(name: &str, script: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            script: script.iter().map(|s| s.to_string()).collect(),
            delays: Vec::new(),
            uniform_delay: None,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Delay every window by the same amount before answering.
    pub fn with_uniform_delay(mut self, delay: Duration) -> Self {
        self.uniform_delay = Some(delay);
        self
    }

    /// Per-window delays, indexed like the script. Windows without an entry
    /// fall back to the uniform delay, if any.
    pub fn with_delays(mut self, delays: Vec<Duration>) -> Self {
        self.delays = delays;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

impl TranscriptionService for ScriptedTranscriber {
    fn name(&self) -> &str {
        &self.name
    }

    fn required_sample_rate(&self) -> Option<u32> {
        None
    }

    fn transcribe<'a>(
        &'a self,
        segment_id: &'a str,
        _samples: &'a [f32],
        _sample_rate: u32,
    ) -> BoxFuture<'a, Result<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let index = window_index(segment_id);
        let text = self.script.get(index).cloned().unwrap_or_default();
        let delay = self.delays.get(index).copied().or(self.uniform_delay);
        Box::pin(async move {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(current, Ordering::SeqCst);
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(text)
        })
    }
}

/// Flags any lyric containing the configured needle, case-insensitively.
pub struct KeywordClassifier {
    needle: String,
}

impl KeywordClassifier {
    pub fn new(needle: &str) -> Self {
        Self {
            needle: needle.to_lowercase(),
        }
    }
}

impl ContentClassifier for KeywordClassifier {
    fn is_sensitive(&self, text: &str) -> bool {
        text.to_lowercase().contains(&self.needle)
    }
}

/// A transcriber client with limits generous enough that tests exercise the
/// pipeline, never the throttling.
pub fn test_client(service: Arc<dyn TranscriptionService>) -> Arc<TranscriberClient> {
    Arc::new(TranscriberClient::new(
        service,
        1000,
        RetryPolicy {
            max_attempts: 2,
            backoff: Duration::from_millis(5),
        },
        Duration::from_secs(5),
    ))
}
