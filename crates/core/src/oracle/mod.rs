//! External alignment oracle.
//!
//! A multimodal model is given the audio and the lyric lines with fixed
//! windows, and asked for word timings of each line's first occurrence plus
//! how many times the line is sung. Answers are best-effort: callers
//! validate, clamp and sanitize everything that comes back.

#[cfg(feature = "oracle-http")]
pub mod gemini;
pub mod parse;

use std::fmt::Write as _;
use std::path::Path;

use crate::cache::{OracleCache, file_hash};
use crate::error::AlignError;
use crate::reconcile::RepetitionPlan;
use crate::types::{Segment, WordTimestamp};

/// One segment's answer from the oracle.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleSegment {
    /// Index into the segment list sent with the request
    pub seg_index: usize,
    /// Times the line is sung within its window, if reported
    pub repetitions: Option<i64>,
    /// Word timings for the first occurrence
    pub words: Vec<WordTimestamp>,
}

/// Source of per-segment alignment judgments.
pub trait AlignmentOracle: Send + Sync {
    fn name(&self) -> &str;

    /// Align `segments` (windows fixed) against the audio.
    fn align(
        &self,
        audio_path: &Path,
        segments: &[Segment],
    ) -> Result<Vec<OracleSegment>, AlignError>;
}

/// One remote model that turns audio plus prompt into response text.
pub trait OracleBackend: Send + Sync {
    fn model(&self) -> &str;

    fn generate(&self, audio_path: &Path, prompt: &str) -> Result<String, AlignError>;
}

/// Render the alignment + repetition request for a segment list.
pub fn build_prompt(segments: &[Segment]) -> String {
    let mut seg_info = String::new();
    for (i, seg) in segments.iter().enumerate() {
        let _ = writeln!(
            seg_info,
            "Segment {}: [{:.2}s - {:.2}s] \"{}\"",
            i, seg.start, seg.end, seg.text
        );
    }

    format!(
        r#"You are an audio-to-lyrics alignment tool. You are given an audio file and lyrics with FIXED segment timing.

LYRICS WITH FIXED TIMING:
{seg_info}
For each segment:

1. COUNT REPETITIONS: how many times is the text actually sung in that time range?
   - If sung once, repetitions = 1
   - If it is a repeated chorus or refrain, give the actual count

2. WORD TIMESTAMPS: for the FIRST occurrence of the text in the segment, give word-level timestamps.
   - Word start/end MUST be within the segment's time boundaries
   - Words must be chronological
   - Do not change the text or the segment boundaries

Return a JSON array where each element has:
- "seg_index": segment number (0-based)
- "repetitions": how many times the line is sung (1 if not repeated)
- "words": array of {{"word": "...", "start": X.XX, "end": X.XX}} for the first occurrence

Example:
[
  {{"seg_index": 0, "repetitions": 1, "words": [{{"word": "hello", "start": 1.0, "end": 1.5}}]}},
  {{"seg_index": 1, "repetitions": 4, "words": [{{"word": "chorus", "start": 5.0, "end": 5.5}}]}}
]

Return ONLY the JSON array:"#
    )
}

/// Turn oracle answers into one repetition plan per segment.
///
/// Segments the oracle did not answer keep a single occurrence and their
/// existing words.
pub fn repetition_plans(answers: &[OracleSegment], segment_count: usize) -> Vec<RepetitionPlan> {
    let mut plans = vec![RepetitionPlan::once(); segment_count];
    for answer in answers {
        if let Some(plan) = plans.get_mut(answer.seg_index) {
            let words = (!answer.words.is_empty()).then(|| answer.words.clone());
            *plan = RepetitionPlan::new(answer.repetitions.unwrap_or(1), words);
        }
    }
    plans
}

/// Ordered list of backends tried in turn, with optional response caching.
pub struct OracleChain {
    backends: Vec<Box<dyn OracleBackend>>,
    cache: Option<OracleCache>,
}

impl OracleChain {
    pub fn new(backends: Vec<Box<dyn OracleBackend>>) -> Self {
        Self {
            backends,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: OracleCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Cached response text, or a fresh call stored on success.
    fn fetch(
        &self,
        backend: &dyn OracleBackend,
        audio_path: &Path,
        audio_hash: Option<&str>,
        prompt: &str,
    ) -> Result<String, AlignError> {
        let key = match (&self.cache, audio_hash) {
            (Some(_), Some(hash)) => Some(OracleCache::key(hash, backend.model(), prompt)),
            _ => None,
        };
        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            if let Some(text) = cache.get(key) {
                return Ok(text);
            }
        }

        let text = backend.generate(audio_path, prompt)?;

        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            if let Err(e) = cache.store(key, &text) {
                log::warn!("Failed to cache oracle response: {}", e);
            }
        }
        Ok(text)
    }
}

impl AlignmentOracle for OracleChain {
    fn name(&self) -> &str {
        "oracle-chain"
    }

    fn align(
        &self,
        audio_path: &Path,
        segments: &[Segment],
    ) -> Result<Vec<OracleSegment>, AlignError> {
        if segments.is_empty() {
            return Err(AlignError::EmptyLyrics);
        }
        let prompt = build_prompt(segments);
        let audio_hash = match &self.cache {
            Some(_) => match file_hash(audio_path) {
                Ok(h) => Some(h),
                Err(e) => {
                    log::warn!("Cannot hash audio for oracle cache: {}", e);
                    None
                }
            },
            None => None,
        };

        for backend in &self.backends {
            let model = backend.model();
            log::info!("Attempting oracle alignment with {}...", model);

            let fetched = self.fetch(backend.as_ref(), audio_path, audio_hash.as_deref(), &prompt);
            let text = match fetched {
                Ok(t) => t,
                Err(e) => {
                    log::warn!("{}", e);
                    continue;
                }
            };
            match parse::parse_response(&text, segments.len()) {
                Ok(answers) => {
                    log::info!(
                        "Oracle {} answered {}/{} segments",
                        model,
                        answers.len(),
                        segments.len()
                    );
                    return Ok(answers);
                }
                Err(msg) => log::warn!("{}", AlignError::oracle(model, msg)),
            }
        }

        log::warn!("All oracle backends failed");
        Err(AlignError::OracleUnavailable)
    }
}
