//! Timeline lifecycle: `Raw → Clamped → Sanitized → Canonical`.
//!
//! Every aligner hands back a `Timeline<Raw>`. The only way to reach
//! `Canonical`, and therefore the only way to serialize, is through each
//! stage in order.

use std::marker::PhantomData;
use std::path::Path;

use anyhow::{Context, Result};

use crate::cache::atomic_write;
use crate::config::{RepetitionConfig, SanitizeConfig};
use crate::error::AlignError;
use crate::types::{Origin, Segment, WordTimestamp};

use super::clamp::clamp_words;
use super::repetition::{RepetitionPlan, expand_repetitions};
use super::sanitize::{SanitizeReport, sanitize_segments};

/// Smallest segment length the canonical form allows (seconds).
const MIN_SEGMENT: f64 = 0.01;

/// Aligner output, not yet checked.
#[derive(Debug)]
pub struct Raw;
/// Every word inside its segment window, ordered and non-overlapping.
#[derive(Debug)]
pub struct Clamped;
/// Implausible word durations repaired.
#[derive(Debug)]
pub struct Sanitized;
/// Sorted, rounded and validated; ready to persist.
#[derive(Debug)]
pub struct Canonical;

/// A song's segment list tagged with its lifecycle stage.
#[derive(Debug)]
pub struct Timeline<S> {
    segments: Vec<Segment>,
    origin: Origin,
    _stage: PhantomData<S>,
}

impl<S> Timeline<S> {
    fn with_stage<T>(segments: Vec<Segment>, origin: Origin) -> Timeline<T> {
        Timeline {
            segments,
            origin,
            _stage: PhantomData,
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn into_segments(self) -> Vec<Segment> {
        self.segments
    }

    /// Number of segments carrying estimated rather than aligned timing.
    pub fn estimated_count(&self) -> usize {
        self.segments.iter().filter(|s| s.estimated).count()
    }
}

impl Timeline<Raw> {
    pub fn new(segments: Vec<Segment>, origin: Origin) -> Self {
        Self::with_stage(segments, origin)
    }

    /// Split repeated segments into sub-segments.
    pub fn expand_repetitions(
        self,
        plans: &[RepetitionPlan],
        config: &RepetitionConfig,
        min_word_duration: f64,
    ) -> Self {
        let segments = expand_repetitions(self.segments, plans, config, min_word_duration);
        Self::with_stage(segments, self.origin)
    }

    /// Repair segment windows and clamp every word into its segment.
    ///
    /// Segments with a non-finite start are dropped. A window with
    /// `end <= start` is widened to cover its words, or to
    /// `min_word_duration` when it has none.
    pub fn clamp(self, min_word_duration: f64) -> Timeline<Clamped> {
        let origin = self.origin;
        let mut out = Vec::with_capacity(self.segments.len());
        for mut seg in self.segments {
            if !seg.start.is_finite() {
                log::warn!("Dropped segment \"{}\": non-finite start", seg.text);
                continue;
            }
            seg.start = seg.start.max(0.0);
            if !seg.end.is_finite() || seg.end <= seg.start {
                let words_end = seg
                    .words
                    .iter()
                    .map(|w| w.end)
                    .filter(|e| e.is_finite())
                    .fold(f64::NEG_INFINITY, f64::max);
                let repaired = words_end.max(seg.start + min_word_duration);
                log::warn!(
                    "Segment \"{}\": invalid window [{:.2}, {:.2}], widened to {:.2}",
                    seg.text,
                    seg.start,
                    seg.end,
                    repaired
                );
                seg.end = repaired;
            }
            seg.words = clamp_words(&seg.words, seg.start, seg.end, min_word_duration);
            out.push(seg);
        }
        Self::with_stage(out, origin)
    }
}

impl Timeline<Clamped> {
    pub fn sanitize(mut self, config: &SanitizeConfig) -> (Timeline<Sanitized>, SanitizeReport) {
        let report = sanitize_segments(&mut self.segments, config);
        (Self::with_stage(self.segments, self.origin), report)
    }
}

impl Timeline<Sanitized> {
    /// Sort, round to centiseconds, and validate.
    pub fn canonicalize(self) -> Result<Timeline<Canonical>, AlignError> {
        let origin = self.origin;
        let mut segments = self.segments;
        segments.sort_by(|a, b| a.start.total_cmp(&b.start));

        for seg in segments.iter_mut() {
            seg.start = round2(seg.start);
            seg.end = round2(seg.end);
            if seg.end <= seg.start {
                seg.end = round2(seg.start + MIN_SEGMENT);
            }
            let (start, end) = (seg.start, seg.end);
            let before = seg.words.len();
            seg.words = seg
                .words
                .drain(..)
                .map(|w| {
                    WordTimestamp::new(
                        w.word,
                        round2(w.start).clamp(start, end),
                        round2(w.end).clamp(start, end),
                    )
                })
                .filter(|w| w.end > w.start)
                .collect();
            if seg.words.len() != before {
                log::debug!(
                    "Segment \"{}\": {} words collapsed by rounding",
                    seg.text,
                    before - seg.words.len()
                );
            }
        }

        let problems = validate_canonical(&segments);
        if let Some(first) = problems.first() {
            return Err(AlignError::InvalidTimeline(format!(
                "{} ({} problems)",
                first,
                problems.len()
            )));
        }
        Ok(Self::with_stage(segments, origin))
    }
}

impl Timeline<Canonical> {
    /// The persisted JSON array.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.segments).context("Failed to serialize timeline")
    }

    /// Write the JSON array atomically.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        atomic_write(path, json.as_bytes())
            .with_context(|| format!("Failed to write timeline: {}", path.display()))?;
        log::info!("Wrote {} segments to {}", self.segments.len(), path.display());
        Ok(())
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn is_rounded(x: f64) -> bool {
    round2(x) == x
}

/// Read a persisted segment array.
pub fn load_segments(path: &Path) -> Result<Vec<Segment>> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read timeline: {}", path.display()))?;
    serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse timeline: {}", path.display()))
}

/// List every violation of the canonical form. Empty means valid.
pub fn validate_canonical(segments: &[Segment]) -> Vec<String> {
    let mut problems = Vec::new();

    for (i, seg) in segments.iter().enumerate() {
        if !seg.start.is_finite() || !seg.end.is_finite() {
            problems.push(format!("segment {}: non-finite bounds", i));
            continue;
        }
        if seg.end <= seg.start {
            problems.push(format!(
                "segment {}: end {:.2} <= start {:.2}",
                i, seg.end, seg.start
            ));
        }
        if !is_rounded(seg.start) || !is_rounded(seg.end) {
            problems.push(format!("segment {}: bounds not rounded to 2 decimals", i));
        }
        if i > 0 && seg.start < segments[i - 1].start {
            problems.push(format!("segment {}: starts before segment {}", i, i - 1));
        }

        for (j, w) in seg.words.iter().enumerate() {
            if !w.start.is_finite() || !w.end.is_finite() || w.end <= w.start {
                problems.push(format!("segment {} word {}: empty or inverted", i, j));
            }
            if w.start < seg.start || w.end > seg.end {
                problems.push(format!(
                    "segment {} word {} \"{}\": outside segment bounds",
                    i, j, w.word
                ));
            }
            if !is_rounded(w.start) || !is_rounded(w.end) {
                problems.push(format!("segment {} word {}: not rounded to 2 decimals", i, j));
            }
        }
        for (j, pair) in seg.words.windows(2).enumerate() {
            if pair[1].start < pair[0].end {
                problems.push(format!("segment {} word {}: overlaps previous word", i, j + 1));
            }
        }
    }
    problems
}
