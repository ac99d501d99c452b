//! Per-song alignment pipeline.
//!
//! Aligner → repetition detection → clamp → sanitize → canonical, with
//! evenly spaced timing as the terminal fallback so a song never aborts on
//! a recoverable failure.

use std::path::Path;

use crate::align::{Aligner, EvenAligner};
use crate::config::{PipelineConfig, SanitizeConfig};
use crate::error::AlignError;
use crate::oracle::{AlignmentOracle, OracleSegment};
use crate::reconcile::{Canonical, Raw, RepetitionPlan, SanitizeReport, Timeline};
use crate::types::Origin;

/// Summary of one song's alignment.
#[derive(Debug, Clone, PartialEq)]
pub struct SongReport {
    pub origin: Origin,
    pub segments: usize,
    /// Segments with estimated rather than aligned timing
    pub estimated: usize,
    /// Segments added by repetition expansion
    pub repetitions_added: usize,
    pub sanitize: SanitizeReport,
}

/// Repetition plans for CTC output.
///
/// CTC word timing is kept for lines sung once; for repeated lines the
/// oracle's first-occurrence words are used, since the CTC words were
/// spread over the whole window.
fn ctc_repetition_plans(answers: &[OracleSegment], segment_count: usize) -> Vec<RepetitionPlan> {
    let mut plans = vec![RepetitionPlan::once(); segment_count];
    for answer in answers {
        let count = answer.repetitions.unwrap_or(1);
        if count <= 1 {
            continue;
        }
        if let Some(plan) = plans.get_mut(answer.seg_index) {
            let words = (!answer.words.is_empty()).then(|| answer.words.clone());
            *plan = RepetitionPlan::new(count, words);
        }
    }
    plans
}

/// One configured pipeline; reusable across songs.
pub struct Pipeline {
    aligner: Box<dyn Aligner>,
    repetition_oracle: Option<Box<dyn AlignmentOracle>>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(aligner: Box<dyn Aligner>, config: PipelineConfig) -> Self {
        Self {
            aligner,
            repetition_oracle: None,
            config,
        }
    }

    /// Ask `oracle` for repetition counts on CTC output.
    pub fn with_repetition_oracle(mut self, oracle: Box<dyn AlignmentOracle>) -> Self {
        self.repetition_oracle = Some(oracle);
        self
    }

    fn sanitize_config(&self, origin: Origin) -> &SanitizeConfig {
        match origin {
            Origin::Oracle => &self.config.oracle_sanitize,
            Origin::Ctc | Origin::Even => &self.config.refinement,
        }
    }

    fn detect_repetitions(&self, audio_path: &Path, raw: Timeline<Raw>) -> Timeline<Raw> {
        let Some(oracle) = self.repetition_oracle.as_ref() else {
            return raw;
        };
        if !self.config.detect_repetitions || raw.origin() != Origin::Ctc {
            return raw;
        }
        match oracle.align(audio_path, raw.segments()) {
            Ok(answers) => {
                let plans = ctc_repetition_plans(&answers, raw.segments().len());
                raw.expand_repetitions(
                    &plans,
                    &self.config.repetition,
                    self.config.refinement.min_word_duration,
                )
            }
            Err(e) => {
                log::warn!("Repetition detection skipped: {}", e);
                raw
            }
        }
    }

    fn finish(
        &self,
        raw: Timeline<Raw>,
        before: usize,
    ) -> Result<(Timeline<Canonical>, SongReport), AlignError> {
        let origin = raw.origin();
        let sanitize = self.sanitize_config(origin);
        let repetitions_added = raw.segments().len().saturating_sub(before);

        let (sanitized, report) = raw.clamp(sanitize.min_word_duration).sanitize(sanitize);
        let canonical = sanitized.canonicalize()?;
        let song = SongReport {
            origin,
            segments: canonical.segments().len(),
            estimated: canonical.estimated_count(),
            repetitions_added,
            sanitize: report,
        };
        Ok((canonical, song))
    }

    fn even_fallback(
        &self,
        audio_path: &Path,
        lines: &[String],
    ) -> Result<(Timeline<Canonical>, SongReport), AlignError> {
        log::warn!("Falling back to evenly spaced timing");
        let raw = EvenAligner.align(audio_path, lines)?;
        let before = raw.segments().len();
        self.finish(raw, before)
    }

    /// Align one song's lyric lines against its audio.
    ///
    /// Fails only on input errors (no usable lyrics); every other failure
    /// degrades to the next source of timing.
    pub fn align_song(
        &self,
        audio_path: &Path,
        lines: &[String],
    ) -> Result<(Timeline<Canonical>, SongReport), AlignError> {
        let lines: Vec<String> = lines
            .iter()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        if lines.is_empty() {
            return Err(AlignError::EmptyLyrics);
        }
        log::info!(
            "Aligning {} lines against {} with {}",
            lines.len(),
            audio_path.display(),
            self.aligner.name()
        );

        let raw = match self.aligner.align(audio_path, &lines) {
            Ok(raw) => raw,
            Err(e) if e.is_input_error() => return Err(e),
            Err(e) => {
                log::warn!("{} aligner failed: {}", self.aligner.name(), e);
                return self.even_fallback(audio_path, &lines);
            }
        };
        let before = raw.segments().len();
        let raw = self.detect_repetitions(audio_path, raw);

        match self.finish(raw, before) {
            Ok(done) => {
                let (_, report) = &done;
                log::info!(
                    "Aligned {} segments via {} ({} estimated, {} words truncated, {} segments redistributed)",
                    report.segments,
                    report.origin,
                    report.estimated,
                    report.sanitize.truncated,
                    report.sanitize.redistributed
                );
                Ok(done)
            }
            Err(e) => {
                log::warn!("{}", e);
                self.even_fallback(audio_path, &lines)
            }
        }
    }
}
