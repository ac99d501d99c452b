//! Aligner interface and backends.
//!
//! Every backend turns audio plus lyric lines into a `Timeline<Raw>`:
//! - CtcAligner: forced alignment over acoustic emissions
//! - OracleAligner: external oracle over fixed line windows
//! - EvenAligner: synthetic timing spread across the song
//! - FallbackAligner: tries a list of backends in order

use std::path::Path;

use anyhow::{Result, bail};

use crate::acoustic::{AcousticFrontend, LogProbMatrix};
use crate::audio::io::audio_duration;
use crate::config::{AlignConfig, RepetitionConfig};
use crate::error::AlignError;
use crate::oracle::{AlignmentOracle, repetition_plans};
use crate::reconcile::even::even_timeline;
use crate::reconcile::{Raw, Timeline};
use crate::text::normalize_lyrics;
use crate::types::{Origin, Segment};

use super::ctc::forced_align;
use super::reconstruct::reconstruct_segments;

/// Alignment backend trait.
pub trait Aligner: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Align lyric lines against the audio.
    fn align(&self, audio_path: &Path, lines: &[String]) -> Result<Timeline<Raw>, AlignError>;
}

/// CTC forced alignment for a fixed vocabulary.
#[derive(Debug, Clone)]
pub struct CtcAligner {
    config: AlignConfig,
}

impl CtcAligner {
    pub fn new(config: AlignConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AlignConfig {
        &self.config
    }

    /// Align lines against an emission matrix already in hand.
    pub fn align_emissions<S: AsRef<str>>(
        &self,
        log_probs: &LogProbMatrix,
        frame_duration: f64,
        lines: &[S],
    ) -> Result<Timeline<Raw>, AlignError> {
        let vocab = &self.config.vocabulary;
        if !(frame_duration.is_finite() && frame_duration > 0.0) {
            return Err(AlignError::Frontend(format!(
                "invalid frame duration {}",
                frame_duration
            )));
        }
        if log_probs.classes() < vocab.num_classes() {
            return Err(AlignError::Frontend(format!(
                "{} emission classes for a vocabulary of {}",
                log_probs.classes(),
                vocab.num_classes()
            )));
        }

        let lyrics = normalize_lyrics(lines, vocab)?;
        let alignment = forced_align(log_probs, &lyrics.tokens, vocab.blank_id())?;
        log::info!(
            "CTC ({}): {} tokens over {} frames, mean log-prob {:.3}",
            self.config.model_id,
            lyrics.tokens.len(),
            alignment.frames,
            alignment.mean_frame_score()
        );

        let segments = reconstruct_segments(&alignment.entries, &lyrics, frame_duration);
        Ok(Timeline::new(segments, Origin::Ctc))
    }
}

/// CTC alignment with emissions obtained from an acoustic frontend.
pub struct EmissionAligner {
    frontend: Box<dyn AcousticFrontend>,
    model_id: String,
}

impl EmissionAligner {
    pub fn new(frontend: Box<dyn AcousticFrontend>, model_id: &str) -> Self {
        Self {
            frontend,
            model_id: model_id.to_string(),
        }
    }
}

impl Aligner for EmissionAligner {
    fn name(&self) -> &str {
        "ctc"
    }

    fn align(&self, audio_path: &Path, lines: &[String]) -> Result<Timeline<Raw>, AlignError> {
        let emissions = self.frontend.emissions(audio_path).map_err(|e| {
            AlignError::Frontend(format!("{} ({}): {:#}", self.frontend.name(), self.model_id, e))
        })?;
        let aligner = CtcAligner::new(AlignConfig::new(emissions.vocabulary, &self.model_id));
        aligner.align_emissions(&emissions.log_probs, emissions.frame_duration, lines)
    }
}

/// Oracle alignment over fixed line windows.
///
/// The oracle sees each line with a fixed window, reports word timings and
/// repetition counts, and the windows are expanded accordingly. Windows come
/// from an existing timed segment list when one is given, otherwise lines
/// are spread evenly across the song.
pub struct OracleAligner {
    oracle: Box<dyn AlignmentOracle>,
    repetition: RepetitionConfig,
    min_word_duration: f64,
    windows: Option<Vec<Segment>>,
}

impl OracleAligner {
    pub fn new(
        oracle: Box<dyn AlignmentOracle>,
        repetition: RepetitionConfig,
        min_word_duration: f64,
    ) -> Self {
        Self {
            oracle,
            repetition,
            min_word_duration,
            windows: None,
        }
    }

    /// Use pre-timed segments as the fixed windows.
    ///
    /// Segments the oracle does not answer keep their existing words.
    pub fn with_windows(mut self, windows: Vec<Segment>) -> Self {
        self.windows = Some(windows);
        self
    }

    fn windows(&self, audio_path: &Path, lines: &[String]) -> Result<Vec<Segment>, AlignError> {
        if let Some(supplied) = &self.windows {
            if supplied.len() != lines.len() {
                log::warn!(
                    "{} timed segments for {} lyric lines; aligning the segments",
                    supplied.len(),
                    lines.len()
                );
            }
            let windows = supplied
                .iter()
                .cloned()
                .map(|mut seg| {
                    seg.estimated = seg.words.is_empty();
                    seg
                })
                .collect();
            return Ok(windows);
        }
        if lines.is_empty() {
            return Err(AlignError::EmptyLyrics);
        }
        let duration =
            audio_duration(audio_path).map_err(|e| AlignError::Frontend(format!("{:#}", e)))?;
        Ok(even_timeline(lines, duration))
    }
}

impl Aligner for OracleAligner {
    fn name(&self) -> &str {
        "oracle"
    }

    fn align(&self, audio_path: &Path, lines: &[String]) -> Result<Timeline<Raw>, AlignError> {
        let mut windows = self.windows(audio_path, lines)?;
        if windows.is_empty() {
            return Err(AlignError::EmptyLyrics);
        }

        let answers = self.oracle.align(audio_path, &windows)?;
        for answer in &answers {
            if answer.words.is_empty() {
                continue;
            }
            if let Some(seg) = windows.get_mut(answer.seg_index) {
                seg.estimated = false;
            }
        }

        let plans = repetition_plans(&answers, windows.len());
        Ok(Timeline::new(windows, Origin::Oracle).expand_repetitions(
            &plans,
            &self.repetition,
            self.min_word_duration,
        ))
    }
}

/// Lines spread evenly across the song. Only fails on empty input.
#[derive(Debug, Clone, Default)]
pub struct EvenAligner;

impl Aligner for EvenAligner {
    fn name(&self) -> &str {
        "even"
    }

    fn align(&self, audio_path: &Path, lines: &[String]) -> Result<Timeline<Raw>, AlignError> {
        if lines.is_empty() {
            return Err(AlignError::EmptyLyrics);
        }
        let duration = audio_duration(audio_path).unwrap_or_else(|e| {
            log::warn!("Cannot probe audio duration ({:#}); assuming fixed line length", e);
            0.0
        });
        Ok(Timeline::new(even_timeline(lines, duration), Origin::Even))
    }
}

/// Tries each backend in order; the first success wins.
///
/// Input errors stop the chain immediately, since no backend can do better
/// with the same lyrics.
pub struct FallbackAligner {
    chain: Vec<Box<dyn Aligner>>,
}

impl FallbackAligner {
    pub fn new(chain: Vec<Box<dyn Aligner>>) -> Self {
        Self { chain }
    }
}

impl Aligner for FallbackAligner {
    fn name(&self) -> &str {
        "auto"
    }

    fn align(&self, audio_path: &Path, lines: &[String]) -> Result<Timeline<Raw>, AlignError> {
        let mut last_err = AlignError::OracleUnavailable;
        for aligner in &self.chain {
            match aligner.align(audio_path, lines) {
                Ok(timeline) => return Ok(timeline),
                Err(e) if e.is_input_error() => return Err(e),
                Err(e) => {
                    log::warn!("{} aligner failed: {}", aligner.name(), e);
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }
}

/// Construct an aligner by name.
///
/// `auto` chains whatever is available: CTC when a frontend is given, then
/// the oracle when one is given, then even timing. `windows` fixes the
/// oracle's segment windows.
pub fn get_aligner(
    name: &str,
    frontend: Option<Box<dyn AcousticFrontend>>,
    oracle: Option<Box<dyn AlignmentOracle>>,
    windows: Option<Vec<Segment>>,
    model_id: &str,
    repetition: &RepetitionConfig,
    min_word_duration: f64,
) -> Result<Box<dyn Aligner>> {
    let ctc = frontend.map(|f| Box::new(EmissionAligner::new(f, model_id)) as Box<dyn Aligner>);
    let oracle = oracle.map(|o| {
        let aligner = OracleAligner::new(o, repetition.clone(), min_word_duration);
        let aligner = match windows {
            Some(w) => aligner.with_windows(w),
            None => aligner,
        };
        Box::new(aligner) as Box<dyn Aligner>
    });

    match name {
        "auto" => {
            let mut chain: Vec<Box<dyn Aligner>> = Vec::new();
            chain.extend(ctc);
            chain.extend(oracle);
            chain.push(Box::new(EvenAligner));
            let names: Vec<&str> = chain.iter().map(|a| a.name()).collect();
            log::info!("Aligner chain: {}", names.join(" -> "));
            Ok(Box::new(FallbackAligner::new(chain)))
        }
        "ctc" => match ctc {
            Some(a) => Ok(a),
            None => bail!("The ctc aligner needs an emission file"),
        },
        "oracle" => match oracle {
            Some(a) => Ok(a),
            None => bail!("The oracle aligner needs an oracle backend (is the API key set?)"),
        },
        "even" => Ok(Box::new(EvenAligner)),
        _ => bail!("Unknown aligner: '{}'. Available: auto, ctc, oracle, even", name),
    }
}
