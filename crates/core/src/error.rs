//! Alignment error taxonomy.
//!
//! Every variant except `EmptyLyrics`/`OutOfVocabulary` is recoverable: the
//! pipeline moves on to the next aligner and finally to synthetic timing.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AlignError {
    #[error("no lyric lines to align")]
    EmptyLyrics,

    #[error("none of the {chars} lyric characters are in the acoustic vocabulary")]
    OutOfVocabulary { chars: usize },

    #[error("cannot align {tokens} tokens to {frames} frames")]
    Infeasible { tokens: usize, frames: usize },

    #[error("no finite-score alignment path ({tokens} tokens, {frames} frames)")]
    NoPath { tokens: usize, frames: usize },

    #[error("acoustic frontend failed: {0}")]
    Frontend(String),

    #[error("oracle backend '{backend}' failed: {message}")]
    Oracle { backend: String, message: String },

    #[error("no oracle backend produced a usable result")]
    OracleUnavailable,

    #[error("invalid timeline: {0}")]
    InvalidTimeline(String),
}

impl AlignError {
    pub(crate) fn oracle(backend: &str, err: impl std::fmt::Display) -> Self {
        Self::Oracle {
            backend: backend.to_string(),
            message: err.to_string(),
        }
    }

    /// Input errors abort the song; everything else falls through to the
    /// next aligner.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::EmptyLyrics | Self::OutOfVocabulary { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_error_classification() {
        assert!(AlignError::EmptyLyrics.is_input_error());
        assert!(AlignError::OutOfVocabulary { chars: 3 }.is_input_error());
        assert!(!AlignError::Infeasible { tokens: 5, frames: 2 }.is_input_error());
        assert!(!AlignError::OracleUnavailable.is_input_error());
    }

    #[test]
    fn test_oracle_error_message() {
        let e = AlignError::oracle("gemini-2.5-flash", "HTTP 503");
        assert_eq!(e.to_string(), "oracle backend 'gemini-2.5-flash' failed: HTTP 503");
    }
}
