//! Forced alignment: CTC Viterbi, word/line reconstruction, and the
//! aligner backends built on them.

pub mod backend;
pub mod ctc;
pub mod reconstruct;

pub use backend::{
    Aligner, CtcAligner, EmissionAligner, EvenAligner, FallbackAligner, OracleAligner, get_aligner,
};
