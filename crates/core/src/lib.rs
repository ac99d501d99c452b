//! Lyric-to-audio alignment: CTC forced alignment, oracle reconciliation,
//! repetition expansion and timestamp sanitizing.

pub mod acoustic;
pub mod align;
pub mod audio;
pub mod cache;
pub mod config;
pub mod error;
pub mod oracle;
pub mod pipeline;
pub mod reconcile;
pub mod text;
pub mod types;

pub use error::AlignError;
pub use pipeline::{Pipeline, SongReport};
pub use types::{Origin, Segment, WordTimestamp};
