//! Lyric text handling: line splitting and normalization to acoustic tokens.

pub mod normalize;

pub use normalize::{LyricLine, NormalizedLyrics, TokenOwner, normalize_lyrics, split_lines};
