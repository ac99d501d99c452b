//! Evenly distributed synthetic timing.
//!
//! Used for repeated lines after the first occurrence, for sanitizer
//! redistribution, and as the last-resort timing for a whole song.

use crate::types::{Segment, WordTimestamp};

/// Gap left at the end of each synthetic word slot (seconds).
const WORD_GAP: f64 = 0.03;

/// Line length assumed when the song duration is unknown (seconds).
const FALLBACK_LINE_DURATION: f64 = 3.0;

/// Split line text into display words, treating `,` `।` `!` as separators.
pub fn split_display_words(text: &str) -> Vec<String> {
    text.replace([',', '।', '!'], " ")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Spread the given words over equal slots in `[start, end]`.
pub fn spread_words<S: AsRef<str>>(words: &[S], start: f64, end: f64) -> Vec<WordTimestamp> {
    if words.is_empty() || end <= start {
        return Vec::new();
    }
    let slot = (end - start) / words.len() as f64;
    let gap = if slot > 2.0 * WORD_GAP { WORD_GAP } else { 0.0 };
    words
        .iter()
        .enumerate()
        .map(|(j, w)| {
            let ws = start + j as f64 * slot;
            let we = if j + 1 == words.len() { end } else { ws + slot };
            WordTimestamp::new(w.as_ref(), ws, we - gap)
        })
        .collect()
}

/// Evenly spaced word timestamps for a line sung within `[start, end]`.
pub fn even_words(text: &str, start: f64, end: f64) -> Vec<WordTimestamp> {
    spread_words(&split_display_words(text), start, end)
}

/// Spread whole lines evenly across a song of `duration` seconds.
///
/// Every segment is flagged as estimated.
pub fn even_timeline<S: AsRef<str>>(lines: &[S], duration: f64) -> Vec<Segment> {
    if lines.is_empty() {
        return Vec::new();
    }
    let slot = if duration.is_finite() && duration > 0.0 {
        duration / lines.len() as f64
    } else {
        FALLBACK_LINE_DURATION
    };

    lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let start = i as f64 * slot;
            let end = start + slot;
            let words = even_words(line.as_ref(), start, end);
            let mut seg = Segment::new(line.as_ref(), start, end, words);
            seg.estimated = true;
            seg
        })
        .collect()
}
