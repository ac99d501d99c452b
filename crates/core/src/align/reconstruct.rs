//! Word/line reconstruction: aligned characters → words → lyric lines.

use crate::text::normalize::{NormalizedLyrics, TokenOwner, tidy_punctuation};
use crate::types::{AlignmentEntry, Segment, WordTimestamp};

/// Gap after the previous line where an unaligned line is assumed to start.
const PLACEHOLDER_OFFSET: f64 = 0.5;
/// Assumed length of an unaligned line.
const PLACEHOLDER_DURATION: f64 = 3.0;

/// A word located in the lyric layout, with timing in seconds.
#[derive(Debug, Clone, PartialEq)]
struct LocatedWord {
    line: usize,
    word: usize,
    start: f64,
    end: f64,
}

/// Group character entries into words by their owning lyric word.
fn group_words(
    entries: &[AlignmentEntry],
    lyrics: &NormalizedLyrics,
    frame_duration: f64,
) -> Vec<LocatedWord> {
    let mut words: Vec<LocatedWord> = Vec::new();

    for entry in entries {
        let (line, word) = match lyrics.owners.get(entry.token_index) {
            Some(TokenOwner::Char { line, word }) => (*line, *word),
            // Separators only delimit; missing owners mean a foreign entry
            _ => continue,
        };
        let (start, end) = entry.to_seconds(frame_duration);

        match words.last_mut() {
            Some(last) if last.line == line && last.word == word => last.end = end,
            _ => words.push(LocatedWord {
                line,
                word,
                start,
                end,
            }),
        }
    }
    words
}

/// Squeeze runs of placeholders into the gap before the next aligned line.
///
/// A run keeps its default `prev.end + 0.5` layout when that fits. Otherwise
/// the gap `[prev.end, next.start]` is split evenly across the run, so no
/// placeholder starts after the line that follows it.
fn fit_placeholders(segments: &mut [Segment]) {
    let is_placeholder = |s: &Segment| s.estimated && s.words.is_empty();
    let mut i = 0;
    while i < segments.len() {
        if !is_placeholder(&segments[i]) {
            i += 1;
            continue;
        }
        let run_start = i;
        while i < segments.len() && is_placeholder(&segments[i]) {
            i += 1;
        }
        let Some(next_start) = segments.get(i).map(|s| s.start) else {
            break;
        };
        if segments[i - 1].end <= next_start {
            continue;
        }

        let prev_end = match run_start {
            0 => 0.0,
            n => segments[n - 1].end,
        };
        let gap_start = prev_end.min(next_start);
        let slot = (next_start - gap_start) / (i - run_start) as f64;
        for (k, seg) in segments[run_start..i].iter_mut().enumerate() {
            seg.start = gap_start + k as f64 * slot;
            seg.end = seg.start + slot;
        }
        log::debug!(
            "Fitted {} placeholder lines into [{:.2}, {:.2}]",
            i - run_start,
            gap_start,
            next_start
        );
    }
}

/// Map aligned character entries back onto the original lyric lines.
///
/// Each line becomes one segment spanning its aligned words, with the
/// original punctuated word strings re-attached. Lines with no aligned words
/// get a flagged placeholder right after the previous segment.
pub fn reconstruct_segments(
    entries: &[AlignmentEntry],
    lyrics: &NormalizedLyrics,
    frame_duration: f64,
) -> Vec<Segment> {
    let located = group_words(entries, lyrics, frame_duration);
    let mut per_line: Vec<Vec<WordTimestamp>> = vec![Vec::new(); lyrics.lines.len()];
    for w in located {
        let Some(line) = lyrics.lines.get(w.line) else {
            continue;
        };
        let text = line
            .words
            .get(w.word)
            .map(|s| tidy_punctuation(s))
            .unwrap_or_default();
        per_line[w.line].push(WordTimestamp::new(text, w.start, w.end));
    }

    let mut segments: Vec<Segment> = Vec::with_capacity(lyrics.lines.len());
    let mut placeholders = 0usize;
    for (line, words) in lyrics.lines.iter().zip(per_line) {
        let text = tidy_punctuation(&line.original);
        if words.len() < line.word_count() && !words.is_empty() {
            log::debug!(
                "Line \"{}\": {} of {} words aligned",
                text,
                words.len(),
                line.word_count()
            );
        }
        match Segment::from_words(text.clone(), words) {
            Some(seg) => segments.push(seg),
            None => {
                let prev_end = segments.last().map(|s| s.end).unwrap_or(0.0);
                let start = prev_end + PLACEHOLDER_OFFSET;
                let mut seg = Segment::new(text, start, start + PLACEHOLDER_DURATION, vec![]);
                seg.estimated = true;
                segments.push(seg);
                placeholders += 1;
            }
        }
    }

    if placeholders > 0 {
        fit_placeholders(&mut segments);
        log::warn!(
            "{} of {} lines had no aligned words; using estimated timing",
            placeholders,
            segments.len()
        );
    }
    segments
}
