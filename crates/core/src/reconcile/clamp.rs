//! Per-word boundary clamping into an owning time window.
//!
//! Shared by every aligner: CTC output, oracle output, and repetition
//! sub-windows all pass through here.

use crate::types::WordTimestamp;

/// Tolerance for duration comparisons.
const EPS: f64 = 1e-9;

/// Clamp words into `[start, end]`, order them, and remove overlaps.
///
/// Each word keeps at least `min_duration` where the window allows.
/// Words with non-finite times are discarded, as are words squeezed out
/// entirely by their predecessors.
pub fn clamp_words(
    words: &[WordTimestamp],
    start: f64,
    end: f64,
    min_duration: f64,
) -> Vec<WordTimestamp> {
    let mut clamped: Vec<WordTimestamp> = words
        .iter()
        .filter(|w| w.start.is_finite() && w.end.is_finite())
        .map(|w| {
            let (ws, we) = clamp_interval(w.start, w.end, start, end, min_duration);
            WordTimestamp::new(w.word.clone(), ws, we)
        })
        .collect();

    clamped.sort_by(|a, b| a.start.total_cmp(&b.start));

    let mut out: Vec<WordTimestamp> = Vec::with_capacity(clamped.len());
    for mut w in clamped {
        if let Some(prev) = out.last_mut() {
            if w.start < prev.end {
                if w.start > prev.start {
                    prev.end = w.start;
                } else {
                    w.start = prev.end;
                    w.end = w.end.max((w.start + min_duration).min(end));
                }
            }
        }
        if w.end > w.start {
            out.push(w);
        } else {
            log::debug!("Dropped word \"{}\": no room left in window", w.word);
        }
    }
    out
}

/// Clamp one interval into a window, keeping `min_duration` when possible.
fn clamp_interval(ws: f64, we: f64, start: f64, end: f64, min_duration: f64) -> (f64, f64) {
    let mut ws = ws.clamp(start, end);
    let mut we = we.clamp(start, end);
    if we - ws < min_duration - EPS {
        we = (ws + min_duration).min(end);
        if we - ws < min_duration - EPS {
            ws = (we - min_duration).max(start);
        }
    }
    (ws, we)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(word: &str, start: f64, end: f64) -> WordTimestamp {
        WordTimestamp::new(word, start, end)
    }

    #[test]
    fn test_words_inside_window_untouched() {
        let words = vec![w("a", 1.0, 1.4), w("b", 1.5, 2.0)];
        assert_eq!(clamp_words(&words, 1.0, 3.0, 0.05), words);
    }

    #[test]
    fn test_words_clamped_into_window() {
        let out = clamp_words(&[w("a", 0.2, 1.4), w("b", 2.8, 4.0)], 1.0, 3.0, 0.05);
        assert!((out[0].start - 1.0).abs() < f64::EPSILON);
        assert!((out[1].end - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_minimum_duration_near_window_end() {
        let out = clamp_words(&[w("a", 5.0, 5.0)], 1.0, 3.0, 0.05);
        assert!((out[0].end - 3.0).abs() < 1e-9);
        assert!((out[0].start - 2.95).abs() < 1e-9);
    }

    #[test]
    fn test_inverted_word_repaired() {
        let out = clamp_words(&[w("a", 2.0, 1.5)], 1.0, 3.0, 0.05);
        assert!(out[0].end > out[0].start);
        assert!((out[0].start - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_sorted_and_non_overlapping() {
        let out = clamp_words(
            &[w("c", 2.0, 2.5), w("a", 1.0, 1.8), w("b", 1.5, 2.2)],
            1.0,
            3.0,
            0.05,
        );
        let names: Vec<&str> = out.iter().map(|w| w.word.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        for pair in out.windows(2) {
            assert!(pair[0].end <= pair[1].start);
        }
        assert!((out[0].end - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_identical_starts_pushed_forward() {
        let out = clamp_words(&[w("a", 1.0, 1.5), w("b", 1.0, 1.2)], 1.0, 3.0, 0.05);
        assert_eq!(out.len(), 2);
        assert!((out[1].start - 1.5).abs() < 1e-9);
        assert!((out[1].end - 1.55).abs() < 1e-9);
    }

    #[test]
    fn test_non_finite_words_dropped() {
        let out = clamp_words(&[w("a", f64::NAN, 1.0), w("b", 1.0, 1.2)], 0.0, 3.0, 0.05);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].word, "b");
    }

    #[test]
    fn test_clamp_is_idempotent() {
        let words = vec![w("x", -1.0, 0.5), w("y", 0.4, 0.4), w("z", 2.9, 9.0)];
        let once = clamp_words(&words, 0.0, 3.0, 0.05);
        let twice = clamp_words(&once, 0.0, 3.0, 0.05);
        assert_eq!(once, twice);
    }
}
