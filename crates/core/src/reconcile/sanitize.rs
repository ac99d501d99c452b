//! Timestamp sanitizer.
//!
//! Repairs two failure shapes seen from every aligner:
//! - a single word stretched far beyond a plausible duration, and
//! - a long first word followed by the rest of the line bunched at the end,
//!   which happens when an aligner collapses all confidence onto one range.
//!
//! Only word timing changes; segment windows are left alone.

use crate::config::SanitizeConfig;
use crate::types::Segment;

use super::even::spread_words;

/// Tolerance so a word truncated to exactly the ceiling is not re-flagged.
const EPS: f64 = 1e-9;

/// Counts of repairs made in one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SanitizeReport {
    /// Words truncated to the ceiling
    pub truncated: usize,
    /// Segments whose word timing was redistributed
    pub redistributed: usize,
}

impl SanitizeReport {
    pub fn is_clean(&self) -> bool {
        self.truncated == 0 && self.redistributed == 0
    }
}

/// Detect the "long first word, rest bunched at the end" shape.
fn is_bunched(seg: &Segment, ceiling: f64) -> bool {
    if seg.words.len() < 2 {
        return false;
    }
    let first_too_long = seg.words[0].duration() > ceiling + EPS;
    let gap = seg.words[1].start - seg.start;
    first_too_long && gap > seg.duration() / 2.0
}

/// Redistribute all words evenly after a lead-in before the second word.
fn redistribute(seg: &mut Segment, lead_in: f64) -> bool {
    let from = (seg.words[1].start - lead_in).max(seg.start);
    if seg.end - from <= 0.0 {
        return false;
    }
    let texts: Vec<String> = seg.words.iter().map(|w| w.word.clone()).collect();
    let spread = spread_words(&texts, from, seg.end);
    if spread.len() != texts.len() {
        return false;
    }
    seg.words = spread;
    true
}

/// Sanitize one segment, returning what was repaired.
pub fn sanitize_segment(seg: &mut Segment, config: &SanitizeConfig) -> SanitizeReport {
    let mut report = SanitizeReport::default();
    let ceiling = config.word_ceiling;

    if is_bunched(seg, ceiling) && redistribute(seg, config.lead_in) {
        report.redistributed += 1;
    }

    for w in seg.words.iter_mut() {
        if w.duration() > ceiling + EPS {
            w.end = w.start + ceiling;
            report.truncated += 1;
        }
    }
    report
}

/// Sanitize every segment. Idempotent.
pub fn sanitize_segments(segments: &mut [Segment], config: &SanitizeConfig) -> SanitizeReport {
    let mut total = SanitizeReport::default();
    for (i, seg) in segments.iter_mut().enumerate() {
        let r = sanitize_segment(seg, config);
        if !r.is_clean() {
            log::debug!(
                "Segment {} \"{}\": {} truncated, redistributed: {}",
                i,
                seg.text,
                r.truncated,
                r.redistributed > 0
            );
        }
        total.truncated += r.truncated;
        total.redistributed += r.redistributed;
    }
    if !total.is_clean() {
        log::warn!(
            "Sanitized timestamps: {} words truncated to {:.1}s, {} segments redistributed",
            total.truncated,
            config.word_ceiling,
            total.redistributed
        );
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WordTimestamp;

    fn w(word: &str, start: f64, end: f64) -> WordTimestamp {
        WordTimestamp::new(word, start, end)
    }

    fn refinement() -> SanitizeConfig {
        SanitizeConfig::refinement()
    }

    #[test]
    fn test_long_word_truncated_at_start() {
        let mut segs = vec![Segment::new("a", 1.0, 7.0, vec![w("a", 1.0, 7.0)])];
        let report = sanitize_segments(&mut segs, &refinement());
        assert_eq!(report.truncated, 1);
        assert!((segs[0].words[0].start - 1.0).abs() < f64::EPSILON);
        assert!((segs[0].words[0].end - 4.0).abs() < 1e-9);
        assert!((segs[0].start - 1.0).abs() < f64::EPSILON);
        assert!((segs[0].end - 7.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_oracle_ceiling_is_tighter() {
        let mut segs = vec![Segment::new("a", 0.0, 3.0, vec![w("a", 0.0, 2.0)])];
        sanitize_segments(&mut segs, &SanitizeConfig::oracle());
        assert!((segs[0].words[0].end - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_bunched_words_redistributed() {
        // First word swallows 8s, the rest crowd into the last second.
        let mut segs = vec![Segment::new(
            "a b c",
            0.0,
            10.0,
            vec![w("a", 0.0, 8.0), w("b", 9.0, 9.4), w("c", 9.5, 10.0)],
        )];
        let report = sanitize_segments(&mut segs, &refinement());
        assert_eq!(report.redistributed, 1);

        let words = &segs[0].words;
        assert_eq!(words.len(), 3);
        assert!((words[0].start - 8.8).abs() < 1e-9);
        assert!((words[2].end - (10.0 - 0.03)).abs() < 1e-9);
        let names: Vec<&str> = words.iter().map(|w| w.word.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        for w in words {
            assert!(w.start >= 0.0 && w.end <= 10.0);
            assert!(w.duration() <= 3.0 + 1e-9);
        }
    }

    #[test]
    fn test_long_first_word_without_bunching_only_truncated() {
        let mut segs = vec![Segment::new(
            "a b",
            0.0,
            10.0,
            vec![w("a", 0.0, 4.0), w("b", 4.0, 5.0)],
        )];
        let report = sanitize_segments(&mut segs, &refinement());
        assert_eq!(report.redistributed, 0);
        assert_eq!(report.truncated, 1);
        assert!((segs[0].words[1].start - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_redistribution_respects_ceiling() {
        let mut segs = vec![Segment::new(
            "a b",
            0.0,
            20.0,
            vec![w("a", 0.0, 10.0), w("b", 11.0, 12.0)],
        )];
        sanitize_segments(&mut segs, &refinement());
        for w in &segs[0].words {
            assert!(w.duration() <= 3.0 + 1e-9);
            assert!(w.start >= 0.0 && w.end <= 20.0);
        }
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let cases = vec![
            Segment::new("a", 1.0, 7.0, vec![w("a", 1.0, 7.0)]),
            Segment::new(
                "a b c",
                0.0,
                10.0,
                vec![w("a", 0.0, 8.0), w("b", 9.0, 9.4), w("c", 9.5, 10.0)],
            ),
            Segment::new("a b", 0.0, 20.0, vec![w("a", 0.0, 10.0), w("b", 11.0, 12.0)]),
            Segment::new("a b", 5.0, 6.0, vec![w("a", 5.0, 5.4), w("b", 5.5, 6.0)]),
            Segment::new("x", 0.0, 1.0, vec![]),
        ];
        for config in [SanitizeConfig::refinement(), SanitizeConfig::oracle()] {
            let mut once = cases.clone();
            sanitize_segments(&mut once, &config);
            let mut twice = once.clone();
            let second = sanitize_segments(&mut twice, &config);
            assert_eq!(once, twice);
            assert!(second.is_clean());
        }
    }

    #[test]
    fn test_clean_segments_untouched() {
        let words = vec![w("a", 5.0, 5.4), w("b", 5.5, 6.0)];
        let original = vec![Segment::new("a b", 5.0, 6.0, words)];
        let mut segs = original.clone();
        assert!(sanitize_segments(&mut segs, &refinement()).is_clean());
        assert_eq!(segs, original);
    }
}
