//! Repetition expansion for choruses and refrains.
//!
//! A segment whose line is sung `n` times is split into `n` equal
//! sub-windows carrying the same text. The first sub-window reuses the
//! first-occurrence word timings (clamped); the others get even timing.

use crate::config::RepetitionConfig;
use crate::types::{Segment, WordTimestamp};

use super::clamp::clamp_words;
use super::even::even_words;

/// What is known about how one segment repeats.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepetitionPlan {
    /// Raw repetition count as reported; clamped before use
    pub count: i64,
    /// Word timings for the first occurrence, if any
    pub words: Option<Vec<WordTimestamp>>,
}

impl RepetitionPlan {
    pub fn once() -> Self {
        Self {
            count: 1,
            words: None,
        }
    }

    pub fn new(count: i64, words: Option<Vec<WordTimestamp>>) -> Self {
        Self { count, words }
    }
}

/// Clamp a reported repetition count into `[1, max_repetitions]`.
pub fn clamp_count(raw: i64, config: &RepetitionConfig) -> u32 {
    raw.clamp(1, config.max_repetitions.max(1) as i64) as u32
}

/// Reduce a count whose repetitions would be implausibly short.
fn plausible_count(count: u32, duration: f64, config: &RepetitionConfig) -> u32 {
    if count <= 1 || config.min_repetition_duration <= 0.0 {
        return count;
    }
    if duration / count as f64 >= config.min_repetition_duration {
        return count;
    }
    let reduced = ((duration / config.min_repetition_duration).floor() as u32).clamp(1, count);
    log::warn!(
        "Repetition count {} implies {:.2}s per repetition; reduced to {}",
        count,
        duration / count as f64,
        reduced
    );
    reduced
}

/// Expand segments according to their repetition plans.
///
/// `plans` is parallel to `segments`; segments without a plan are kept as
/// they are. Output order follows input order, with each segment's
/// sub-segments contiguous and time-ordered.
pub fn expand_repetitions(
    segments: Vec<Segment>,
    plans: &[RepetitionPlan],
    config: &RepetitionConfig,
    min_word_duration: f64,
) -> Vec<Segment> {
    let before = segments.len();
    let mut expanded = Vec::with_capacity(segments.len());

    for (i, mut seg) in segments.into_iter().enumerate() {
        let Some(plan) = plans.get(i) else {
            expanded.push(seg);
            continue;
        };
        let duration = seg.duration();
        let count = plausible_count(clamp_count(plan.count, config), duration, config);
        let first_words = plan.words.as_deref().filter(|w| !w.is_empty());

        if count <= 1 {
            if let Some(words) = first_words {
                seg.words = clamp_words(words, seg.start, seg.end, min_word_duration);
            }
            expanded.push(seg);
            continue;
        }

        let rep_duration = duration / count as f64;
        log::info!(
            "Segment {}: \"{}\" -> {}x ({:.1}s each)",
            i,
            seg.text,
            count,
            rep_duration
        );
        for r in 0..count {
            let rep_start = seg.start + r as f64 * rep_duration;
            let rep_end = if r + 1 == count {
                seg.end
            } else {
                seg.start + (r + 1) as f64 * rep_duration
            };
            let words = match first_words {
                Some(words) if r == 0 => clamp_words(words, rep_start, rep_end, min_word_duration),
                _ => even_words(&seg.text, rep_start, rep_end),
            };
            let mut sub = Segment::new(seg.text.clone(), rep_start, rep_end, words);
            sub.estimated = seg.estimated || r > 0 || first_words.is_none();
            expanded.push(sub);
        }
    }

    if expanded.len() != before {
        log::info!("Repetitions: {} segments -> {} segments", before, expanded.len());
    }
    expanded
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RepetitionConfig {
        RepetitionConfig::default()
    }

    #[test]
    fn test_chorus_split_in_two() {
        let seg = Segment::new("जय जय", 10.0, 16.0, vec![]);
        let out = expand_repetitions(vec![seg], &[RepetitionPlan::new(2, None)], &config(), 0.05);
        assert_eq!(out.len(), 2);
        assert!((out[0].start - 10.0).abs() < 1e-9);
        assert!((out[0].end - 13.0).abs() < 1e-9);
        assert!((out[1].start - 13.0).abs() < 1e-9);
        assert!((out[1].end - 16.0).abs() < 1e-9);
        assert!(out.iter().all(|s| s.text == "जय जय"));
        assert_eq!(out[1].words.len(), 2);
    }

    #[test]
    fn test_sub_windows_cover_exactly() {
        for n in 1..=10i64 {
            let seg = Segment::new("a b c", 3.3, 17.9, vec![]);
            let plan = RepetitionPlan::new(n, None);
            let out = expand_repetitions(vec![seg], &[plan], &config(), 0.05);
            assert_eq!(out.len(), n as usize);
            assert!((out[0].start - 3.3).abs() < 1e-12);
            assert!((out.last().unwrap().end - 17.9).abs() < 1e-12);
            let d = 14.6 / n as f64;
            for pair in out.windows(2) {
                assert!((pair[0].end - pair[1].start).abs() < 1e-12);
            }
            for s in &out {
                assert!((s.duration() - d).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_first_repetition_uses_oracle_words() {
        let seg = Segment::new("जय जय", 10.0, 16.0, vec![]);
        let oracle = vec![
            WordTimestamp::new("जय", 10.2, 10.8),
            WordTimestamp::new("जय", 11.0, 14.5),
        ];
        let plan = RepetitionPlan::new(2, Some(oracle));
        let out = expand_repetitions(vec![seg], &[plan], &config(), 0.05);
        assert!((out[0].words[0].start - 10.2).abs() < 1e-9);
        // Second oracle word is clamped into the first sub-window
        assert!((out[0].words[1].end - 13.0).abs() < 1e-9);
        assert!(!out[0].estimated);
        assert!(out[1].estimated);
        assert!(out[1].words.iter().all(|w| w.start >= 13.0 && w.end <= 16.0));
    }

    #[test]
    fn test_count_clamped_to_band() {
        let c = config();
        assert_eq!(clamp_count(0, &c), 1);
        assert_eq!(clamp_count(-4, &c), 1);
        assert_eq!(clamp_count(3, &c), 3);
        assert_eq!(clamp_count(500, &c), 10);
    }

    #[test]
    fn test_hallucinated_count_is_bounded() {
        let seg = Segment::new("la", 0.0, 100.0, vec![]);
        let plan = RepetitionPlan::new(1000, None);
        let out = expand_repetitions(vec![seg], &[plan], &config(), 0.05);
        assert_eq!(out.len(), 10);
    }

    #[test]
    fn test_implausibly_short_repetitions_reduced() {
        let seg = Segment::new("la", 0.0, 2.5, vec![]);
        let out = expand_repetitions(vec![seg], &[RepetitionPlan::new(8, None)], &config(), 0.05);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_single_occurrence_applies_clamped_words() {
        let seg = Segment::new("a b", 1.0, 3.0, vec![]);
        let words = vec![WordTimestamp::new("a", 0.5, 1.5), WordTimestamp::new("b", 2.0, 3.5)];
        let plan = RepetitionPlan::new(1, Some(words));
        let out = expand_repetitions(vec![seg], &[plan], &config(), 0.05);
        assert_eq!(out.len(), 1);
        assert!((out[0].words[0].start - 1.0).abs() < 1e-9);
        assert!((out[0].words[1].end - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_global_order_preserved() {
        let segs = vec![
            Segment::new("one", 0.0, 4.0, vec![]),
            Segment::new("two", 4.0, 10.0, vec![]),
            Segment::new("three", 10.0, 12.0, vec![]),
        ];
        let plans = vec![RepetitionPlan::once(), RepetitionPlan::new(3, None)];
        let out = expand_repetitions(segs, &plans, &config(), 0.05);
        let texts: Vec<&str> = out.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "two", "two", "two", "three"]);
        for pair in out.windows(2) {
            assert!(pair[0].start <= pair[1].start);
        }
    }
}
