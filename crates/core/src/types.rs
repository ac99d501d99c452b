use serde::{Deserialize, Serialize};

/// A single sung word with timing, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WordTimestamp {
    pub word: String,
    pub start: f64,
    pub end: f64,
}

impl WordTimestamp {
    pub fn new(word: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            word: word.into(),
            start,
            end,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// One lyric line with its time window and word timings.
///
/// This is the unit persisted to `lyrics.json` and consumed by the renderer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Segment {
    /// Original (punctuated) lyric line
    pub text: String,
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub words: Vec<WordTimestamp>,
    /// Set when timing is a bounded estimate rather than aligned evidence.
    #[serde(skip)]
    pub estimated: bool,
}

impl Segment {
    pub fn new(text: impl Into<String>, start: f64, end: f64, words: Vec<WordTimestamp>) -> Self {
        Self {
            text: text.into(),
            start,
            end,
            words,
            estimated: false,
        }
    }

    /// Build a segment whose window is exactly the span of its words.
    ///
    /// Returns `None` when `words` is empty.
    pub fn from_words(text: impl Into<String>, words: Vec<WordTimestamp>) -> Option<Self> {
        if words.is_empty() {
            return None;
        }
        let start = words.iter().map(|w| w.start).fold(f64::INFINITY, f64::min);
        let end = words.iter().map(|w| w.end).fold(f64::NEG_INFINITY, f64::max);
        Some(Self::new(text, start, end, words))
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// The contiguous frame range assigned to one target token.
///
/// `end_frame` is inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignmentEntry {
    /// Index into the target token sequence (not the vocabulary)
    pub token_index: usize,
    pub start_frame: usize,
    pub end_frame: usize,
}

impl AlignmentEntry {
    /// Convert to a `[start, end)` interval in seconds.
    pub fn to_seconds(&self, frame_duration: f64) -> (f64, f64) {
        (
            self.start_frame as f64 * frame_duration,
            (self.end_frame + 1) as f64 * frame_duration,
        )
    }
}

/// Which aligner produced a candidate timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// CTC forced alignment over acoustic model output
    Ctc,
    /// External multimodal alignment service
    Oracle,
    /// Evenly distributed synthetic timing
    Even,
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Origin::Ctc => "ctc",
            Origin::Oracle => "oracle",
            Origin::Even => "even",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_duration() {
        let w = WordTimestamp::new("जय", 1.0, 1.5);
        assert!((w.duration() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_segment_from_words_spans_words() {
        let seg = Segment::from_words(
            "जय जय",
            vec![
                WordTimestamp::new("जय", 2.0, 2.4),
                WordTimestamp::new("जय", 2.5, 3.1),
            ],
        )
        .unwrap();
        assert!((seg.start - 2.0).abs() < f64::EPSILON);
        assert!((seg.end - 3.1).abs() < f64::EPSILON);
        assert!(!seg.estimated);
    }

    #[test]
    fn test_segment_from_no_words() {
        assert!(Segment::from_words("x", vec![]).is_none());
    }

    #[test]
    fn test_entry_to_seconds() {
        let e = AlignmentEntry { token_index: 0, start_frame: 10, end_frame: 11 };
        let (s, end) = e.to_seconds(0.04);
        assert!((s - 0.4).abs() < 1e-9);
        assert!((end - 0.48).abs() < 1e-9);
    }

    #[test]
    fn test_segment_serde_shape() {
        let seg = Segment::new("a", 0.0, 1.0, vec![WordTimestamp::new("a", 0.0, 0.5)]);
        let value = serde_json::to_value(&seg).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 4);
        assert!(obj.contains_key("words"));
        assert!(!obj.contains_key("estimated"));
        assert_eq!(value["words"][0]["word"], "a");
    }

    #[test]
    fn test_segment_deserialize_without_words() {
        let seg: Segment = serde_json::from_str(r#"{"text":"x","start":1.0,"end":2.0}"#).unwrap();
        assert!(seg.words.is_empty());
    }

    #[test]
    fn test_origin_display() {
        assert_eq!(Origin::Ctc.to_string(), "ctc");
        assert_eq!(serde_json::to_string(&Origin::Oracle).unwrap(), "\"oracle\"");
    }
}
