//! Text normalizer: lyric lines → flat token stream over the vocabulary.
//!
//! Punctuation is stripped before alignment but the original word strings
//! are kept per line, so displayed text never changes. Every emitted token
//! records which line/word it came from; the reconstructor uses that to map
//! aligned characters back onto lines.

use std::collections::BTreeMap;

use crate::config::Vocabulary;
use crate::error::AlignError;

/// Marks stripped before alignment (they carry no acoustic content).
const PUNCTUATION: &str = ",!।॥|.?;:-()'\"…";

fn is_punctuation(c: char) -> bool {
    PUNCTUATION.contains(c)
}

/// One input line with its word layout.
#[derive(Debug, Clone, PartialEq)]
pub struct LyricLine {
    /// The line exactly as authored
    pub original: String,
    /// Display word per clean word (original punctuation re-attached)
    pub words: Vec<String>,
    /// Punctuation-free words, as aligned
    pub clean_words: Vec<String>,
}

impl LyricLine {
    pub fn parse(line: &str) -> Self {
        let original = line.trim().to_string();
        let mut words: Vec<String> = Vec::new();
        let mut clean_words = Vec::new();

        for raw in original.split_whitespace() {
            let clean: String = raw.chars().filter(|c| !is_punctuation(*c)).collect();
            if clean.is_empty() {
                // Standalone mark ("जय जय !"): keep it on the previous word
                if let Some(prev) = words.last_mut() {
                    prev.push(' ');
                    prev.push_str(raw);
                }
                continue;
            }
            words.push(raw.to_string());
            clean_words.push(clean);
        }

        Self {
            original,
            words,
            clean_words,
        }
    }

    pub fn word_count(&self) -> usize {
        self.clean_words.len()
    }
}

/// Where a token in the flat stream came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenOwner {
    /// Word separator between two words
    Separator,
    Char { line: usize, word: usize },
}

/// Output of normalization, ready for the CTC aligner.
#[derive(Debug, Clone)]
pub struct NormalizedLyrics {
    pub lines: Vec<LyricLine>,
    /// Vocabulary ids, in sung order
    pub tokens: Vec<usize>,
    /// Parallel to `tokens`
    pub owners: Vec<TokenOwner>,
    /// Out-of-vocabulary characters and how often each was dropped
    pub dropped: BTreeMap<char, usize>,
}

impl NormalizedLyrics {
    /// Per-line word counts, as expected by reconstruction.
    pub fn word_counts(&self) -> Vec<usize> {
        self.lines.iter().map(LyricLine::word_count).collect()
    }

    pub fn dropped_count(&self) -> usize {
        self.dropped.values().sum()
    }
}

/// Split raw lyric text into trimmed, non-empty lines.
pub fn split_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Normalize lyric lines into a token stream.
///
/// Characters missing from the vocabulary are dropped (and counted);
/// alignment proceeds on the known-token subsequence. Fails only when there
/// is nothing at all to align.
pub fn normalize_lyrics<S: AsRef<str>>(
    lines: &[S],
    vocab: &Vocabulary,
) -> Result<NormalizedLyrics, AlignError> {
    let lines: Vec<LyricLine> = lines
        .iter()
        .map(|l| LyricLine::parse(l.as_ref()))
        .filter(|l| !l.original.is_empty())
        .collect();

    let total_chars: usize = lines
        .iter()
        .flat_map(|l| l.clean_words.iter())
        .map(|w| w.chars().count())
        .sum();
    if total_chars == 0 {
        return Err(AlignError::EmptyLyrics);
    }

    let mut tokens = Vec::new();
    let mut owners = Vec::new();
    let mut dropped: BTreeMap<char, usize> = BTreeMap::new();

    for (li, line) in lines.iter().enumerate() {
        for (wi, word) in line.clean_words.iter().enumerate() {
            let ids: Vec<usize> = word
                .chars()
                .filter_map(|c| {
                    let id = vocab.lookup(c);
                    if id.is_none() {
                        *dropped.entry(c).or_insert(0) += 1;
                    }
                    id
                })
                .collect();
            if ids.is_empty() {
                continue;
            }

            if !tokens.is_empty() {
                if let Some(sep) = vocab.separator_id() {
                    tokens.push(sep);
                    owners.push(TokenOwner::Separator);
                }
            }
            for id in ids {
                tokens.push(id);
                owners.push(TokenOwner::Char { line: li, word: wi });
            }
        }
    }

    if tokens.is_empty() {
        return Err(AlignError::OutOfVocabulary { chars: total_chars });
    }

    if !dropped.is_empty() {
        let sample: String = dropped.keys().take(10).collect();
        log::warn!(
            "Dropped {} out-of-vocabulary characters ({} distinct: {})",
            dropped.values().sum::<usize>(),
            dropped.len(),
            sample
        );
    }
    log::debug!(
        "Normalized {} lines into {} tokens",
        lines.len(),
        tokens.len()
    );

    Ok(NormalizedLyrics {
        lines,
        tokens,
        owners,
        dropped,
    })
}

/// Collapse doubled marks left behind by upstream punctuation passes.
pub fn tidy_punctuation(text: &str) -> String {
    text.replace("!,", "!").replace(",!", "!").replace(",।", "।")
}
