//! Configuration for one alignment session.
//!
//! Nothing here is process-wide: each aligner is constructed from its own
//! config value, so songs aligned concurrently never share state.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

/// Tokens that act as word separators in CTC vocabularies.
const SEPARATOR_TOKENS: [&str; 3] = [" ", "|", "▁"];

/// The acoustic model's fixed token inventory.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    tokens: Vec<String>,
    index: HashMap<char, usize>,
    blank_id: usize,
    separator_id: Option<usize>,
    uppercase: bool,
}

impl Vocabulary {
    /// Build a vocabulary from the model's token list.
    ///
    /// When `blank_id` is `None` the blank is appended after the last token
    /// (the NeMo convention: `blank = tokens.len()`).
    pub fn new(tokens: Vec<String>, blank_id: Option<usize>) -> Result<Self> {
        if tokens.is_empty() {
            bail!("Vocabulary is empty");
        }
        let blank_id = blank_id.unwrap_or(tokens.len());
        if blank_id > tokens.len() {
            bail!(
                "Blank id {} out of range for vocabulary of {} tokens",
                blank_id,
                tokens.len()
            );
        }

        let mut index = HashMap::new();
        let mut separator_id = None;
        for (i, token) in tokens.iter().enumerate() {
            if i == blank_id {
                continue;
            }
            if SEPARATOR_TOKENS.contains(&token.as_str()) {
                separator_id.get_or_insert(i);
                continue;
            }
            let mut chars = token.chars();
            if let (Some(c), None) = (chars.next(), chars.next()) {
                index.entry(c).or_insert(i);
            }
        }

        let has_upper = index.keys().any(|c| c.is_uppercase());
        let has_lower = index.keys().any(|c| c.is_lowercase());

        Ok(Self {
            tokens,
            index,
            blank_id,
            separator_id,
            uppercase: has_upper && !has_lower,
        })
    }

    pub fn blank_id(&self) -> usize {
        self.blank_id
    }

    pub fn separator_id(&self) -> Option<usize> {
        self.separator_id
    }

    /// Number of classes including the blank.
    pub fn num_classes(&self) -> usize {
        self.tokens.len().max(self.blank_id + 1)
    }

    /// Look up a single character, folding case to match the vocabulary.
    pub fn lookup(&self, c: char) -> Option<usize> {
        if let Some(&id) = self.index.get(&c) {
            return Some(id);
        }
        let folded = if self.uppercase {
            c.to_uppercase().next()
        } else {
            c.to_lowercase().next()
        }?;
        self.index.get(&folded).copied()
    }
}

/// CTC aligner settings: the vocabulary plus model identity.
#[derive(Debug, Clone)]
pub struct AlignConfig {
    pub vocabulary: Vocabulary,
    /// Acoustic model identifier, used for logging and cache keys
    pub model_id: String,
}

impl AlignConfig {
    pub fn new(vocabulary: Vocabulary, model_id: &str) -> Self {
        Self {
            vocabulary,
            model_id: model_id.to_string(),
        }
    }
}

/// Timestamp sanitizer thresholds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SanitizeConfig {
    /// Longest plausible single word (seconds)
    pub word_ceiling: f64,
    /// Lead-in kept before the second word when redistributing (seconds)
    pub lead_in: f64,
    /// Shortest word produced by clamping (seconds)
    pub min_word_duration: f64,
}

impl SanitizeConfig {
    /// Ceiling used for oracle-derived word timing.
    pub fn oracle() -> Self {
        Self {
            word_ceiling: 1.5,
            ..Self::refinement()
        }
    }

    /// Ceiling used for the line-refinement pass over CTC output.
    pub fn refinement() -> Self {
        Self {
            word_ceiling: 3.0,
            lead_in: 0.2,
            min_word_duration: 0.05,
        }
    }
}

impl Default for SanitizeConfig {
    fn default() -> Self {
        Self::refinement()
    }
}

/// Repetition expansion limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RepetitionConfig {
    pub max_repetitions: u32,
    /// Shortest plausible single repetition (seconds); counts implying
    /// shorter repetitions are reduced.
    pub min_repetition_duration: f64,
}

impl Default for RepetitionConfig {
    fn default() -> Self {
        Self {
            max_repetitions: 10,
            min_repetition_duration: 1.0,
        }
    }
}

/// One oracle backend attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackendDescriptor {
    pub model: String,
    pub timeout_secs: u64,
}

impl BackendDescriptor {
    pub fn new(model: &str, timeout_secs: u64) -> Self {
        Self {
            model: model.to_string(),
            timeout_secs,
        }
    }
}

/// External alignment oracle settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OracleConfig {
    /// Tried in order; the first usable response wins
    pub backends: Vec<BackendDescriptor>,
    pub endpoint: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub temperature: f64,
    pub max_output_tokens: u32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            backends: vec![
                BackendDescriptor::new("gemini-2.5-flash", 300),
                BackendDescriptor::new("gemini-2.0-flash", 300),
            ],
            endpoint: "https://generativelanguage.googleapis.com/v1beta/models".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            temperature: 0.1,
            max_output_tokens: 65536,
        }
    }
}

/// Everything a song alignment needs besides the vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub model_id: String,
    /// Sanitizer settings for CTC output
    pub refinement: SanitizeConfig,
    /// Sanitizer settings for oracle output
    pub oracle_sanitize: SanitizeConfig,
    pub repetition: RepetitionConfig,
    pub oracle: OracleConfig,
    /// Ask the oracle for repetition counts on CTC output
    pub detect_repetitions: bool,
    pub use_cache: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model_id: "stt_hi_conformer_ctc_medium".to_string(),
            refinement: SanitizeConfig::refinement(),
            oracle_sanitize: SanitizeConfig::oracle(),
            repetition: RepetitionConfig::default(),
            oracle: OracleConfig::default(),
            detect_repetitions: true,
            use_cache: true,
        }
    }
}

impl PipelineConfig {
    /// Load a JSON config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_vocabulary_nemo_blank() {
        let vocab = Vocabulary::new(tokens(&[" ", "र", "ा", "त"]), None).unwrap();
        assert_eq!(vocab.blank_id(), 4);
        assert_eq!(vocab.separator_id(), Some(0));
        assert_eq!(vocab.num_classes(), 5);
        assert_eq!(vocab.lookup('त'), Some(3));
        assert_eq!(vocab.lookup('x'), None);
    }

    #[test]
    fn test_vocabulary_explicit_blank() {
        let vocab = Vocabulary::new(tokens(&["<pad>", "|", "A", "B"]), Some(0)).unwrap();
        assert_eq!(vocab.blank_id(), 0);
        assert_eq!(vocab.separator_id(), Some(1));
        assert_eq!(vocab.num_classes(), 4);
    }

    #[test]
    fn test_vocabulary_uppercase_folding() {
        let vocab = Vocabulary::new(tokens(&["<pad>", "|", "A", "B"]), Some(0)).unwrap();
        assert_eq!(vocab.lookup('a'), Some(2));
        assert_eq!(vocab.lookup('B'), Some(3));
    }

    #[test]
    fn test_vocabulary_lowercase_folding() {
        let vocab = Vocabulary::new(tokens(&["a", "b"]), None).unwrap();
        assert_eq!(vocab.lookup('A'), Some(0));
    }

    #[test]
    fn test_vocabulary_rejects_bad_blank() {
        assert!(Vocabulary::new(tokens(&["a"]), Some(5)).is_err());
        assert!(Vocabulary::new(vec![], None).is_err());
    }

    #[test]
    fn test_multichar_tokens_not_indexed() {
        let vocab = Vocabulary::new(tokens(&["ab", "c"]), None).unwrap();
        assert_eq!(vocab.lookup('a'), None);
        assert_eq!(vocab.lookup('c'), Some(1));
        assert_eq!(vocab.num_classes(), 3);
    }

    #[test]
    fn test_sanitize_presets() {
        assert!((SanitizeConfig::oracle().word_ceiling - 1.5).abs() < f64::EPSILON);
        assert!((SanitizeConfig::refinement().word_ceiling - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_pipeline_config_partial_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"detect_repetitions": false, "oracle": {"backends": [{"model": "m", "timeout_secs": 5}]}}"#,
        )
        .unwrap();
        let config = PipelineConfig::load(&path).unwrap();
        assert!(!config.detect_repetitions);
        assert_eq!(config.oracle.backends.len(), 1);
        assert_eq!(config.oracle.api_key_env, "GEMINI_API_KEY");
        assert_eq!(config.repetition.max_repetitions, 10);
    }

    #[test]
    fn test_default_backends_ordered() {
        let config = OracleConfig::default();
        assert_eq!(config.backends[0].model, "gemini-2.5-flash");
        assert_eq!(config.backends[1].model, "gemini-2.0-flash");
    }
}
