//! Acoustic frontend interface.
//!
//! The acoustic model itself runs outside this crate. It hands over a
//! per-frame log-probability matrix over its vocabulary plus blank; the
//! [`EmissionFile`] frontend reads that matrix from a JSON export.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::audio::io::audio_duration;
use crate::config::Vocabulary;

/// Row-major `frames × classes` matrix of log-probabilities.
#[derive(Debug, Clone)]
pub struct LogProbMatrix {
    data: Vec<f32>,
    frames: usize,
    classes: usize,
}

impl LogProbMatrix {
    pub fn new(data: Vec<f32>, frames: usize, classes: usize) -> Result<Self> {
        if data.len() != frames * classes {
            bail!(
                "Log-prob matrix has {} values, expected {} frames x {} classes",
                data.len(),
                frames,
                classes
            );
        }
        Ok(Self {
            data,
            frames,
            classes,
        })
    }

    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self> {
        let frames = rows.len();
        let classes = rows.first().map(Vec::len).unwrap_or(0);
        if let Some(bad) = rows.iter().position(|r| r.len() != classes) {
            bail!(
                "Ragged log-prob matrix: frame {} has {} classes, frame 0 has {}",
                bad,
                rows[bad].len(),
                classes
            );
        }
        let data = rows.into_iter().flatten().collect();
        Self::new(data, frames, classes)
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn classes(&self) -> usize {
        self.classes
    }

    pub fn row(&self, t: usize) -> &[f32] {
        &self.data[t * self.classes..(t + 1) * self.classes]
    }
}

/// Everything the CTC aligner needs from the acoustic model.
#[derive(Debug, Clone)]
pub struct Emissions {
    pub log_probs: LogProbMatrix,
    /// Seconds per frame: `audio_duration / frames`
    pub frame_duration: f64,
    pub vocabulary: Vocabulary,
}

impl Emissions {
    pub fn duration(&self) -> f64 {
        self.frame_duration * self.log_probs.frames() as f64
    }
}

/// Source of acoustic emissions for an audio file.
pub trait AcousticFrontend: Send + Sync {
    /// Frontend name for logging and cache keys.
    fn name(&self) -> &str;

    fn emissions(&self, audio_path: &Path) -> Result<Emissions>;
}

#[derive(Debug, Deserialize)]
struct EmissionExport {
    vocabulary: Vec<String>,
    #[serde(default)]
    blank_id: Option<usize>,
    #[serde(default)]
    frame_duration: Option<f64>,
    log_probs: Vec<Vec<f32>>,
}

/// Frontend reading a JSON emission export produced by an external model run.
///
/// Format: `{"vocabulary": [...], "blank_id": n?, "frame_duration": s?,
/// "log_probs": [[...], ...]}`. Without `frame_duration`, the audio file's
/// duration is probed and divided by the frame count.
pub struct EmissionFile {
    path: PathBuf,
}

impl EmissionFile {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl AcousticFrontend for EmissionFile {
    fn name(&self) -> &str {
        "emission-file"
    }

    fn emissions(&self, audio_path: &Path) -> Result<Emissions> {
        let data = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read emissions: {}", self.path.display()))?;
        let export: EmissionExport = serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse emissions: {}", self.path.display()))?;

        let vocabulary = Vocabulary::new(export.vocabulary, export.blank_id)?;
        let log_probs = LogProbMatrix::from_rows(export.log_probs)?;
        if log_probs.frames() == 0 {
            bail!("Emission file has no frames: {}", self.path.display());
        }
        if log_probs.classes() < vocabulary.num_classes() {
            bail!(
                "Emission matrix has {} classes but vocabulary needs {}",
                log_probs.classes(),
                vocabulary.num_classes()
            );
        }

        let frame_duration = match export.frame_duration {
            Some(d) if d > 0.0 => d,
            _ => audio_duration(audio_path)? / log_probs.frames() as f64,
        };

        let emissions = Emissions {
            log_probs,
            frame_duration,
            vocabulary,
        };
        log::info!(
            "{} frames ({:.1}s, {:.1}ms per frame), {} classes",
            emissions.log_probs.frames(),
            emissions.duration(),
            frame_duration * 1000.0,
            emissions.log_probs.classes()
        );
        Ok(emissions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_rows() {
        let m = LogProbMatrix::from_rows(vec![vec![0.0, -1.0], vec![-2.0, -3.0]]).unwrap();
        assert_eq!(m.frames(), 2);
        assert_eq!(m.classes(), 2);
        assert_eq!(m.row(1), &[-2.0, -3.0]);
    }

    #[test]
    fn test_matrix_rejects_ragged() {
        assert!(LogProbMatrix::from_rows(vec![vec![0.0, -1.0], vec![-2.0]]).is_err());
        assert!(LogProbMatrix::new(vec![0.0; 5], 2, 3).is_err());
    }

    #[test]
    fn test_emission_file_with_frame_duration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("emissions.json");
        std::fs::write(
            &path,
            r#"{"vocabulary": [" ", "a"], "frame_duration": 0.04,
                "log_probs": [[-0.1, -3.0, -2.0], [-3.0, -0.1, -2.0]]}"#,
        )
        .unwrap();
        let frontend = EmissionFile::new(&path);
        let em = frontend.emissions(Path::new("unused.wav")).unwrap();
        assert_eq!(em.vocabulary.blank_id(), 2);
        assert_eq!(em.log_probs.frames(), 2);
        assert!((em.duration() - 0.08).abs() < 1e-9);
    }

    #[test]
    fn test_emission_file_duration_from_audio() {
        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join("song.wav");
        crate::audio::io::write_wav(&wav, &vec![0.0; 16000], 16000).unwrap();
        let path = dir.path().join("emissions.json");
        std::fs::write(
            &path,
            r#"{"vocabulary": ["a"], "log_probs": [[-0.1, -1.0], [-0.1, -1.0], [-0.1, -1.0], [-0.1, -1.0]]}"#,
        )
        .unwrap();
        let em = EmissionFile::new(&path).emissions(&wav).unwrap();
        assert!((em.frame_duration - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_emission_file_too_few_classes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("emissions.json");
        std::fs::write(
            &path,
            r#"{"vocabulary": ["a", "b"], "frame_duration": 0.02, "log_probs": [[-0.1, -1.0]]}"#,
        )
        .unwrap();
        assert!(EmissionFile::new(&path).emissions(Path::new("x.wav")).is_err());
    }
}
