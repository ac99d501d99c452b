//! File-based caching for oracle responses.
//!
//! Oracle calls are slow and billed, so raw response text is cached under a
//! key derived from the audio content, the backend model, and the prompt.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

/// Get the cache directory.
///
/// Uses `LYRICTIME_CACHE_DIR` env var if set, otherwise `~/.cache/lyrictime`.
pub fn cache_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("LYRICTIME_CACHE_DIR") {
        return PathBuf::from(dir);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".cache").join("lyrictime")
}

/// Compute SHA-256 hash of a file's contents.
///
/// Returns a 64-character hex string.
pub fn file_hash(path: &Path) -> Result<String> {
    let mut hasher = Sha256::new();
    let mut file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open file for hashing: {}", path.display()))?;
    std::io::copy(&mut file, &mut hasher)?;
    let result = hasher.finalize();
    Ok(format!("{:x}", result))
}

/// Atomically write data to a file via temp file + rename.
pub(crate) fn atomic_write(target: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = target.with_extension("tmp");
    std::fs::write(&tmp_path, data)?;
    std::fs::rename(&tmp_path, target)?;
    Ok(())
}

fn short(hash: &str) -> &str {
    &hash[..12.min(hash.len())]
}

/// Cache of raw oracle responses rooted at one directory.
#[derive(Debug, Clone)]
pub struct OracleCache {
    root: PathBuf,
}

impl OracleCache {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Cache under [`cache_dir`].
    pub fn default_location() -> Self {
        Self::new(cache_dir().join("oracle"))
    }

    /// Key for one request: audio content, model, and prompt all count.
    pub fn key(audio_hash: &str, model: &str, prompt: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(audio_hash.as_bytes());
        hasher.update([0u8]);
        hasher.update(model.as_bytes());
        hasher.update([0u8]);
        hasher.update(prompt.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.txt", key))
    }

    /// Return cached response text, or None if not cached.
    pub fn get(&self, key: &str) -> Option<String> {
        let path = self.path(key);
        let text = std::fs::read_to_string(&path).ok()?;
        if text.trim().is_empty() {
            return None;
        }
        log::info!("Cache hit: oracle response ({}...)", short(key));
        Some(text)
    }

    pub fn store(&self, key: &str, response: &str) -> Result<()> {
        atomic_write(&self.path(key), response.as_bytes())?;
        log::info!("Cached oracle response ({}...)", short(key));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_hash_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.txt");
        std::fs::write(&path, b"hello world").unwrap();

        let h1 = file_hash(&path).unwrap();
        let h2 = file_hash(&path).unwrap();
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn test_file_hash_different_content() {
        let dir = tempfile::tempdir().unwrap();
        let path1 = dir.path().join("a.txt");
        let path2 = dir.path().join("b.txt");
        std::fs::write(&path1, b"hello").unwrap();
        std::fs::write(&path2, b"world").unwrap();

        assert_ne!(file_hash(&path1).unwrap(), file_hash(&path2).unwrap());
    }

    #[test]
    fn test_atomic_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("test.json");

        atomic_write(&path, b"{\"key\": \"value\"}").unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "{\"key\": \"value\"}");
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_key_depends_on_every_part() {
        let base = OracleCache::key("abc", "gemini-2.5-flash", "prompt");
        assert_eq!(base.len(), 64);
        assert_eq!(base, OracleCache::key("abc", "gemini-2.5-flash", "prompt"));
        assert_ne!(base, OracleCache::key("abd", "gemini-2.5-flash", "prompt"));
        assert_ne!(base, OracleCache::key("abc", "gemini-2.0-flash", "prompt"));
        assert_ne!(base, OracleCache::key("abc", "gemini-2.5-flash", "prompt2"));
    }

    #[test]
    fn test_store_and_retrieve() {
        let dir = tempfile::tempdir().unwrap();
        let cache = OracleCache::new(dir.path().to_path_buf());
        let key = OracleCache::key("h", "m", "p");

        assert!(cache.get(&key).is_none());
        cache.store(&key, "[{\"seg_index\": 0}]").unwrap();
        assert_eq!(cache.get(&key).as_deref(), Some("[{\"seg_index\": 0}]"));
    }

    #[test]
    fn test_empty_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = OracleCache::new(dir.path().to_path_buf());
        cache.store("k", "  ").unwrap();
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn test_cache_dir_default() {
        let dir = cache_dir();
        assert!(!dir.to_string_lossy().is_empty());
    }
}
