//! Repository configuration stored at `.twig/config.json`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::TwigResult;
use crate::fsutil::atomic_write;
use crate::refs::validate_branch_name;

/// Per-repository settings. Every field has a default, so an empty or
/// missing file is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoConfig {
    /// Branch created by `init`.
    pub default_branch: String,
    /// How long mutating commands wait for the repository lock.
    pub lock_timeout_ms: u64,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            default_branch: "master".to_string(),
            lock_timeout_ms: 5000,
        }
    }
}

impl RepoConfig {
    pub fn load(path: &Path) -> TwigResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path)?;
        let config: RepoConfig = serde_json::from_str(&data)?;
        validate_branch_name(&config.default_branch)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> TwigResult<()> {
        let data = serde_json::to_string_pretty(self)?;
        atomic_write(path, data.as_bytes())
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempdir().unwrap();
        let config = RepoConfig::load(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, RepoConfig::default());
        assert_eq!(config.lock_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"default_branch": "main"}"#).unwrap();

        let config = RepoConfig::load(&path).unwrap();
        assert_eq!(config.default_branch, "main");
        assert_eq!(config.lock_timeout_ms, 5000);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = RepoConfig {
            default_branch: "trunk".into(),
            lock_timeout_ms: 250,
        };
        config.save(&path).unwrap();
        assert_eq!(RepoConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_bad_default_branch_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"default_branch": "a/b"}"#).unwrap();
        assert!(RepoConfig::load(&path).is_err());
    }
}
