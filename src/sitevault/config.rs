//! # Configuration
//!
//! Settings live in `sitevault.json` inside the data directory. Every field
//! has a default, so a missing or partial file is fine.
//!
//! Environment variables override the file:
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `SITEVAULT_DATA_DIR` | data directory (also where the config file is read) |
//! | `SITEVAULT_STORAGE` | `file` or `memory` |
//! | `VERCEL` | when set, forces `memory` (serverless, no persistent disk) |
//! | `SITEVAULT_REMOTE_URL` | bootstrap source URL |
//! | `SITEVAULT_API_URL` | base URL of the content API used for drift checks |

use crate::error::{Result, SiteError};
use crate::store::StorageMode;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "sitevault.json";

const DEFAULT_EXAMPLE_PATH: &str = "data/example.json";
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

/// Git-backed copy of the document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SyncConfig {
    /// Working tree of the repository receiving snapshots. Sync is off when unset.
    pub repo_dir: Option<PathBuf>,
    /// Path of the snapshot inside the repository.
    pub data_path: PathBuf,
    pub remote: String,
    pub branch: String,
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            repo_dir: None,
            data_path: PathBuf::from("data/data.json"),
            remote: "origin".to_string(),
            branch: "main".to_string(),
            max_attempts: 3,
            retry_delay_ms: 2_000,
        }
    }
}

impl SyncConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SiteConfig {
    pub storage_mode: StorageMode,
    /// Raw-content URL of the canonical document, used when no local copy exists.
    pub remote_url: Option<String>,
    /// Bundled example document, the last bootstrap source before empty defaults.
    pub example_path: PathBuf,
    pub fetch_timeout_secs: u64,
    /// Base URL of the REST content API (`GET <base>/<collection>`).
    pub api_base_url: Option<String>,
    pub poll_interval_secs: u64,
    pub sync: SyncConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            storage_mode: StorageMode::File,
            remote_url: None,
            example_path: PathBuf::from(DEFAULT_EXAMPLE_PATH),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            api_base_url: None,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            sync: SyncConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Load config from the given directory, or return defaults if not found.
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join(CONFIG_FILENAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)?;
        serde_json::from_str(&content)
            .map_err(|e| SiteError::Config(format!("{}: {}", config_path.display(), e)))
    }

    /// Save config to the given directory.
    pub fn save<P: AsRef<Path>>(&self, config_dir: P) -> Result<()> {
        let config_dir = config_dir.as_ref();

        if !config_dir.exists() {
            fs::create_dir_all(config_dir)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(config_dir.join(CONFIG_FILENAME), content)?;
        Ok(())
    }

    /// Applies environment overrides on top of the loaded values.
    pub fn apply_env(&mut self, env: &HashMap<String, String>) -> Result<()> {
        if let Some(mode) = env.get("SITEVAULT_STORAGE") {
            self.storage_mode = parse_mode(mode)?;
        }
        if env.get("VERCEL").is_some_and(|v| !v.is_empty()) {
            self.storage_mode = StorageMode::Memory;
        }
        if let Some(url) = env.get("SITEVAULT_REMOTE_URL").filter(|v| !v.is_empty()) {
            self.remote_url = Some(url.clone());
        }
        if let Some(url) = env.get("SITEVAULT_API_URL").filter(|v| !v.is_empty()) {
            self.api_base_url = Some(url.clone());
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

pub fn parse_mode(raw: &str) -> Result<StorageMode> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "file" | "fs" => Ok(StorageMode::File),
        "memory" | "mem" => Ok(StorageMode::Memory),
        other => Err(SiteError::Config(format!("unknown storage mode: {}", other))),
    }
}

/// Data directory: explicit override, then `SITEVAULT_DATA_DIR`, then the
/// platform data directory.
pub fn resolve_data_dir(explicit: Option<PathBuf>, env: &HashMap<String, String>) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir);
    }
    if let Some(dir) = env.get("SITEVAULT_DATA_DIR").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    ProjectDirs::from("com", "sitevault", "sitevault")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| SiteError::Config("could not determine a data directory".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_default_config() {
        let config = SiteConfig::default();
        assert_eq!(config.storage_mode, StorageMode::File);
        assert_eq!(config.sync.max_attempts, 3);
        assert_eq!(config.fetch_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_load_missing_config() {
        let dir = TempDir::new().unwrap();
        let config = SiteConfig::load(dir.path()).unwrap();
        assert_eq!(config, SiteConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let mut config = SiteConfig::default();
        config.remote_url = Some("https://example.com/data.json".into());
        config.sync.branch = "content".into();
        config.save(dir.path()).unwrap();

        let loaded = SiteConfig::load(dir.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME), r#"{"storage_mode": "memory"}"#).unwrap();
        let loaded = SiteConfig::load(dir.path()).unwrap();
        assert_eq!(loaded.storage_mode, StorageMode::Memory);
        assert_eq!(loaded.sync, SyncConfig::default());
    }

    #[test]
    fn test_invalid_file_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME), "{").unwrap();
        assert!(matches!(
            SiteConfig::load(dir.path()),
            Err(SiteError::Config(_))
        ));
    }

    #[test]
    fn test_serverless_flag_forces_memory() {
        let mut config = SiteConfig::default();
        config
            .apply_env(&env(&[("SITEVAULT_STORAGE", "file"), ("VERCEL", "1")]))
            .unwrap();
        assert_eq!(config.storage_mode, StorageMode::Memory);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = SiteConfig::default();
        config
            .apply_env(&env(&[
                ("SITEVAULT_STORAGE", "Memory"),
                ("SITEVAULT_REMOTE_URL", "https://raw.example/data.json"),
                ("SITEVAULT_API_URL", ""),
            ]))
            .unwrap();
        assert_eq!(config.storage_mode, StorageMode::Memory);
        assert_eq!(config.remote_url.as_deref(), Some("https://raw.example/data.json"));
        assert_eq!(config.api_base_url, None);
    }

    #[test]
    fn test_bad_mode_is_rejected() {
        let mut config = SiteConfig::default();
        assert!(config.apply_env(&env(&[("SITEVAULT_STORAGE", "s3")])).is_err());
    }

    #[test]
    fn test_data_dir_precedence() {
        let explicit = resolve_data_dir(Some(PathBuf::from("/a")), &env(&[("SITEVAULT_DATA_DIR", "/b")]));
        assert_eq!(explicit.unwrap(), PathBuf::from("/a"));
        let from_env = resolve_data_dir(None, &env(&[("SITEVAULT_DATA_DIR", "/b")]));
        assert_eq!(from_env.unwrap(), PathBuf::from("/b"));
    }
}
