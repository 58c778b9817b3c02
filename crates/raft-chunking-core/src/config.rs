//! Configuration for chunked submission.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $RAFT_CHUNKING_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/raft-chunking/config.toml
//!   3. ~/.config/raft-chunking/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::wire::SUGGESTED_MAX_DATA_SIZE;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Largest chunk payload in bytes. Clamped to 1..=SUGGESTED_MAX_DATA_SIZE.
    pub max_chunk_size: usize,
    /// Per-chunk apply timeout in milliseconds. Not a total deadline.
    pub apply_timeout_ms: u64,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: SUGGESTED_MAX_DATA_SIZE,
            apply_timeout_ms: 10_000,
        }
    }
}

impl ChunkingConfig {
    /// Effective chunk size.
    pub fn chunk_size(&self) -> usize {
        self.max_chunk_size.clamp(1, SUGGESTED_MAX_DATA_SIZE)
    }

    pub fn apply_timeout(&self) -> Duration {
        Duration::from_millis(self.apply_timeout_ms)
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("raft-chunking")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl ChunkingConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::file_path())
    }

    /// Load from an explicit path, still honouring env overrides.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))?
        } else {
            ChunkingConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("RAFT_CHUNKING_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config to `path` if nothing is there. Returns the path.
    pub fn write_default_if_missing(path: PathBuf) -> Result<PathBuf, ConfigError> {
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&ChunkingConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply RAFT_CHUNKING__* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("RAFT_CHUNKING__MAX_CHUNK_SIZE") {
            if let Ok(n) = v.parse() {
                self.max_chunk_size = n;
            }
        }
        if let Ok(v) = std::env::var("RAFT_CHUNKING__APPLY_TIMEOUT_MS") {
            if let Ok(n) = v.parse() {
                self.apply_timeout_ms = n;
            }
        }
    }
}
