//! Configuration module for visflow
//!
//! This module handles engine configuration:
//! - Background job pool size
//! - Evaluation limits and report logging
//! - Log filter and optional log file directory
//!
//! # Config Location
//!
//! The default config file lives in the platform-appropriate location:
//! - **Linux**: `~/.config/dev.visflow/visflow.toml`
//! - **macOS**: `~/Library/Application Support/dev.visflow/visflow.toml`
//! - **Windows**: `%APPDATA%\dev.visflow\visflow.toml`
//!
//! Files ending in `.toml` are parsed as TOML, everything else as JSON.
//!
//! # Example
//!
//! ```ignore
//! use visflow::config::EngineConfig;
//!
//! let config = EngineConfig::load_or_default(EngineConfig::default_path()?);
//! let network = Network::with_config(&config);
//! ```

use crate::error::{Result, VisFlowError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for config directories
pub const APP_ID: &str = "dev.visflow";

/// Config filename
pub const CONFIG_FILE: &str = "visflow.toml";

/// Default number of background job threads (0 = run jobs inline)
pub const DEFAULT_WORKER_THREADS: usize = 2;

/// Default upper bound on evaluations in `run_until_idle`
pub const DEFAULT_MAX_PASSES: usize = 16;

/// Default tracing filter
pub const DEFAULT_LOG_FILTER: &str = "info,visflow=debug";

// ==================== Config Directory ====================

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID))
}

// ==================== Jobs ====================

/// Background job pool settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Worker threads; 0 runs every job on the evaluating thread
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
}

fn default_worker_threads() -> usize {
    DEFAULT_WORKER_THREADS
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            worker_threads: DEFAULT_WORKER_THREADS,
        }
    }
}

// ==================== Evaluation ====================

/// Evaluator settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Maximum evaluations per `run_until_idle` call
    #[serde(default = "default_max_passes")]
    pub max_passes: usize,

    /// Log a summary line after every evaluation
    #[serde(default)]
    pub log_reports: bool,
}

fn default_max_passes() -> usize {
    DEFAULT_MAX_PASSES
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            max_passes: DEFAULT_MAX_PASSES,
            log_reports: false,
        }
    }
}

// ==================== Logging ====================

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_filter")]
    pub filter: String,

    /// Write daily rolling log files here in addition to stderr
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            directory: None,
        }
    }
}

// ==================== Engine Config ====================

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub jobs: JobsConfig,

    #[serde(default)]
    pub evaluation: EvaluationConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Default config file path
    pub fn default_path() -> Result<PathBuf> {
        config_dir()
            .map(|dir| dir.join(CONFIG_FILE))
            .ok_or_else(|| VisFlowError::Config("Could not determine config directory".to_string()))
    }

    /// Load a config file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            VisFlowError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        if is_toml(path) {
            toml::from_str(&content).map_err(|e| {
                VisFlowError::Config(format!("Failed to parse config file {:?}: {}", path, e))
            })
        } else {
            serde_json::from_str(&content).map_err(|e| {
                VisFlowError::Config(format!("Failed to parse config file {:?}: {}", path, e))
            })
        }
    }

    /// Load a config file, returning defaults if it is missing or invalid
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save the config to disk, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                VisFlowError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = if is_toml(path) {
            toml::to_string_pretty(self)
                .map_err(|e| VisFlowError::Config(format!("Failed to serialize config: {}", e)))?
        } else {
            serde_json::to_string_pretty(self)
                .map_err(|e| VisFlowError::Config(format!("Failed to serialize config: {}", e)))?
        };

        std::fs::write(path, content).map_err(|e| {
            VisFlowError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.jobs.worker_threads, DEFAULT_WORKER_THREADS);
        assert_eq!(config.evaluation.max_passes, DEFAULT_MAX_PASSES);
        assert_eq!(config.logging.filter, DEFAULT_LOG_FILTER);
        assert!(config.logging.directory.is_none());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: EngineConfig = toml::from_str("[jobs]\nworker_threads = 0\n").unwrap();
        assert_eq!(config.jobs.worker_threads, 0);
        assert_eq!(config.evaluation, EvaluationConfig::default());
    }

    #[test]
    fn test_save_load_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let mut config = EngineConfig::default();
        config.evaluation.log_reports = true;
        config.logging.directory = Some(dir.path().join("logs"));
        config.save(&path).unwrap();

        assert_eq!(EngineConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_save_load_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("visflow.json");

        let mut config = EngineConfig::default();
        config.jobs.worker_threads = 8;
        config.save(&path).unwrap();

        assert_eq!(EngineConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_load_or_default_on_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "jobs = [not valid").unwrap();

        assert!(EngineConfig::load(&path).is_err());
        assert_eq!(EngineConfig::load_or_default(&path), EngineConfig::default());
    }
}
