//! Configuration module.
//!
//! Handles loading, validating, and providing default configuration values.
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::indexer::discover::DEFAULT_EXCLUDED_DIRS;
use crate::search::SignalWeights;

pub const DEFAULT_CONFIG_PATH: &str = "codescout.json";

// ── Default value functions ──────────────────────────────────────────

fn default_chunks_path() -> String {
    "./chunks.json".to_string()
}

fn default_db_path() -> String {
    "./vectors.db".to_string()
}

fn default_search_top_k() -> usize {
    10
}

fn default_dimensions() -> usize {
    384
}

fn default_signal_timeout_ms() -> u64 {
    2000
}

fn default_excluded_dirs() -> Vec<String> {
    DEFAULT_EXCLUDED_DIRS.iter().map(|s| s.to_string()).collect()
}

// ── Config struct ────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default = "default_chunks_path")]
    pub chunks_path: String,

    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_search_top_k")]
    pub search_top_k: usize,

    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    #[serde(default = "default_signal_timeout_ms")]
    pub signal_timeout_ms: u64,

    #[serde(default = "default_excluded_dirs")]
    pub excluded_dirs: Vec<String>,

    #[serde(default)]
    pub weights: SignalWeights,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunks_path: default_chunks_path(),
            db_path: default_db_path(),
            search_top_k: default_search_top_k(),
            dimensions: default_dimensions(),
            signal_timeout_ms: default_signal_timeout_ms(),
            excluded_dirs: default_excluded_dirs(),
            weights: SignalWeights::default(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// If the file does not exist, returns a default config and, for the
    /// default path, generates a template file. Invalid JSON falls back to
    /// defaults with a warning.
    pub fn load(config_path: &str) -> Result<Self> {
        let path = if config_path.is_empty() {
            DEFAULT_CONFIG_PATH
        } else {
            config_path
        };

        if !Path::new(path).exists() {
            info!("{path} not found, using defaults");
            let cfg = Self::default();

            if path == DEFAULT_CONFIG_PATH {
                match cfg.save(path) {
                    Ok(()) => info!("Generated config template: {path}"),
                    Err(e) => warn!("Failed to generate config template: {e}"),
                }
            }

            return Ok(cfg);
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;

        let cfg: Config = match serde_json::from_str(&data) {
            Ok(c) => c,
            Err(e) => {
                warn!("Invalid JSON in {path}: {e}");
                warn!("Using default configuration");
                return Ok(Self::default());
            }
        };

        info!("Loaded configuration from {path}");
        Ok(cfg)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &str) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data).with_context(|| format!("failed to write config: {path}"))?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.search_top_k > 0, "search_top_k must be positive");
        anyhow::ensure!(self.dimensions > 0, "dimensions must be positive");
        anyhow::ensure!(
            self.signal_timeout_ms > 0,
            "signal_timeout_ms must be positive"
        );
        anyhow::ensure!(
            !self.chunks_path.trim().is_empty(),
            "chunks_path must not be empty"
        );
        anyhow::ensure!(!self.db_path.trim().is_empty(), "db_path must not be empty");
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────
