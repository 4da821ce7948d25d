//! Layered configuration for stylometer
//!
//! Sources, lowest to highest priority:
//! 1. Built-in defaults
//! 2. User config (`~/.config/stylometer/config.toml`)
//! 3. Project config (`stylometer.toml` in the working directory)
//! 4. Environment variables (`STYLOMETER_WORKERS`, `STYLOMETER_TOP_K`)
//!
//! Command-line flags are applied on top by the CLI.

use crate::classifier::{GbdtConfig, DEFAULT_TOP_K};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name looked up in the working directory
pub const PROJECT_CONFIG_FILE: &str = "stylometer.toml";

pub const ENV_WORKERS: &str = "STYLOMETER_WORKERS";
pub const ENV_TOP_K: &str = "STYLOMETER_TOP_K";

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct StylometerConfig {
    #[serde(default)]
    pub extract: ExtractSection,

    #[serde(default)]
    pub predict: PredictSection,

    #[serde(default)]
    pub train: TrainSection,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ExtractSection {
    /// Worker threads for batch extraction (0 or unset = one per core)
    pub workers: Option<usize>,

    /// Show a progress bar on stderr
    pub progress: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct PredictSection {
    /// Labels reported per sample
    pub top_k: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TrainSection {
    pub num_trees: Option<usize>,
    pub max_depth: Option<u32>,
    pub learning_rate: Option<f64>,
}

impl StylometerConfig {
    /// Load config from all file and environment sources
    pub fn load() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::load_layers(
            Self::user_config_path().as_deref(),
            &cwd.join(PROJECT_CONFIG_FILE),
            |key| std::env::var(key).ok(),
        )
    }

    /// Load from explicit layer paths and an environment lookup.
    ///
    /// A file that is missing is skipped; one that fails to parse is
    /// logged and skipped.
    pub fn load_layers(
        user_path: Option<&Path>,
        project_path: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let mut config = StylometerConfig::default();

        for path in user_path.into_iter().chain(std::iter::once(project_path)) {
            if !path.exists() {
                continue;
            }
            match Self::from_file(path) {
                Ok(layer) => {
                    debug!("Loaded config from {}", path.display());
                    config.merge(layer);
                }
                Err(e) => warn!("Failed to load {}: {:#}", path.display(), e),
            }
        }

        config.apply_env(env);
        config
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: StylometerConfig = toml::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    /// Get the user config file path
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("stylometer").join("config.toml"))
    }

    /// Merge another config into this one (other takes priority)
    fn merge(&mut self, other: StylometerConfig) {
        if other.extract.workers.is_some() {
            self.extract.workers = other.extract.workers;
        }
        if other.extract.progress.is_some() {
            self.extract.progress = other.extract.progress;
        }
        if other.predict.top_k.is_some() {
            self.predict.top_k = other.predict.top_k;
        }
        if other.train.num_trees.is_some() {
            self.train.num_trees = other.train.num_trees;
        }
        if other.train.max_depth.is_some() {
            self.train.max_depth = other.train.max_depth;
        }
        if other.train.learning_rate.is_some() {
            self.train.learning_rate = other.train.learning_rate;
        }
    }

    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = env(ENV_WORKERS) {
            match raw.trim().parse() {
                Ok(n) => self.extract.workers = Some(n),
                Err(_) => warn!("Ignoring {}={:?}: not a number", ENV_WORKERS, raw),
            }
        }
        if let Some(raw) = env(ENV_TOP_K) {
            match raw.trim().parse() {
                Ok(k) => self.predict.top_k = Some(k),
                Err(_) => warn!("Ignoring {}={:?}: not a number", ENV_TOP_K, raw),
            }
        }
    }

    /// Worker threads, 0 meaning one per core
    pub fn workers(&self) -> usize {
        self.extract.workers.unwrap_or(0)
    }

    pub fn progress(&self) -> bool {
        self.extract.progress.unwrap_or(true)
    }

    pub fn top_k(&self) -> usize {
        self.predict.top_k.unwrap_or(DEFAULT_TOP_K)
    }

    /// GBDT hyperparameters with defaults for unset keys
    pub fn gbdt(&self) -> GbdtConfig {
        let defaults = GbdtConfig::default();
        GbdtConfig {
            num_trees: self.train.num_trees.unwrap_or(defaults.num_trees),
            max_depth: self.train.max_depth.unwrap_or(defaults.max_depth),
            learning_rate: self.train.learning_rate.unwrap_or(defaults.learning_rate),
        }
    }
}
