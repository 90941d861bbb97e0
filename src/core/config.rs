//! # Configuration Module
//!
//! Compiler settings: where the sources live, which bundles they depend on, what kind
//! of bundle to produce and where to write it.
//!
//! ## Key Features
//! - YAML/JSON configuration parsing with serde
//! - Environment variable override support (`BUNDLER_*`)
//! - Validation that reports every problem at once

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::bundle::BundleMode;
use crate::core::error::{BundleError, BundleResult};
use crate::core::ids::IdGeneration;
use crate::observability::config::LogConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Complete configuration for one compiler run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Source directory of the bundle being compiled
    pub source_dir: PathBuf,

    /// Where the bundle document is written
    pub output_file: PathBuf,

    /// Source directories of bundles this bundle may reference
    pub dependency_dirs: Vec<PathBuf>,

    pub mode: BundleMode,

    pub id_generation: IdGeneration,

    pub logging: LogConfig,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("src/main/gateway"),
            output_file: PathBuf::from("build/gateway/bundle.xml"),
            dependency_dirs: Vec::new(),
            mode: BundleMode::default(),
            id_generation: IdGeneration::default(),
            logging: LogConfig::default(),
        }
    }
}

impl CompilerConfig {
    /// Load configuration from a YAML file, or JSON when the extension is `.json`
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> BundleResult<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| BundleError::config(format!("Failed to read config file: {}", e)))?;

        let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
        let mut config: CompilerConfig = if is_json {
            serde_json::from_str(&content)
                .map_err(|e| BundleError::config(format!("Failed to parse JSON config: {}", e)))?
        } else {
            serde_yaml::from_str(&content)
                .map_err(|e| BundleError::config(format!("Failed to parse config: {}", e)))?
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides, for runs without a configuration file
    pub fn from_env() -> BundleResult<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    ///
    /// Environment variables follow the pattern: BUNDLER_<FIELD>
    /// For example: BUNDLER_MODE=environment
    pub fn apply_env_overrides(&mut self) -> BundleResult<()> {
        use std::env;

        if let Ok(dir) = env::var("BUNDLER_SOURCE_DIR") {
            self.source_dir = PathBuf::from(dir);
        }

        if let Ok(file) = env::var("BUNDLER_OUTPUT_FILE") {
            self.output_file = PathBuf::from(file);
        }

        if let Ok(mode) = env::var("BUNDLER_MODE") {
            self.mode = match mode.to_lowercase().as_str() {
                "deployment" => BundleMode::Deployment,
                "environment" => BundleMode::Environment,
                other => {
                    return Err(BundleError::config(format!(
                        "Invalid BUNDLER_MODE: '{}', expected deployment or environment",
                        other
                    )))
                }
            };
        }

        if let Ok(level) = env::var("BUNDLER_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(format) = env::var("BUNDLER_LOG_FORMAT") {
            self.logging.format = format
                .parse()
                .map_err(|e| BundleError::config(format!("Invalid BUNDLER_LOG_FORMAT: {}", e)))?;
        }

        if let Ok(seed) = env::var("BUNDLER_ID_SEED") {
            self.id_generation.seed = seed;
        }

        Ok(())
    }

    /// Configuration validation, every problem reported in one error
    pub fn validate(&self) -> BundleResult<()> {
        let mut errors = Vec::new();

        if self.source_dir.as_os_str().is_empty() {
            errors.push("source_dir must not be empty".to_string());
        }

        if self.output_file.file_name().is_none() {
            errors.push(format!(
                "output_file '{}' must name a file",
                self.output_file.display()
            ));
        }

        for (index, dir) in self.dependency_dirs.iter().enumerate() {
            if dir == &self.source_dir {
                errors.push(format!(
                    "dependency_dirs[{}] is the source directory itself: {}",
                    index,
                    dir.display()
                ));
            }
            if self.dependency_dirs[..index].contains(dir) {
                errors.push(format!("dependency_dirs lists {} more than once", dir.display()));
            }
        }

        if self.id_generation.seed.trim().is_empty() {
            errors.push("id_generation seed must not be empty".to_string());
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            errors.push(format!(
                "logging.level '{}' must be one of {}",
                self.logging.level,
                LOG_LEVELS.join(", ")
            ));
        }

        if !errors.is_empty() {
            return Err(BundleError::config(format!(
                "Configuration validation failed:\n{}",
                errors.join("\n")
            )));
        }

        Ok(())
    }
}
