//! # Gateway Bundler - Main Entry Point
//!
//! `gateway-bundler [config-file]`
//!
//! Reads the compiler configuration (default `bundler.yaml`; when the file does not
//! exist the configuration comes from defaults and `BUNDLER_*` environment variables),
//! loads the dependency bundles and the main bundle, compiles them and writes the
//! bundle document.

use anyhow::Context;
use std::path::PathBuf;
use tracing::{error, info};

use gateway_bundler::observability::init_logging;
use gateway_bundler::{compile_sources, CompilerConfig};

const DEFAULT_CONFIG_FILE: &str = "bundler.yaml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let config = if tokio::fs::metadata(&config_path).await.is_ok() {
        CompilerConfig::load_from_file(&config_path)
            .await
            .with_context(|| format!("loading {}", config_path.display()))?
    } else {
        CompilerConfig::from_env().context("configuring from environment")?
    };

    init_logging(&config.logging);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        source_dir = %config.source_dir.display(),
        mode = ?config.mode,
        "Starting gateway bundler"
    );

    let compiled = match compile_sources(&config).await {
        Ok(compiled) => compiled,
        Err(e) => {
            error!(category = e.category(), "Bundle compilation failed: {}", e);
            return Err(e.into());
        }
    };

    compiled
        .write_to(&config.output_file)
        .await
        .with_context(|| format!("writing {}", config.output_file.display()))?;

    info!(
        entities = compiled.document.entities().len(),
        external_dependencies = compiled.external_dependencies.len(),
        output = %config.output_file.display(),
        "Bundle written"
    );
    Ok(())
}
