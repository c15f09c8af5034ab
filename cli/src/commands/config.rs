// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use courier_core::domain::config::CourierConfig;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./courier-config.yaml)
        #[arg(short, long, default_value = "./courier-config.yaml")]
        output: PathBuf,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output } => generate(output).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = CourierConfig::load_or_default(config_override.clone()).context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. COURIER_CONFIG_PATH: {}",
            std::env::var("COURIER_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./courier-config.yaml");
        println!("  4. ~/.courier/config.yaml");
        println!("  5. /etc/courier/config.yaml");
        println!();
    }

    let spec = &config.spec;
    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Runtime:".bold());
    println!(
        "  Socket: {}",
        spec.runtime.socket_path.as_deref().unwrap_or("(auto-detect)")
    );
    println!("  Volumes root: {}", spec.runtime.volumes_root);
    if let Some(platform) = &spec.runtime.platform {
        println!("  Platform: {}", platform);
    }
    println!();

    println!("{}", "Worker images:".bold());
    println!("  Worker: {}", spec.images.worker);
    println!("  Archiver: {}", spec.images.archiver);
    println!("  Probe: {}", spec.images.probe);
    println!();

    println!("{}", "Operations:".bold());
    println!("  Consumer stop timeout: {}s", spec.quiesce.stop_timeout_secs);
    println!("  Serialize per volume: {}", spec.concurrency.serialize_per_volume);
    println!();

    println!("{}", "Server:".bold());
    println!("  Socket: {}", spec.server.socket_path.display());
    println!(
        "  Metrics: {}",
        spec.metrics.listen.as_deref().unwrap_or("(disabled)")
    );
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = CourierConfig::load_or_default(config_path).context("Failed to load configuration")?;

    config.validate().context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf) -> Result<()> {
    let sample = CourierConfig::default().to_yaml()?;

    std::fs::write(&output, sample).with_context(|| format!("Failed to write config to {:?}", output))?;

    println!("{}", format!("✓ Configuration generated: {}", output.display()).green());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_generate_writes_loadable_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("courier-config.yaml");

        generate(path.clone()).await.unwrap();

        let config = CourierConfig::from_yaml_file(&path).unwrap();
        config.validate().unwrap();
        assert_eq!(config.spec.server.socket_path, CourierConfig::default().spec.server.socket_path);
    }
}
