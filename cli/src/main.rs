// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # volume-courier CLI
//!
//! The `courier` binary moves container volume data between volumes, host
//! archives, local images and registries.
//!
//! ## Commands
//!
//! - `courier serve` - Run the transfer API on a Unix socket
//! - `courier volume list|size|export|import|save|load|push|pull|clone|delete|empty` - One-shot transfers
//! - `courier config show|validate|generate` - Configuration management
//!
//! One-shot commands run in-process against the local runtime; they do not go
//! through a running `serve` instance.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;

use volume_courier::commands::{self, ConfigCommand, VolumeCommand};

/// volume-courier - back up, restore, clone and share container volumes
#[derive(Parser)]
#[command(name = "courier")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "COURIER_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "COURIER_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, global = true, env = "COURIER_LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Compact,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the transfer API on the configured Unix socket
    #[command(name = "serve")]
    Serve {
        /// Socket path (overrides configuration)
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,

        /// Skip pulling the worker images at startup
        #[arg(long)]
        no_prefetch: bool,
    },

    /// Volume transfer operations
    #[command(name = "volume")]
    Volume {
        #[command(subcommand)]
        command: VolumeCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.log_format)?;

    match cli.command {
        Some(Commands::Serve { socket, no_prefetch }) => {
            commands::serve::run(cli.config, socket, !no_prefetch).await
        }
        Some(Commands::Volume { command }) => commands::volume::handle_command(command, cli.config).await,
        Some(Commands::Config { command }) => commands::config::handle_command(command, cli.config).await,
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }

    Ok(())
}
