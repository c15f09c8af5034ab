// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the courier CLI

pub mod config;
pub mod serve;
pub mod volume;

pub use self::config::ConfigCommand;
pub use self::volume::VolumeCommand;

use anyhow::{Context, Result};
use courier_core::application::progress::ProgressTracker;
use courier_core::application::refresh::RuntimeRefreshSignal;
use courier_core::application::transfer_service::{StandardTransferService, TransferSettings};
use courier_core::domain::config::CourierConfig;
use courier_core::domain::runtime::ContainerRuntime;
use courier_core::infrastructure::DockerRuntime;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Loads and validates configuration from `--config` or discovery.
pub fn load_config(config_path: Option<PathBuf>) -> Result<CourierConfig> {
    let config = CourierConfig::load_or_default(config_path).context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;
    Ok(config)
}

/// Connects to the container runtime and wires the transfer service.
pub async fn build_service(config: &CourierConfig) -> Result<Arc<StandardTransferService>> {
    let docker = DockerRuntime::new(
        config.spec.runtime.socket_path.clone(),
        config.spec.runtime.platform.clone(),
    )
    .context("Failed to initialize Docker runtime")?;
    docker.healthcheck().await.context("Docker runtime is not reachable")?;
    info!("Connected to Docker runtime");

    let runtime: Arc<dyn ContainerRuntime> = Arc::new(docker);
    let signal = Arc::new(RuntimeRefreshSignal::new(
        Arc::clone(&runtime),
        config.spec.images.worker.clone(),
    ));
    let progress = ProgressTracker::new(signal);

    Ok(Arc::new(StandardTransferService::new(
        runtime,
        progress,
        TransferSettings::from(config),
    )))
}
