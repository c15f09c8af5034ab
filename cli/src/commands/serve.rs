// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Transfer API server on a Unix socket

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tokio::net::UnixListener;
use tokio::signal;
use tracing::{info, warn};

use courier_core::presentation::api;

pub async fn run(config_path: Option<PathBuf>, socket_override: Option<PathBuf>, prefetch: bool) -> Result<()> {
    let config = super::load_config(config_path)?;
    info!("Configuration loaded: {}", config.metadata.name);

    if let Some(listen) = &config.spec.metrics.listen {
        let addr: SocketAddr = listen
            .parse()
            .with_context(|| format!("Invalid metrics listen address: {}", listen))?;
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!("Metrics exporter listening on {}", addr);
    }

    let service = super::build_service(&config).await?;

    if prefetch {
        // Runs in the background; the first operation pulls whatever is still missing.
        let prefetcher = service.clone();
        tokio::spawn(async move { prefetcher.prefetch_images().await });
    }

    let socket_path = socket_override.unwrap_or_else(|| config.spec.server.socket_path.clone());
    let listener = bind_socket(&socket_path)?;
    info!("Listening on {}", socket_path.display());

    axum::serve(listener, api::app(service))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    if let Err(e) = std::fs::remove_file(&socket_path) {
        warn!("Failed to remove socket {}: {}", socket_path.display(), e);
    }
    info!("Server shutting down");

    Ok(())
}

/// Binds `path`, replacing a stale socket left by a previous run.
fn bind_socket(path: &Path) -> Result<UnixListener> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create socket directory {}", parent.display()))?;
    }
    if path.exists() {
        std::fs::remove_file(path).with_context(|| format!("Failed to remove stale socket {}", path.display()))?;
    }
    UnixListener::bind(path).with_context(|| format!("Failed to bind to {}", path.display()))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_socket_replaces_stale_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("courier.sock");

        let first = bind_socket(&path).unwrap();
        drop(first);
        assert!(path.exists());

        let _second = bind_socket(&path).unwrap();
    }
}
