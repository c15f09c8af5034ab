// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Consumer Quiescence Coordinator
//!
//! Stops the running containers that have a volume bound before a worker
//! touches it, and restarts exactly those afterwards. Containers that were
//! already stopped are left alone in both directions.

use crate::domain::runtime::{ContainerFilter, ContainerRuntime, ContainerSummary, RuntimeError};
use crate::domain::volume::VolumeName;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Quiescence failed part-way. `stopped` holds every consumer this call did
/// stop, so the caller can restart them.
#[derive(Debug, Error)]
#[error("failed to stop consumers of volume {volume}: {source}")]
pub struct QuiesceError {
    pub volume: VolumeName,
    pub stopped: Vec<ContainerSummary>,
    #[source]
    pub source: RuntimeError,
}

pub struct ConsumerQuiescer {
    runtime: Arc<dyn ContainerRuntime>,
    stop_timeout: Duration,
}

impl ConsumerQuiescer {
    pub fn with_stop_timeout(runtime: Arc<dyn ContainerRuntime>, stop_timeout: Duration) -> Self {
        Self {
            runtime,
            stop_timeout,
        }
    }

    /// Containers with `volume` bound, running or not unless `running_only`.
    ///
    /// Never fails: a lookup error is logged and yields an empty list.
    pub async fn discover_consumers(&self, volume: &VolumeName, running_only: bool) -> Vec<ContainerSummary> {
        let mut filter = ContainerFilter::bound_to(volume.as_str());
        if running_only {
            filter = filter.running_only();
        }

        match self.runtime.list_containers(filter).await {
            Ok(consumers) => consumers,
            Err(e) => {
                error!("Failed to list containers for volume {}: {}", volume, e);
                Vec::new()
            }
        }
    }

    /// Stops every running consumer of `volume` concurrently.
    ///
    /// The first failure cancels the checks and stops that have not been
    /// issued yet. A stop request already sent to the runtime is allowed to
    /// finish so the returned list matches what was actually stopped.
    pub async fn stop_bound_consumers(&self, volume: &VolumeName) -> Result<Vec<ContainerSummary>, QuiesceError> {
        let consumers = self.discover_consumers(volume, false).await;
        if consumers.is_empty() {
            return Ok(Vec::new());
        }

        let cancel = CancellationToken::new();
        let mut joinset = JoinSet::new();

        for consumer in consumers {
            let runtime = Arc::clone(&self.runtime);
            let cancel = cancel.clone();
            let grace = self.stop_timeout;
            joinset.spawn(async move { stop_if_running(runtime, consumer, grace, cancel).await });
        }

        let mut stopped = Vec::new();
        let mut first_error: Option<RuntimeError> = None;

        while let Some(joined) = joinset.join_next().await {
            let result = joined.unwrap_or_else(|e| Err(RuntimeError::request("stop", "consumer", e)));
            match result {
                Ok(Some(consumer)) => stopped.push(consumer),
                Ok(None) => {}
                Err(RuntimeError::Cancelled) => {}
                Err(e) => {
                    if first_error.is_none() {
                        cancel.cancel();
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            None => Ok(stopped),
            Some(source) => Err(QuiesceError {
                volume: volume.clone(),
                stopped,
                source,
            }),
        }
    }

    /// Starts `consumers` concurrently and waits for all of them.
    ///
    /// Every start is attempted even after one fails; the first error is
    /// returned.
    pub async fn start_consumers(&self, consumers: &[ContainerSummary]) -> Result<(), RuntimeError> {
        let mut joinset = JoinSet::new();

        for consumer in consumers {
            let runtime = Arc::clone(&self.runtime);
            let name = consumer.primary_name().to_string();
            joinset.spawn(async move {
                info!("Starting container {}...", name);
                runtime.start_container(&name).await?;
                info!("Container {} started", name);
                Ok::<(), RuntimeError>(())
            });
        }

        let mut first_error = None;
        while let Some(joined) = joinset.join_next().await {
            let result = joined.unwrap_or_else(|e| Err(RuntimeError::request("start", "consumer", e)));
            if let Err(e) = result {
                warn!("Failed to restart consumer: {}", e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }
}

async fn stop_if_running(
    runtime: Arc<dyn ContainerRuntime>,
    consumer: ContainerSummary,
    grace: Duration,
    cancel: CancellationToken,
) -> Result<Option<ContainerSummary>, RuntimeError> {
    let name = consumer.primary_name().to_string();

    let running = tokio::select! {
        _ = cancel.cancelled() => return Err(RuntimeError::Cancelled),
        listed = runtime.list_containers(ContainerFilter::running_named(name.as_str())) => listed?,
    };

    // The name filter is a substring match; only an exact name counts.
    let is_running = running
        .iter()
        .any(|c| c.running && c.names.iter().any(|n| n == &name));
    if !is_running {
        info!("Container {} is not running, no need to stop it", name);
        return Ok(None);
    }

    if cancel.is_cancelled() {
        return Err(RuntimeError::Cancelled);
    }

    info!("Stopping container {}...", name);
    runtime.stop_container(&name, grace).await?;
    info!("Container {} stopped", name);

    Ok(Some(consumer))
}
