// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Ephemeral Worker Runner
//!
//! Drives one short-lived worker container through
//! ensure-image → create → start → wait → logs → remove. Removal runs on every
//! path once the container exists.

use crate::domain::operation::OperationKind;
use crate::domain::registry::ImageReference;
use crate::domain::runtime::{ContainerRuntime, RuntimeError, WorkerSpec};
use crate::domain::transfer::TransferError;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const LABEL_PREFIX: &str = "com.volume-courier";
pub const LABEL_ACTION: &str = "com.volume-courier.action";
pub const LABEL_VOLUME: &str = "com.volume-courier.volume";
pub const LABEL_DESTINATION_VOLUME: &str = "com.volume-courier.destination-volume";
pub const LABEL_REFRESH: &str = "com.volume-courier.trigger-ui-refresh";

/// Labels identifying a worker as ours and what it is doing.
pub fn worker_labels(action: &str, volume: &str) -> HashMap<String, String> {
    HashMap::from([
        (LABEL_PREFIX.to_string(), "true".to_string()),
        (LABEL_ACTION.to_string(), action.to_string()),
        (LABEL_VOLUME.to_string(), volume.to_string()),
    ])
}

pub fn operation_labels(kind: OperationKind, volume: &str) -> HashMap<String, String> {
    worker_labels(kind.as_str(), volume)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerOutcome {
    pub exit_code: i64,
    pub output: String,
}

impl WorkerOutcome {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

pub struct WorkerRunner {
    runtime: Arc<dyn ContainerRuntime>,
}

impl WorkerRunner {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }

    /// Pulls `image` unless the runtime already has it.
    pub async fn ensure_image(&self, image: &str) -> Result<(), RuntimeError> {
        if self.runtime.image_exists(image).await? {
            debug!("Image {} already present", image);
            return Ok(());
        }

        info!("Pulling worker image {}", image);
        self.runtime.pull_image(image).await.map_err(|e| match e {
            RuntimeError::ImageUnavailable { .. } => e,
            other => RuntimeError::ImageUnavailable {
                image: image.to_string(),
                message: other.to_string(),
            },
        })
    }

    /// Runs the worker and reports its exit code without judging it.
    pub async fn execute(&self, spec: &WorkerSpec) -> Result<WorkerOutcome, RuntimeError> {
        self.drive(spec, None).await
    }

    /// Runs the worker; a non-zero exit is a failure carrying the output.
    pub async fn run(&self, spec: &WorkerSpec) -> Result<WorkerOutcome, TransferError> {
        let outcome = self.drive(spec, None).await?;
        Self::require_success(outcome)
    }

    /// Runs the worker and, if it exits zero, commits its filesystem as
    /// `reference` before the container is removed.
    pub async fn run_and_commit(
        &self,
        spec: &WorkerSpec,
        reference: &ImageReference,
    ) -> Result<WorkerOutcome, TransferError> {
        let outcome = self.drive(spec, Some(reference)).await?;
        Self::require_success(outcome)
    }

    fn require_success(outcome: WorkerOutcome) -> Result<WorkerOutcome, TransferError> {
        if outcome.succeeded() {
            Ok(outcome)
        } else {
            Err(TransferError::WorkerExitedNonZero {
                code: outcome.exit_code,
                output: outcome.output,
            })
        }
    }

    async fn drive(
        &self,
        spec: &WorkerSpec,
        commit: Option<&ImageReference>,
    ) -> Result<WorkerOutcome, RuntimeError> {
        self.ensure_image(&spec.image).await?;

        let id = self.runtime.create_container(spec).await?;
        debug!("Created worker {} from {}", id, spec.image);

        let result = self.drive_created(id.as_str(), commit).await;
        let removal = self.runtime.remove_container(id.as_str()).await;

        match (result, removal) {
            (Ok(outcome), Ok(())) => Ok(outcome),
            (Ok(_), Err(e)) => {
                warn!("Worker {} finished but could not be removed: {}", id, e);
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(removal_err)) => {
                warn!("Failed to remove worker {} after error: {}", id, removal_err);
                Err(e)
            }
        }
    }

    async fn drive_created(
        &self,
        id: &str,
        commit: Option<&ImageReference>,
    ) -> Result<WorkerOutcome, RuntimeError> {
        self.runtime.start_container(id).await?;

        let exit_code = self.runtime.wait_container(id).await?;
        let output = self.runtime.container_logs(id).await?;
        debug!("Worker {} exited with {}", id, exit_code);

        if exit_code == 0 {
            if let Some(reference) = commit {
                info!("Committing worker {} as {}", id, reference);
                self.runtime.commit_container(id, reference).await?;
            }
        } else {
            warn!("Worker {} exited with status code {}: {}", id, exit_code, output.trim_end());
        }

        Ok(WorkerOutcome { exit_code, output })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_labels() {
        let labels = operation_labels(OperationKind::Export, "db");
        assert_eq!(labels.get(LABEL_PREFIX).map(String::as_str), Some("true"));
        assert_eq!(labels.get(LABEL_ACTION).map(String::as_str), Some("export"));
        assert_eq!(labels.get(LABEL_VOLUME).map(String::as_str), Some("db"));
    }

    #[test]
    fn test_require_success() {
        let ok = WorkerOutcome { exit_code: 0, output: String::new() };
        assert!(WorkerRunner::require_success(ok).is_ok());

        let failed = WorkerOutcome { exit_code: 1, output: "boom".into() };
        match WorkerRunner::require_success(failed) {
            Err(TransferError::WorkerExitedNonZero { code, output }) => {
                assert_eq!(code, 1);
                assert_eq!(output, "boom");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
