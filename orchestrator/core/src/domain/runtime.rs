// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Container runtime control plane port.
//!
//! Everything the orchestrator needs from the runtime (containers, images,
//! volumes, registry transfer) goes through [`ContainerRuntime`]. The Docker
//! adapter lives in `infrastructure::docker`; tests use an in-memory fake.

use crate::domain::registry::{ImageReference, RegistryAuth};
use crate::domain::volume::VolumeInfo;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerId(pub String);

impl ContainerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContainerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Filter applied when listing containers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerFilter {
    /// Only containers with this volume mounted
    pub volume: Option<String>,
    /// Only containers whose name matches
    pub name: Option<String>,
    /// Include stopped containers
    pub include_stopped: bool,
}

impl ContainerFilter {
    pub fn bound_to(volume: impl Into<String>) -> Self {
        Self {
            volume: Some(volume.into()),
            name: None,
            include_stopped: true,
        }
    }

    pub fn running_named(name: impl Into<String>) -> Self {
        Self {
            volume: None,
            name: Some(name.into()),
            include_stopped: false,
        }
    }

    /// Narrows the filter to running containers only.
    pub fn running_only(mut self) -> Self {
        self.include_stopped = false;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSummary {
    pub id: String,
    /// Names without the leading `/` the Docker API adds
    pub names: Vec<String>,
    pub running: bool,
}

impl ContainerSummary {
    pub fn primary_name(&self) -> &str {
        self.names.first().map(String::as_str).unwrap_or(self.id.as_str())
    }
}

/// Everything needed to create one short-lived worker container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerSpec {
    pub image: String,
    pub cmd: Vec<String>,
    /// `source:target[:mode]` bind specs, volumes and host paths alike
    pub binds: Vec<String>,
    pub labels: HashMap<String, String>,
    pub user: Option<String>,
    pub tty: bool,
    pub privileged: bool,
    pub host_pid: bool,
    pub auto_remove: bool,
}

impl WorkerSpec {
    /// Worker that runs `script` through `/bin/sh -c`.
    pub fn shell(image: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            cmd: vec!["/bin/sh".to_string(), "-c".to_string(), script.into()],
            ..Default::default()
        }
    }

    pub fn bind(mut self, source: impl AsRef<str>, target: &str) -> Self {
        self.binds.push(format!("{}:{}", source.as_ref(), target));
        self
    }

    pub fn labels(mut self, labels: HashMap<String, String>) -> Self {
        self.labels.extend(labels);
        self
    }
}

/// Raw lines of a streamed registry response (one JSON object per line).
pub type TransferLog = Vec<String>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("Cannot connect to container runtime: {0}")]
    Connection(String),
    #[error("Image {image} is unavailable: {message}")]
    ImageUnavailable { image: String, message: String },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Failed to {operation} {target}: {message}")]
    Request {
        operation: &'static str,
        target: String,
        message: String,
    },
    #[error("Operation cancelled")]
    Cancelled,
}

impl RuntimeError {
    pub fn request(operation: &'static str, target: impl Into<String>, message: impl ToString) -> Self {
        RuntimeError::Request {
            operation,
            target: target.into(),
            message: message.to_string(),
        }
    }
}

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    // --- containers -------------------------------------------------------
    async fn list_containers(&self, filter: ContainerFilter) -> Result<Vec<ContainerSummary>, RuntimeError>;
    async fn create_container(&self, spec: &WorkerSpec) -> Result<ContainerId, RuntimeError>;
    async fn start_container(&self, id: &str) -> Result<(), RuntimeError>;
    async fn stop_container(&self, id: &str, grace: Duration) -> Result<(), RuntimeError>;
    /// Blocks until the container is no longer running and returns its exit code.
    async fn wait_container(&self, id: &str) -> Result<i64, RuntimeError>;
    /// Combined stdout and stderr of a container.
    async fn container_logs(&self, id: &str) -> Result<String, RuntimeError>;
    async fn remove_container(&self, id: &str) -> Result<(), RuntimeError>;
    /// Commits the container filesystem as a new image tagged `reference`.
    async fn commit_container(&self, id: &str, reference: &ImageReference) -> Result<(), RuntimeError>;

    // --- images -----------------------------------------------------------
    async fn image_exists(&self, image: &str) -> Result<bool, RuntimeError>;
    async fn pull_image(&self, image: &str) -> Result<(), RuntimeError>;

    // --- registry ---------------------------------------------------------
    /// Pushes `reference` and returns the raw response stream. Error objects in
    /// the stream are returned as lines, not as `Err`.
    async fn push_image(&self, reference: &ImageReference, auth: &RegistryAuth) -> Result<TransferLog, RuntimeError>;
    /// Pulls `reference` and returns the raw response stream.
    async fn pull_image_authenticated(&self, reference: &ImageReference, auth: &RegistryAuth) -> Result<TransferLog, RuntimeError>;

    // --- volumes ----------------------------------------------------------
    async fn list_volumes(&self) -> Result<Vec<VolumeInfo>, RuntimeError>;
    async fn inspect_volume(&self, name: &str) -> Result<VolumeInfo, RuntimeError>;
    async fn create_volume(&self, name: &str, driver: &str, labels: HashMap<String, String>) -> Result<VolumeInfo, RuntimeError>;
    async fn remove_volume(&self, name: &str, force: bool) -> Result<(), RuntimeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_worker_spec() {
        let spec = WorkerSpec::shell("busybox", "echo hi")
            .bind("data", "/vackup-volume")
            .bind("/tmp", "/vackup");

        assert_eq!(spec.cmd, vec!["/bin/sh", "-c", "echo hi"]);
        assert_eq!(spec.binds, vec!["data:/vackup-volume", "/tmp:/vackup"]);
        assert!(!spec.privileged);
        assert!(!spec.auto_remove);
    }

    #[test]
    fn test_container_filter_builders() {
        let bound = ContainerFilter::bound_to("db");
        assert_eq!(bound.volume.as_deref(), Some("db"));
        assert!(bound.include_stopped);
        assert!(!bound.running_only().include_stopped);

        let named = ContainerFilter::running_named("web");
        assert_eq!(named.name.as_deref(), Some("web"));
        assert!(!named.include_stopped);
    }

    #[test]
    fn test_primary_name_falls_back_to_id() {
        let summary = ContainerSummary {
            id: "abc".into(),
            names: vec![],
            running: false,
        };
        assert_eq!(summary.primary_name(), "abc");
    }
}
