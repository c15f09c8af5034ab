// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::application::progress::RefreshSignal;
use crate::application::worker::{worker_labels, WorkerRunner, LABEL_REFRESH, LABEL_VOLUME};
use crate::domain::runtime::{ContainerRuntime, RuntimeError, WorkerSpec};
use async_trait::async_trait;
use std::sync::Arc;

/// Starts a trivial, auto-removing, labeled worker. UIs watching container
/// events for [`LABEL_REFRESH`] reload the in-flight action list.
pub struct RuntimeRefreshSignal {
    runtime: Arc<dyn ContainerRuntime>,
    runner: WorkerRunner,
    image: String,
}

impl RuntimeRefreshSignal {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, image: impl Into<String>) -> Self {
        Self {
            runner: WorkerRunner::new(Arc::clone(&runtime)),
            runtime,
            image: image.into(),
        }
    }
}

/// Worker that exits immediately and removes itself.
pub fn refresh_worker_spec(image: &str) -> WorkerSpec {
    let mut labels = worker_labels("trigger-ui-refresh", "");
    labels.remove(LABEL_VOLUME);
    labels.insert(LABEL_REFRESH.to_string(), "true".to_string());

    WorkerSpec {
        image: image.to_string(),
        cmd: vec!["true".to_string()],
        labels,
        auto_remove: true,
        ..Default::default()
    }
}

#[async_trait]
impl RefreshSignal for RuntimeRefreshSignal {
    async fn notify(&self) -> Result<(), RuntimeError> {
        self.runner.ensure_image(&self.image).await?;
        let id = self.runtime.create_container(&refresh_worker_spec(&self.image)).await?;
        self.runtime.start_container(id.as_str()).await
    }
}
