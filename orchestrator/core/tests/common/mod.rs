// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Scriptable in-memory container runtime shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use courier_core::application::progress::ProgressTracker;
use courier_core::domain::operation::OperationKind;
use courier_core::domain::registry::{ImageReference, RegistryAuth};
use courier_core::domain::runtime::{
    ContainerFilter, ContainerId, ContainerRuntime, ContainerSummary, RuntimeError, TransferLog, WorkerSpec,
};
use courier_core::domain::volume::VolumeInfo;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct FakeContainer {
    pub name: String,
    pub volumes: Vec<String>,
    pub running: bool,
}

#[derive(Debug, Clone)]
pub struct Worker {
    pub id: String,
    pub spec: WorkerSpec,
}

#[derive(Default)]
pub struct FakeState {
    pub containers: Vec<FakeContainer>,
    pub images: HashSet<String>,
    pub volumes: BTreeMap<String, VolumeInfo>,

    /// Exit code and output for data workers
    pub worker_exit_code: i64,
    pub worker_output: String,
    /// Output of privileged (size probe) workers
    pub probe_output: String,

    pub push_log: Vec<String>,
    pub pull_log: Vec<String>,

    pub fail_stop: HashSet<String>,
    pub fail_list_containers: bool,

    /// Failure switches for data workers
    pub fail_worker_create: bool,
    pub fail_worker_start: bool,
    pub fail_worker_remove: bool,
    /// How long a data worker takes before `wait_container` returns
    pub worker_delay: Option<Duration>,

    /// Chronological record of mutating calls, e.g. `stop:web`, `worker:start:worker-1`
    pub events: Vec<String>,
    pub workers: Vec<Worker>,
    pub removed_workers: Vec<String>,
    pub progress_seen: Vec<BTreeMap<String, OperationKind>>,
}

#[derive(Default)]
pub struct FakeRuntime {
    pub state: Mutex<FakeState>,
    progress: Mutex<Option<Arc<ProgressTracker>>>,
}

impl FakeRuntime {
    pub fn new() -> Arc<Self> {
        let runtime = Self::default();
        {
            let mut state = runtime.state.lock().unwrap();
            state.images.insert("docker.io/library/busybox:stable".into());
            state.images.insert("docker.io/library/alpine:3.20".into());
            state.images.insert("docker.io/justincormack/nsenter1".into());
        }
        Arc::new(runtime)
    }

    pub fn with_volume(self: &Arc<Self>, name: &str, driver: &str) -> &Arc<Self> {
        self.state.lock().unwrap().volumes.insert(
            name.to_string(),
            VolumeInfo {
                name: name.to_string(),
                driver: driver.to_string(),
                labels: HashMap::new(),
            },
        );
        self
    }

    pub fn with_container(self: &Arc<Self>, name: &str, volume: &str, running: bool) -> &Arc<Self> {
        self.state.lock().unwrap().containers.push(FakeContainer {
            name: name.to_string(),
            volumes: vec![volume.to_string()],
            running,
        });
        self
    }

    /// Records a progress snapshot every time a data worker starts.
    pub fn observe_progress(&self, tracker: Arc<ProgressTracker>) {
        *self.progress.lock().unwrap() = Some(tracker);
    }

    pub fn events(&self) -> Vec<String> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn events_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.events().into_iter().filter(|e| e.starts_with(prefix)).collect()
    }

    pub fn workers(&self) -> Vec<Worker> {
        self.state.lock().unwrap().workers.clone()
    }

    /// Workers other than size probes and refresh signals.
    pub fn data_workers(&self) -> Vec<Worker> {
        self.workers()
            .into_iter()
            .filter(|w| !w.spec.privileged && !w.spec.auto_remove)
            .collect()
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .containers
            .iter()
            .any(|c| c.name == name && c.running)
    }

    fn worker(&self, id: &str) -> Option<Worker> {
        self.state.lock().unwrap().workers.iter().find(|w| w.id == id).cloned()
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn list_containers(&self, filter: ContainerFilter) -> Result<Vec<ContainerSummary>, RuntimeError> {
        let state = self.state.lock().unwrap();
        if state.fail_list_containers {
            return Err(RuntimeError::Connection("list refused".into()));
        }

        Ok(state
            .containers
            .iter()
            .filter(|c| filter.include_stopped || c.running)
            .filter(|c| filter.volume.as_ref().map_or(true, |v| c.volumes.contains(v)))
            // The Docker name filter is a substring match
            .filter(|c| filter.name.as_ref().map_or(true, |n| c.name.contains(n.as_str())))
            .map(|c| ContainerSummary {
                id: format!("id-{}", c.name),
                names: vec![c.name.clone()],
                running: c.running,
            })
            .collect())
    }

    async fn create_container(&self, spec: &WorkerSpec) -> Result<ContainerId, RuntimeError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_worker_create && !spec.privileged && !spec.auto_remove {
            return Err(RuntimeError::request("create container", &spec.image, "no space left on device"));
        }
        let id = format!("worker-{}", state.workers.len() + 1);
        state.events.push(format!("worker:create:{}", id));
        state.workers.push(Worker {
            id: id.clone(),
            spec: spec.clone(),
        });
        Ok(ContainerId::new(id))
    }

    async fn start_container(&self, id: &str) -> Result<(), RuntimeError> {
        if let Some(worker) = self.worker(id) {
            if !worker.spec.privileged && !worker.spec.auto_remove {
                if self.state.lock().unwrap().fail_worker_start {
                    return Err(RuntimeError::request("start container", id, "bind source path does not exist"));
                }
                if let Some(tracker) = self.progress.lock().unwrap().as_ref() {
                    let snapshot = tracker.snapshot();
                    self.state.lock().unwrap().progress_seen.push(snapshot);
                }
            }
            self.state.lock().unwrap().events.push(format!("worker:start:{}", id));
            return Ok(());
        }

        let mut state = self.state.lock().unwrap();
        state.events.push(format!("start:{}", id));
        match state.containers.iter_mut().find(|c| c.name == id) {
            Some(container) => {
                container.running = true;
                Ok(())
            }
            None => Err(RuntimeError::NotFound(id.to_string())),
        }
    }

    async fn stop_container(&self, id: &str, grace: Duration) -> Result<(), RuntimeError> {
        assert_eq!(grace, Duration::from_secs(10));
        let mut state = self.state.lock().unwrap();
        if state.fail_stop.contains(id) {
            return Err(RuntimeError::request("stop container", id, "stop refused"));
        }
        state.events.push(format!("stop:{}", id));
        match state.containers.iter_mut().find(|c| c.name == id) {
            Some(container) => {
                container.running = false;
                Ok(())
            }
            None => Err(RuntimeError::NotFound(id.to_string())),
        }
    }

    async fn wait_container(&self, id: &str) -> Result<i64, RuntimeError> {
        let worker = self.worker(id).ok_or_else(|| RuntimeError::NotFound(id.to_string()))?;
        if worker.spec.privileged {
            return Ok(0);
        }

        let delay = self.state.lock().unwrap().worker_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.state.lock().unwrap().worker_exit_code)
    }

    async fn container_logs(&self, id: &str) -> Result<String, RuntimeError> {
        let worker = self.worker(id).ok_or_else(|| RuntimeError::NotFound(id.to_string()))?;
        let state = self.state.lock().unwrap();
        Ok(if worker.spec.privileged {
            state.probe_output.clone()
        } else {
            state.worker_output.clone()
        })
    }

    async fn remove_container(&self, id: &str) -> Result<(), RuntimeError> {
        let mut state = self.state.lock().unwrap();
        state.events.push(format!("worker:remove:{}", id));
        if state.fail_worker_remove {
            return Err(RuntimeError::request("remove container", id, "removal already in progress"));
        }
        state.removed_workers.push(id.to_string());
        Ok(())
    }

    async fn commit_container(&self, id: &str, reference: &ImageReference) -> Result<(), RuntimeError> {
        let mut state = self.state.lock().unwrap();
        state.events.push(format!("commit:{}:{}", id, reference));
        state.images.insert(reference.to_string());
        Ok(())
    }

    async fn image_exists(&self, image: &str) -> Result<bool, RuntimeError> {
        Ok(self.state.lock().unwrap().images.contains(image))
    }

    async fn pull_image(&self, image: &str) -> Result<(), RuntimeError> {
        let mut state = self.state.lock().unwrap();
        state.events.push(format!("image:pull:{}", image));
        state.images.insert(image.to_string());
        Ok(())
    }

    async fn push_image(&self, reference: &ImageReference, _auth: &RegistryAuth) -> Result<TransferLog, RuntimeError> {
        let mut state = self.state.lock().unwrap();
        state.events.push(format!("registry:push:{}", reference));
        Ok(state.push_log.clone())
    }

    async fn pull_image_authenticated(
        &self,
        reference: &ImageReference,
        _auth: &RegistryAuth,
    ) -> Result<TransferLog, RuntimeError> {
        let mut state = self.state.lock().unwrap();
        state.events.push(format!("registry:pull:{}", reference));
        let log = state.pull_log.clone();
        if courier_core::domain::registry::scan_transfer_log(&log).is_ok() {
            state.images.insert(reference.to_string());
        }
        Ok(log)
    }

    async fn list_volumes(&self) -> Result<Vec<VolumeInfo>, RuntimeError> {
        Ok(self.state.lock().unwrap().volumes.values().cloned().collect())
    }

    async fn inspect_volume(&self, name: &str) -> Result<VolumeInfo, RuntimeError> {
        self.state
            .lock()
            .unwrap()
            .volumes
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::NotFound(name.to_string()))
    }

    async fn create_volume(
        &self,
        name: &str,
        driver: &str,
        labels: HashMap<String, String>,
    ) -> Result<VolumeInfo, RuntimeError> {
        let info = VolumeInfo {
            name: name.to_string(),
            driver: driver.to_string(),
            labels,
        };
        let mut state = self.state.lock().unwrap();
        state.events.push(format!("volume:create:{}", name));
        state.volumes.insert(name.to_string(), info.clone());
        Ok(info)
    }

    async fn remove_volume(&self, name: &str, force: bool) -> Result<(), RuntimeError> {
        let mut state = self.state.lock().unwrap();
        state.events.push(format!("volume:remove:{}:force={}", name, force));
        state
            .volumes
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| RuntimeError::NotFound(name.to_string()))
    }
}
