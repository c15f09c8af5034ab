// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Volume Transfer Service
//!
//! Composes the quiescer, worker runner, registry transfer and progress
//! tracker into the user-facing flows. Every mutating flow follows the same
//! envelope:
//!
//! ```text
//! lease → mark in progress → stop consumers → worker(s) → restart consumers → clear
//! ```
//!
//! Any failure skips the remaining steps except consumer restart (once
//! consumers were stopped) and progress cleanup, which always run.

use crate::application::leases::VolumeLeases;
use crate::application::progress::{ProgressGuard, ProgressTracker};
use crate::application::quiescence::ConsumerQuiescer;
use crate::application::registry_transfer::RegistryTransfer;
use crate::application::size_probe::SizeProbe;
use crate::application::worker::{operation_labels, WorkerRunner, LABEL_DESTINATION_VOLUME};
use crate::domain::archive::{
    clone_command, empty_command, export_command, import_command, load_command, normalize_host_path,
    save_command, CLONE_SOURCE_MOUNT, CLONE_TARGET_MOUNT, HOST_MOUNT, VOLUME_MOUNT,
};
use crate::domain::config::CourierConfig;
use crate::domain::operation::{OperationKind, OperationState, TransferOperation};
use crate::domain::registry::{ImageReference, RegistryAuth};
use crate::domain::runtime::{ContainerRuntime, RuntimeError, WorkerSpec};
use crate::domain::transfer::{ErrorClass, TransferError};
use crate::domain::volume::{VolumeName, VolumeSelector, VolumeSize, VolumeSummary};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

// ============================================================================
// Settings & Requests
// ============================================================================

#[derive(Debug, Clone)]
pub struct TransferSettings {
    pub worker_image: String,
    pub archiver_image: String,
    pub probe_image: String,
    pub volumes_root: String,
    pub stop_timeout: Duration,
    pub serialize_per_volume: bool,
}

impl From<&CourierConfig> for TransferSettings {
    fn from(config: &CourierConfig) -> Self {
        let spec = &config.spec;
        Self {
            worker_image: spec.images.worker.clone(),
            archiver_image: spec.images.archiver.clone(),
            probe_image: spec.images.probe.clone(),
            volumes_root: spec.runtime.volumes_root.clone(),
            stop_timeout: spec.quiesce.stop_timeout(),
            serialize_per_volume: spec.concurrency.serialize_per_volume,
        }
    }
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self::from(&CourierConfig::default())
    }
}

/// Export `volume` to `<destination_dir>/<file_name>` on the host.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub volume: String,
    pub destination_dir: String,
    pub file_name: String,
}

/// Replace the contents of `volume` with the archive at `archive_path`.
#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub volume: String,
    pub archive_path: String,
}

/// Save to or load from a local image.
#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub volume: String,
    pub image: String,
}

/// Push to or pull from a registry.
#[derive(Debug, Clone)]
pub struct RegistryRequest {
    pub volume: String,
    pub reference: String,
    pub auth: RegistryAuth,
}

#[derive(Debug, Clone)]
pub struct CloneRequest {
    pub volume: String,
    pub destination_volume: String,
}

// ============================================================================
// Service Trait
// ============================================================================

#[async_trait]
pub trait TransferService: Send + Sync {
    /// Every volume with its driver, size and bound containers
    async fn list_volumes(&self) -> Result<BTreeMap<String, VolumeSummary>, TransferError>;

    /// Size of one volume; unknown volumes report zero
    async fn volume_size(&self, volume: &str) -> Result<VolumeSize, TransferError>;

    async fn volumes_size(&self) -> Result<BTreeMap<String, VolumeSize>, TransferError>;

    /// Names of the containers with `volume` bound, running or not
    async fn containers_for_volume(&self, volume: &str) -> Result<Vec<String>, TransferError>;

    async fn export(&self, request: ExportRequest) -> Result<(), TransferError>;
    async fn import(&self, request: ImportRequest) -> Result<(), TransferError>;
    async fn save(&self, request: ImageRequest) -> Result<(), TransferError>;
    async fn load(&self, request: ImageRequest) -> Result<(), TransferError>;
    async fn push(&self, request: RegistryRequest) -> Result<(), TransferError>;
    async fn pull(&self, request: RegistryRequest) -> Result<(), TransferError>;
    async fn clone_volume(&self, request: CloneRequest) -> Result<(), TransferError>;
    async fn delete(&self, volume: &str) -> Result<(), TransferError>;

    /// Removes every file from `volume`, keeping the volume itself
    async fn empty(&self, volume: &str) -> Result<(), TransferError>;

    /// Volume name to action for operations in flight
    fn actions_in_progress(&self) -> BTreeMap<String, OperationKind>;
}

// ============================================================================
// Standard Implementation
// ============================================================================

/// Runs every flow on a task of its own. Dropping the caller's future
/// (a disconnected client, an aborted CLI) leaves the operation running to
/// completion, so stopped consumers are restarted and workers removed.
pub struct StandardTransferService {
    engine: Arc<TransferEngine>,
}

struct TransferEngine {
    runtime: Arc<dyn ContainerRuntime>,
    runner: Arc<WorkerRunner>,
    quiescer: ConsumerQuiescer,
    registry: RegistryTransfer,
    probe: SizeProbe,
    progress: Arc<ProgressTracker>,
    leases: VolumeLeases,
    settings: TransferSettings,
}

impl StandardTransferService {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        progress: Arc<ProgressTracker>,
        settings: TransferSettings,
    ) -> Self {
        Self {
            engine: Arc::new(TransferEngine::new(runtime, progress, settings)),
        }
    }

    pub fn progress(&self) -> Arc<ProgressTracker> {
        Arc::clone(&self.engine.progress)
    }

    /// Pulls the worker, archiver and probe images concurrently. Failures are
    /// logged; the images are pulled again on first use.
    pub async fn prefetch_images(&self) {
        self.engine.prefetch_images().await
    }

    /// Runs `operation` on its own task and waits for it.
    async fn detached<F, Fut>(&self, operation: F) -> Result<(), TransferError>
    where
        F: FnOnce(Arc<TransferEngine>) -> Fut,
        Fut: Future<Output = Result<(), TransferError>> + Send + 'static,
    {
        let task = tokio::spawn(operation(Arc::clone(&self.engine)));
        match task.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Err(RuntimeError::Cancelled.into()),
        }
    }
}

impl TransferEngine {
    fn new(runtime: Arc<dyn ContainerRuntime>, progress: Arc<ProgressTracker>, settings: TransferSettings) -> Self {
        let runner = Arc::new(WorkerRunner::new(Arc::clone(&runtime)));
        Self {
            quiescer: ConsumerQuiescer::with_stop_timeout(Arc::clone(&runtime), settings.stop_timeout),
            registry: RegistryTransfer::new(Arc::clone(&runtime)),
            probe: SizeProbe::new(
                Arc::clone(&runner),
                settings.probe_image.clone(),
                settings.volumes_root.clone(),
            ),
            leases: VolumeLeases::new(settings.serialize_per_volume),
            runtime,
            runner,
            progress,
            settings,
        }
    }

    async fn prefetch_images(&self) {
        let images = [
            self.settings.worker_image.as_str(),
            self.settings.archiver_image.as_str(),
            self.settings.probe_image.as_str(),
        ];

        let results = futures::future::join_all(images.iter().map(|image| self.runner.ensure_image(image))).await;

        let mut failed = 0;
        for (image, result) in images.iter().zip(results) {
            if let Err(e) = result {
                failed += 1;
                warn!("Failed to prefetch image {}: {}", image, e);
            }
        }

        if failed == 0 {
            info!("Successfully pulled all the worker images");
        }
    }

    // ========================================================================
    // Envelope
    // ========================================================================

    /// Lease, mark in progress, run `work` with consumers stopped, clear.
    async fn enveloped<T, F>(&self, volume: &VolumeName, kind: OperationKind, work: F) -> Result<T, TransferError>
    where
        F: Future<Output = Result<T, TransferError>> + Send,
        T: Send,
    {
        let _lease = self.leases.acquire(volume).await;
        let (mut op, progress) = self.begin(volume, kind).await;
        let result = self.with_consumers_stopped(&mut op, work).await;
        self.conclude(op, progress, result).await
    }

    async fn begin(&self, volume: &VolumeName, kind: OperationKind) -> (TransferOperation, ProgressGuard) {
        info!("Starting {} of volume {}", kind, volume);
        let mut op = TransferOperation::new(volume.clone(), kind);
        let progress = self.progress.begin(volume, kind).await;
        step(&mut op, OperationState::MarkedInProgress);
        (op, progress)
    }

    /// Stops the volume's consumers, awaits `work`, then restarts exactly the
    /// consumers that were stopped.
    async fn with_consumers_stopped<T, F>(&self, op: &mut TransferOperation, work: F) -> Result<T, TransferError>
    where
        F: Future<Output = Result<T, TransferError>> + Send,
    {
        let stopped = match self.quiescer.stop_bound_consumers(&op.volume).await {
            Ok(stopped) => stopped,
            Err(quiesce) => {
                op.fail();
                if !quiesce.stopped.is_empty() {
                    if let Err(e) = self.quiescer.start_consumers(&quiesce.stopped).await {
                        warn!("Failed to restart consumers after aborted quiesce of {}: {}", op.volume, e);
                    }
                }
                return Err(quiesce.source.into());
            }
        };

        step(op, OperationState::ConsumersQuiesced);
        step(op, OperationState::WorkerRunning);

        let result = work.await;
        if result.is_ok() {
            step(op, OperationState::WorkerDone);
        }

        let restored = self.quiescer.start_consumers(&stopped).await;

        match (result, restored) {
            (Ok(value), Ok(())) => {
                step(op, OperationState::ConsumersRestored);
                Ok(value)
            }
            (Ok(_), Err(e)) => {
                op.fail();
                Err(e.into())
            }
            (Err(e), restored) => {
                if let Err(restart) = restored {
                    warn!("Failed to restart consumers of {}: {}", op.volume, restart);
                }
                op.fail();
                Err(e)
            }
        }
    }

    async fn conclude<T>(
        &self,
        mut op: TransferOperation,
        progress: ProgressGuard,
        result: Result<T, TransferError>,
    ) -> Result<T, TransferError> {
        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => {
                op.fail();
                match e.worker_output() {
                    Some(output) => error!("{} of volume {} failed: {}\n{}", op.kind, op.volume, e, output.trim_end()),
                    None => error!("{} of volume {} failed: {}", op.kind, op.volume, e),
                }
                match e.class() {
                    ErrorClass::BadRequest => "invalid",
                    ErrorClass::Unauthorized => "unauthorized",
                    ErrorClass::Internal => "error",
                }
            }
        };

        progress.finish().await;
        step(&mut op, OperationState::Cleared);

        let elapsed = op.elapsed();
        metrics::counter!("courier_operations_total", "kind" => op.kind.as_str(), "outcome" => outcome).increment(1);
        metrics::histogram!("courier_operation_duration_seconds", "kind" => op.kind.as_str())
            .record(elapsed.as_secs_f64());

        if result.is_ok() {
            info!("{} of volume {} completed in {:?}", op.kind, op.volume, elapsed);
        }
        result
    }

    /// Creates `destination` with the source's driver and labels, then copies
    /// the source into it with the source's consumers stopped.
    async fn clone_into(&self, op: &mut TransferOperation, destination: &VolumeName) -> Result<(), TransferError> {
        let source = self.runtime.inspect_volume(op.volume.as_str()).await?;
        self.runtime
            .create_volume(destination.as_str(), &source.driver, source.labels.clone())
            .await?;
        info!("Created volume {} (driver {}) as clone of {}", destination, source.driver, op.volume);

        let mut spec = WorkerSpec::shell(self.settings.worker_image.clone(), clone_command())
            .bind(op.volume.as_str(), CLONE_SOURCE_MOUNT)
            .bind(destination.as_str(), CLONE_TARGET_MOUNT)
            .labels(operation_labels(OperationKind::Clone, op.volume.as_str()));
        spec.user = Some("root".to_string());
        spec.labels
            .insert(LABEL_DESTINATION_VOLUME.to_string(), destination.to_string());

        self.with_consumers_stopped(op, self.run_worker(spec)).await
    }

    async fn run_worker(&self, spec: WorkerSpec) -> Result<(), TransferError> {
        let outcome = self.runner.run(&spec).await?;
        debug!("Worker output:\n{}", outcome.output.trim_end());
        Ok(())
    }

    fn save_worker(&self, volume: &VolumeName, kind: OperationKind) -> WorkerSpec {
        WorkerSpec::shell(self.settings.worker_image.clone(), save_command())
            .bind(volume.as_str(), VOLUME_MOUNT)
            .labels(operation_labels(kind, volume.as_str()))
    }

    fn load_worker(&self, volume: &VolumeName, reference: &ImageReference, kind: OperationKind) -> WorkerSpec {
        WorkerSpec::shell(reference.to_string(), load_command())
            .bind(volume.as_str(), VOLUME_MOUNT)
            .labels(operation_labels(kind, volume.as_str()))
    }
}

fn step(op: &mut TransferOperation, next: OperationState) {
    if let Err(e) = op.advance(next) {
        warn!("{} of volume {}: {}", op.kind, op.volume, e);
    }
}

fn required<'a>(value: &'a str, field: &str) -> Result<&'a str, TransferError> {
    let value = value.trim();
    if value.is_empty() {
        Err(TransferError::invalid(format!("{} is required", field)))
    } else {
        Ok(value)
    }
}

/// Splits a host archive path into its directory and file name.
fn split_archive_path(path: &str) -> Result<(String, String), TransferError> {
    let path = normalize_host_path(required(path, "path")?);
    match path.rsplit_once('/') {
        Some((_, file)) if file.is_empty() => Err(TransferError::invalid("path must name an archive file")),
        Some(("", file)) => Ok(("/".to_string(), file.to_string())),
        Some((dir, file)) => Ok((dir.to_string(), file.to_string())),
        None => Err(TransferError::invalid("path must be absolute")),
    }
}

/// Last component of a file name given with or without directories.
fn base_name(file_name: &str) -> &str {
    file_name.rsplit(['/', '\\']).next().unwrap_or(file_name)
}

impl TransferEngine {
    async fn list_volumes(&self) -> Result<BTreeMap<String, VolumeSummary>, TransferError> {
        let volumes = self.runtime.list_volumes().await?;

        let sizes = async {
            self.probe.probe(&VolumeSelector::All).await.unwrap_or_else(|e| {
                warn!("Failed to measure volume sizes: {}", e);
                BTreeMap::new()
            })
        };

        let consumers = futures::future::join_all(volumes.iter().map(|info| async move {
            let names = match VolumeName::new(info.name.as_str()) {
                Ok(volume) => self
                    .quiescer
                    .discover_consumers(&volume, false)
                    .await
                    .iter()
                    .map(|c| c.primary_name().to_string())
                    .collect(),
                Err(_) => Vec::new(),
            };
            (info, names)
        }));

        let (sizes, consumers) = tokio::join!(sizes, consumers);

        Ok(consumers
            .into_iter()
            .map(|(info, containers)| {
                let size = sizes.get(&info.name).cloned().unwrap_or_default();
                (
                    info.name.clone(),
                    VolumeSummary {
                        driver: info.driver.clone(),
                        size: size.bytes,
                        size_human: size.human,
                        containers,
                    },
                )
            })
            .collect())
    }

    async fn volume_size(&self, volume: &str) -> Result<VolumeSize, TransferError> {
        let volume = VolumeName::new(volume)?;
        let mut sizes = self.probe.probe(&VolumeSelector::Named(volume.clone())).await?;
        Ok(sizes.remove(volume.as_str()).unwrap_or_default())
    }

    async fn volumes_size(&self) -> Result<BTreeMap<String, VolumeSize>, TransferError> {
        self.probe.probe(&VolumeSelector::All).await
    }

    async fn containers_for_volume(&self, volume: &str) -> Result<Vec<String>, TransferError> {
        let volume = VolumeName::new(volume)?;
        Ok(self
            .quiescer
            .discover_consumers(&volume, false)
            .await
            .iter()
            .map(|c| c.primary_name().to_string())
            .collect())
    }

    async fn export(&self, request: ExportRequest) -> Result<(), TransferError> {
        let volume = VolumeName::new(request.volume)?;
        let destination = normalize_host_path(required(&request.destination_dir, "path")?);
        // Docker reads a relative bind source as a named volume.
        if !destination.starts_with('/') {
            return Err(TransferError::invalid("path must be absolute"));
        }
        let file_name = base_name(required(&request.file_name, "fileName")?).to_string();
        if file_name.is_empty() {
            return Err(TransferError::invalid("fileName is required"));
        }
        info!("Exporting volume {} to {}/{}", volume, destination, file_name);

        let spec = WorkerSpec::shell(self.settings.archiver_image.clone(), export_command(&file_name))
            .bind(volume.as_str(), VOLUME_MOUNT)
            .bind(&destination, HOST_MOUNT)
            .labels(operation_labels(OperationKind::Export, volume.as_str()));

        self.enveloped(&volume, OperationKind::Export, self.run_worker(spec)).await
    }

    async fn import(&self, request: ImportRequest) -> Result<(), TransferError> {
        let volume = VolumeName::new(request.volume)?;
        let (source_dir, file_name) = split_archive_path(&request.archive_path)?;
        info!("Importing {}/{} into volume {}", source_dir, file_name, volume);

        let spec = WorkerSpec::shell(self.settings.archiver_image.clone(), import_command(&file_name))
            .bind(volume.as_str(), VOLUME_MOUNT)
            .bind(&source_dir, HOST_MOUNT)
            .labels(operation_labels(OperationKind::Import, volume.as_str()));

        self.enveloped(&volume, OperationKind::Import, self.run_worker(spec)).await
    }

    async fn save(&self, request: ImageRequest) -> Result<(), TransferError> {
        let volume = VolumeName::new(request.volume)?;
        let reference = ImageReference::parse(&request.image)?;
        let spec = self.save_worker(&volume, OperationKind::Save);

        let work = async {
            self.runner.run_and_commit(&spec, &reference).await?;
            Ok::<(), TransferError>(())
        };
        self.enveloped(&volume, OperationKind::Save, work).await
    }

    async fn load(&self, request: ImageRequest) -> Result<(), TransferError> {
        let volume = VolumeName::new(request.volume)?;
        let reference = ImageReference::parse(&request.image)?;
        let spec = self.load_worker(&volume, &reference, OperationKind::Load);

        self.enveloped(&volume, OperationKind::Load, self.run_worker(spec)).await
    }

    async fn push(&self, request: RegistryRequest) -> Result<(), TransferError> {
        let volume = VolumeName::new(request.volume)?;
        let reference = ImageReference::parse(&request.reference)?;
        let spec = self.save_worker(&volume, OperationKind::Push);

        let _lease = self.leases.acquire(&volume).await;
        let (mut op, progress) = self.begin(&volume, OperationKind::Push).await;

        let save = async {
            self.runner.run_and_commit(&spec, &reference).await?;
            Ok::<(), TransferError>(())
        };
        // Consumers only need to be stopped while the snapshot is taken.
        let result = match self.with_consumers_stopped(&mut op, save).await {
            Ok(()) => self.registry.push(&reference, &request.auth).await,
            Err(e) => Err(e),
        };

        self.conclude(op, progress, result).await
    }

    async fn pull(&self, request: RegistryRequest) -> Result<(), TransferError> {
        let volume = VolumeName::new(request.volume)?;
        let reference = ImageReference::parse(&request.reference)?;
        let spec = self.load_worker(&volume, &reference, OperationKind::Pull);

        let _lease = self.leases.acquire(&volume).await;
        let (mut op, progress) = self.begin(&volume, OperationKind::Pull).await;

        // The volume is untouched unless the pull succeeded.
        let result = match self.registry.pull(&reference, &request.auth).await {
            Ok(()) => self.with_consumers_stopped(&mut op, self.run_worker(spec)).await,
            Err(e) => Err(e),
        };

        self.conclude(op, progress, result).await
    }

    async fn clone_volume(&self, request: CloneRequest) -> Result<(), TransferError> {
        let volume = VolumeName::new(request.volume)?;
        let destination = VolumeName::new(required(&request.destination_volume, "destVolume")?)?;
        if destination == volume {
            return Err(TransferError::invalid("destVolume must differ from the source volume"));
        }

        let _lease = self.leases.acquire_many(&[volume.clone(), destination.clone()]).await;
        let (mut op, progress) = self.begin(&volume, OperationKind::Clone).await;

        let result = self.clone_into(&mut op, &destination).await;

        self.conclude(op, progress, result).await
    }

    async fn delete(&self, volume: String) -> Result<(), TransferError> {
        let volume = VolumeName::new(volume)?;
        let work = async {
            self.runtime.remove_volume(volume.as_str(), true).await?;
            info!("Volume {} removed", volume);
            Ok::<(), TransferError>(())
        };
        self.enveloped(&volume, OperationKind::Delete, work).await
    }

    async fn empty(&self, volume: String) -> Result<(), TransferError> {
        let volume = VolumeName::new(volume)?;
        let spec = WorkerSpec::shell(self.settings.worker_image.clone(), empty_command())
            .bind(volume.as_str(), VOLUME_MOUNT)
            .labels(operation_labels(OperationKind::Empty, volume.as_str()));

        self.enveloped(&volume, OperationKind::Empty, self.run_worker(spec)).await
    }
}

#[async_trait]
impl TransferService for StandardTransferService {
    async fn list_volumes(&self) -> Result<BTreeMap<String, VolumeSummary>, TransferError> {
        self.engine.list_volumes().await
    }

    async fn volume_size(&self, volume: &str) -> Result<VolumeSize, TransferError> {
        self.engine.volume_size(volume).await
    }

    async fn volumes_size(&self) -> Result<BTreeMap<String, VolumeSize>, TransferError> {
        self.engine.volumes_size().await
    }

    async fn containers_for_volume(&self, volume: &str) -> Result<Vec<String>, TransferError> {
        self.engine.containers_for_volume(volume).await
    }

    async fn export(&self, request: ExportRequest) -> Result<(), TransferError> {
        self.detached(|engine| async move { engine.export(request).await }).await
    }

    async fn import(&self, request: ImportRequest) -> Result<(), TransferError> {
        self.detached(|engine| async move { engine.import(request).await }).await
    }

    async fn save(&self, request: ImageRequest) -> Result<(), TransferError> {
        self.detached(|engine| async move { engine.save(request).await }).await
    }

    async fn load(&self, request: ImageRequest) -> Result<(), TransferError> {
        self.detached(|engine| async move { engine.load(request).await }).await
    }

    async fn push(&self, request: RegistryRequest) -> Result<(), TransferError> {
        self.detached(|engine| async move { engine.push(request).await }).await
    }

    async fn pull(&self, request: RegistryRequest) -> Result<(), TransferError> {
        self.detached(|engine| async move { engine.pull(request).await }).await
    }

    async fn clone_volume(&self, request: CloneRequest) -> Result<(), TransferError> {
        self.detached(|engine| async move { engine.clone_volume(request).await }).await
    }

    async fn delete(&self, volume: &str) -> Result<(), TransferError> {
        let volume = volume.to_string();
        self.detached(|engine| async move { engine.delete(volume).await }).await
    }

    async fn empty(&self, volume: &str) -> Result<(), TransferError> {
        let volume = volume.to_string();
        self.detached(|engine| async move { engine.empty(volume).await }).await
    }

    fn actions_in_progress(&self) -> BTreeMap<String, OperationKind> {
        self.engine.progress.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_archive_path() {
        assert_eq!(
            split_archive_path("/home/me/backups/db.tar.gz").unwrap(),
            ("/home/me/backups".to_string(), "db.tar.gz".to_string())
        );
        assert_eq!(
            split_archive_path("/db.tar").unwrap(),
            ("/".to_string(), "db.tar".to_string())
        );
        assert_eq!(
            split_archive_path("C:\\\\Users\\\\me\\\\db.tar.zst").unwrap(),
            ("/C/Users/me".to_string(), "db.tar.zst".to_string())
        );
    }

    #[test]
    fn test_split_archive_path_rejects_bad_input() {
        assert_eq!(split_archive_path("").unwrap_err().class(), ErrorClass::BadRequest);
        assert_eq!(split_archive_path("db.tar").unwrap_err().class(), ErrorClass::BadRequest);
        assert_eq!(split_archive_path("/backups/").unwrap_err().class(), ErrorClass::BadRequest);
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("db.tar.gz"), "db.tar.gz");
        assert_eq!(base_name("nested/db.tar.gz"), "db.tar.gz");
        assert_eq!(base_name("C:\\dir\\db.tar"), "db.tar");
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = CourierConfig::default();
        config.spec.quiesce.stop_timeout_secs = 3;
        config.spec.concurrency.serialize_per_volume = false;

        let settings = TransferSettings::from(&config);
        assert_eq!(settings.stop_timeout, Duration::from_secs(3));
        assert!(!settings.serialize_per_volume);
        assert_eq!(settings.archiver_image, "docker.io/library/alpine:3.20");
    }
}
