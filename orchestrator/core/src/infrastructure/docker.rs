// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Docker adapter for the [`ContainerRuntime`] port, built on `bollard`.

use crate::domain::registry::{ImageReference, RegistryAuth};
use crate::domain::runtime::{
    ContainerFilter, ContainerId, ContainerRuntime, ContainerSummary, RuntimeError, TransferLog, WorkerSpec,
};
use crate::domain::volume::VolumeInfo;
use async_trait::async_trait;
use base64::Engine;
use bollard::auth::DockerCredentials;
use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, LogOutput, LogsOptions, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions, WaitContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::image::{CommitContainerOptions, CreateImageOptions, PushImageOptions};
use bollard::models::HostConfig;
use bollard::volume::{CreateVolumeOptions, RemoveVolumeOptions};
use bollard::Docker;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct DockerRuntime {
    docker: Docker,
    platform: String,
}

impl DockerRuntime {
    pub fn new(socket_path: Option<String>, platform: Option<String>) -> Result<Self, RuntimeError> {
        // Connect to Docker daemon (custom socket or auto-detect)
        let docker = if let Some(path) = socket_path {
            #[cfg(unix)]
            let result = Docker::connect_with_unix(&path, 120, bollard::API_DEFAULT_VERSION);

            #[cfg(windows)]
            let result = Docker::connect_with_named_pipe(&path, 120, bollard::API_DEFAULT_VERSION);

            result.map_err(|e| {
                RuntimeError::Connection(format!(
                    "Failed to connect to Docker at {}: {}\n\n\
                     Ensure Docker is running and the socket path is correct.",
                    path, e
                ))
            })?
        } else {
            Docker::connect_with_local_defaults().map_err(|e| {
                RuntimeError::Connection(format!(
                    "Failed to connect to Docker: {}\n\n\
                     Common causes:\n\
                     - Docker daemon not running (check: docker ps)\n\
                     - Permission denied accessing Docker socket\n\
                     - On Linux: Current user not in 'docker' group",
                    e
                ))
            })?
        };

        Ok(Self {
            docker,
            platform: platform.unwrap_or_else(default_platform),
        })
    }

    /// Verify Docker daemon is accessible
    pub async fn healthcheck(&self) -> Result<(), RuntimeError> {
        self.docker.ping().await.map_err(|e| {
            RuntimeError::Connection(format!(
                "Cannot connect to Docker daemon: {}\n\n\
                 Verify with: docker ps",
                e
            ))
        })?;
        Ok(())
    }

    fn container_config(spec: &WorkerSpec) -> Config<String> {
        let host_config = HostConfig {
            binds: (!spec.binds.is_empty()).then(|| spec.binds.clone()),
            privileged: spec.privileged.then_some(true),
            pid_mode: spec.host_pid.then(|| "host".to_string()),
            auto_remove: spec.auto_remove.then_some(true),
            ..Default::default()
        };

        Config {
            image: Some(spec.image.clone()),
            cmd: (!spec.cmd.is_empty()).then(|| spec.cmd.clone()),
            tty: Some(spec.tty),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            user: spec.user.clone(),
            labels: (!spec.labels.is_empty()).then(|| spec.labels.clone()),
            host_config: Some(host_config),
            ..Default::default()
        }
    }

    /// Collects a registry response stream into one JSON object per line.
    /// Transport errors become `{"error": ...}` lines so a single scanner
    /// classifies both.
    async fn collect_progress<S, T>(stream: S) -> TransferLog
    where
        S: Stream<Item = Result<T, DockerError>>,
        T: Serialize,
    {
        let mut stream = Box::pin(stream);
        let mut lines = Vec::new();
        while let Some(item) = stream.next().await {
            match item {
                Ok(info) => match serde_json::to_string(&info) {
                    Ok(line) => lines.push(line),
                    Err(e) => warn!("Unreadable registry progress message: {}", e),
                },
                Err(e) => {
                    lines.push(serde_json::json!({ "error": e.to_string() }).to_string());
                    break;
                }
            }
        }
        lines
    }
}

/// `linux/<arch>` in the naming the registries use.
fn default_platform() -> String {
    let arch = match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "arm" => "arm",
        other => other,
    };
    format!("linux/{}", arch)
}

fn map_error(operation: &'static str, target: &str, err: DockerError) -> RuntimeError {
    match err {
        DockerError::DockerResponseServerError { status_code: 404, message } => {
            RuntimeError::NotFound(format!("{}: {}", target, message))
        }
        DockerError::HyperResponseError { .. } | DockerError::IOError { .. } => {
            RuntimeError::Connection(err.to_string())
        }
        other => RuntimeError::request(operation, target, other),
    }
}

/// Shape of the JSON encoded in `X-Registry-Auth`.
#[derive(Debug, Default, Deserialize)]
struct EncodedCredentials {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    auth: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    serveraddress: Option<String>,
    #[serde(default)]
    identitytoken: Option<String>,
    #[serde(default)]
    registrytoken: Option<String>,
}

/// Decodes the header value into credentials. The empty token, or anything
/// that is not base64 JSON, means anonymous access.
fn decode_credentials(auth: &RegistryAuth) -> Option<DockerCredentials> {
    if auth.is_empty_credential() {
        return None;
    }

    let encoded = auth.encoded();
    let bytes = base64::engine::general_purpose::URL_SAFE
        .decode(encoded)
        .or_else(|_| base64::engine::general_purpose::STANDARD.decode(encoded))
        .ok()?;

    match serde_json::from_slice::<EncodedCredentials>(&bytes) {
        Ok(c) => Some(DockerCredentials {
            username: c.username,
            password: c.password,
            auth: c.auth,
            email: c.email,
            serveraddress: c.serveraddress,
            identitytoken: c.identitytoken,
            registrytoken: c.registrytoken,
        }),
        Err(e) => {
            debug!("Registry auth header is not JSON, pulling anonymously: {}", e);
            None
        }
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn list_containers(&self, filter: ContainerFilter) -> Result<Vec<ContainerSummary>, RuntimeError> {
        let mut filters: HashMap<String, Vec<String>> = HashMap::new();
        if let Some(volume) = &filter.volume {
            filters.insert("volume".to_string(), vec![volume.clone()]);
        }
        if let Some(name) = &filter.name {
            filters.insert("name".to_string(), vec![name.clone()]);
        }

        let options = ListContainersOptions {
            all: filter.include_stopped,
            filters,
            ..Default::default()
        };

        let target = filter.volume.as_deref().or(filter.name.as_deref()).unwrap_or("*");
        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| map_error("list containers for", target, e))?;

        Ok(containers
            .into_iter()
            .map(|c| ContainerSummary {
                id: c.id.unwrap_or_default(),
                names: c
                    .names
                    .unwrap_or_default()
                    .into_iter()
                    .map(|n| n.trim_start_matches('/').to_string())
                    .collect(),
                running: c.state.as_deref() == Some("running"),
            })
            .collect())
    }

    async fn create_container(&self, spec: &WorkerSpec) -> Result<ContainerId, RuntimeError> {
        let options = CreateContainerOptions {
            name: format!("courier-worker-{}", uuid::Uuid::new_v4()),
            platform: None,
        };

        let res = self
            .docker
            .create_container(Some(options), Self::container_config(spec))
            .await
            .map_err(|e| map_error("create worker from", &spec.image, e))?;

        for warning in &res.warnings {
            warn!("Docker warning creating worker {}: {}", res.id, warning);
        }
        Ok(ContainerId::new(res.id))
    }

    async fn start_container(&self, id: &str) -> Result<(), RuntimeError> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| map_error("start container", id, e))
    }

    async fn stop_container(&self, id: &str, grace: Duration) -> Result<(), RuntimeError> {
        let options = StopContainerOptions {
            t: grace.as_secs() as i64,
        };
        self.docker
            .stop_container(id, Some(options))
            .await
            .map_err(|e| map_error("stop container", id, e))
    }

    async fn wait_container(&self, id: &str) -> Result<i64, RuntimeError> {
        let options = WaitContainerOptions {
            condition: "not-running",
        };
        let mut stream = Box::pin(self.docker.wait_container(id, Some(options)));

        let mut exit_code = 0;
        while let Some(result) = stream.next().await {
            match result {
                Ok(response) => exit_code = response.status_code,
                // bollard reports a non-zero exit as an error carrying the code
                Err(DockerError::DockerContainerWaitError { code, .. }) => exit_code = code,
                Err(e) => return Err(map_error("wait for container", id, e)),
            }
        }
        Ok(exit_code)
    }

    async fn container_logs(&self, id: &str) -> Result<String, RuntimeError> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            ..Default::default()
        };

        let mut stream = Box::pin(self.docker.logs(id, Some(options)));
        let mut output = String::new();
        while let Some(chunk) = stream.next().await {
            match chunk.map_err(|e| map_error("read logs of", id, e))? {
                LogOutput::StdOut { message }
                | LogOutput::StdErr { message }
                | LogOutput::Console { message }
                | LogOutput::StdIn { message } => output.push_str(&String::from_utf8_lossy(&message)),
            }
        }
        Ok(output)
    }

    async fn remove_container(&self, id: &str) -> Result<(), RuntimeError> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        self.docker
            .remove_container(id, Some(options))
            .await
            .map_err(|e| map_error("remove container", id, e))?;
        debug!("Removed worker {}", id);
        Ok(())
    }

    async fn commit_container(&self, id: &str, reference: &ImageReference) -> Result<(), RuntimeError> {
        let options = CommitContainerOptions {
            container: id.to_string(),
            repo: reference.repository.clone(),
            tag: reference.tag.clone(),
            pause: true,
            ..Default::default()
        };
        self.docker
            .commit_container(options, Config::<String>::default())
            .await
            .map_err(|e| map_error("commit container", id, e))?;
        info!("Committed worker {} as {}", id, reference);
        Ok(())
    }

    async fn image_exists(&self, image: &str) -> Result<bool, RuntimeError> {
        match self.docker.inspect_image(image).await {
            Ok(_) => Ok(true),
            Err(DockerError::DockerResponseServerError { status_code: 404, .. }) => Ok(false),
            Err(e) => Err(map_error("inspect image", image, e)),
        }
    }

    async fn pull_image(&self, image: &str) -> Result<(), RuntimeError> {
        info!("Pulling image: {}", image);
        let options = Some(CreateImageOptions {
            from_image: image.to_string(),
            platform: self.platform.clone(),
            ..Default::default()
        });

        let mut stream = Box::pin(self.docker.create_image(options, None, None));
        while let Some(result) = stream.next().await {
            if let Err(e) = result {
                return Err(RuntimeError::ImageUnavailable {
                    image: image.to_string(),
                    message: e.to_string(),
                });
            }
        }
        info!("Successfully pulled image: {}", image);
        Ok(())
    }

    async fn push_image(&self, reference: &ImageReference, auth: &RegistryAuth) -> Result<TransferLog, RuntimeError> {
        let options = PushImageOptions {
            tag: reference.tag.clone(),
        };
        let stream = self
            .docker
            .push_image(&reference.repository, Some(options), decode_credentials(auth));
        Ok(Self::collect_progress(stream).await)
    }

    async fn pull_image_authenticated(
        &self,
        reference: &ImageReference,
        auth: &RegistryAuth,
    ) -> Result<TransferLog, RuntimeError> {
        let options = CreateImageOptions {
            from_image: reference.repository.clone(),
            tag: reference.digest.clone().unwrap_or_else(|| reference.tag.clone()),
            platform: self.platform.clone(),
            ..Default::default()
        };
        let stream = self.docker.create_image(Some(options), None, decode_credentials(auth));
        Ok(Self::collect_progress(stream).await)
    }

    async fn list_volumes(&self) -> Result<Vec<VolumeInfo>, RuntimeError> {
        let response = self
            .docker
            .list_volumes::<String>(None)
            .await
            .map_err(|e| map_error("list", "volumes", e))?;

        Ok(response
            .volumes
            .unwrap_or_default()
            .into_iter()
            .map(|v| VolumeInfo {
                name: v.name,
                driver: v.driver,
                labels: v.labels,
            })
            .collect())
    }

    async fn inspect_volume(&self, name: &str) -> Result<VolumeInfo, RuntimeError> {
        let v = self
            .docker
            .inspect_volume(name)
            .await
            .map_err(|e| map_error("inspect volume", name, e))?;
        Ok(VolumeInfo {
            name: v.name,
            driver: v.driver,
            labels: v.labels,
        })
    }

    async fn create_volume(
        &self,
        name: &str,
        driver: &str,
        labels: HashMap<String, String>,
    ) -> Result<VolumeInfo, RuntimeError> {
        let options = CreateVolumeOptions {
            name: name.to_string(),
            driver: driver.to_string(),
            driver_opts: HashMap::new(),
            labels,
        };
        let v = self
            .docker
            .create_volume(options)
            .await
            .map_err(|e| map_error("create volume", name, e))?;
        Ok(VolumeInfo {
            name: v.name,
            driver: v.driver,
            labels: v.labels,
        })
    }

    async fn remove_volume(&self, name: &str, force: bool) -> Result<(), RuntimeError> {
        self.docker
            .remove_volume(name, Some(RemoveVolumeOptions { force }))
            .await
            .map_err(|e| map_error("remove volume", name, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_config_from_worker_spec() {
        let mut spec = WorkerSpec::shell("busybox", "true").bind("db", "/vackup-volume");
        spec.privileged = true;
        spec.host_pid = true;

        let config = DockerRuntime::container_config(&spec);
        let host = config.host_config.unwrap();
        assert_eq!(host.binds, Some(vec!["db:/vackup-volume".to_string()]));
        assert_eq!(host.privileged, Some(true));
        assert_eq!(host.pid_mode.as_deref(), Some("host"));
        assert_eq!(host.auto_remove, None);
        assert_eq!(config.labels, None);
    }

    #[test]
    fn test_decode_credentials() {
        assert!(decode_credentials(&RegistryAuth::default()).is_none());

        let json = r#"{"username":"felipe","password":"s3cret","serveraddress":"localhost:5000"}"#;
        let encoded = base64::engine::general_purpose::STANDARD.encode(json);
        let creds = decode_credentials(&RegistryAuth::from_header(Some(&encoded))).unwrap();
        assert_eq!(creds.username.as_deref(), Some("felipe"));
        assert_eq!(creds.serveraddress.as_deref(), Some("localhost:5000"));

        assert!(decode_credentials(&RegistryAuth::from_header(Some("%%%"))).is_none());
    }

    #[test]
    fn test_default_platform_is_linux() {
        assert!(default_platform().starts_with("linux/"));
    }

    #[tokio::test]
    #[ignore] // requires a running Docker daemon
    async fn test_healthcheck_live() {
        let runtime = DockerRuntime::new(None, None).unwrap();
        runtime.healthcheck().await.unwrap();
    }
}
