// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Courier Configuration
//
// Kubernetes-style manifest (apiVersion/kind/metadata/spec) describing:
// - how to reach the container runtime
// - which images run workers, archivers and the size probe
// - quiescence timeouts and per-volume serialization
// - where the daemon listens and where metrics are exposed

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const API_VERSION: &str = "courier/v1";
pub const KIND: &str = "CourierConfig";

/// Top-level configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourierConfig {
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    pub kind: String,

    #[serde(default)]
    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: CourierSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,
}

impl Default for ManifestMetadata {
    fn default() -> Self {
        Self {
            name: "volume-courier".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CourierSpec {
    #[serde(default)]
    pub runtime: RuntimeSettings,

    #[serde(default)]
    pub images: WorkerImages,

    #[serde(default)]
    pub quiesce: QuiesceSettings,

    #[serde(default)]
    pub concurrency: ConcurrencySettings,

    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub metrics: MetricsSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeSettings {
    /// Docker socket or named pipe; auto-detected when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket_path: Option<String>,

    /// Directory holding one sub-directory per volume, as seen by the probe
    #[serde(default = "default_volumes_root")]
    pub volumes_root: String,

    /// Platform passed when pulling worker images, e.g. `linux/arm64`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            socket_path: None,
            volumes_root: default_volumes_root(),
            platform: None,
        }
    }
}

fn default_volumes_root() -> String {
    "/var/lib/docker/volumes".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerImages {
    /// Copies, clones, save workers and the UI refresh signal
    #[serde(default = "default_worker_image")]
    pub worker: String,

    /// Export/import; must ship tar, gzip and bzip2. `zstd` is installed
    /// with `apk` on first use when the image lacks it.
    #[serde(default = "default_archiver_image")]
    pub archiver: String,

    /// Runs `du` in the host PID namespace
    #[serde(default = "default_probe_image")]
    pub probe: String,
}

impl Default for WorkerImages {
    fn default() -> Self {
        Self {
            worker: default_worker_image(),
            archiver: default_archiver_image(),
            probe: default_probe_image(),
        }
    }
}

fn default_worker_image() -> String {
    "docker.io/library/busybox:stable".to_string()
}

fn default_archiver_image() -> String {
    "docker.io/library/alpine:3.20".to_string()
}

fn default_probe_image() -> String {
    "docker.io/justincormack/nsenter1".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuiesceSettings {
    /// Grace period before the runtime kills a consumer being stopped
    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,
}

impl QuiesceSettings {
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }
}

impl Default for QuiesceSettings {
    fn default() -> Self {
        Self {
            stop_timeout_secs: default_stop_timeout_secs(),
        }
    }
}

fn default_stop_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcurrencySettings {
    /// Run at most one mutating operation per volume at a time
    #[serde(default = "default_true")]
    pub serialize_per_volume: bool,
}

impl Default for ConcurrencySettings {
    fn default() -> Self {
        Self {
            serialize_per_volume: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_server_socket")]
    pub socket_path: PathBuf,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            socket_path: default_server_socket(),
        }
    }
}

fn default_server_socket() -> PathBuf {
    PathBuf::from("/run/guest/volume-courier.sock")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSettings {
    /// `host:port` for the Prometheus exporter; disabled when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen: Option<String>,
}

impl Default for CourierConfig {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata::default(),
            spec: CourierSpec::default(),
        }
    }
}

impl CourierConfig {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Discover configuration file using precedence order
    /// 1. COURIER_CONFIG_PATH environment variable
    /// 2. ./courier-config.yaml (working directory)
    /// 3. ~/.courier/config.yaml (user home)
    /// 4. /etc/courier/config.yaml (system, Unix) or C:\ProgramData\Courier\config.yaml (Windows)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("COURIER_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./courier-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".courier").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        let system_config = PathBuf::from("/etc/courier/config.yaml");
        #[cfg(windows)]
        let system_config = PathBuf::from("C:\\ProgramData\\Courier\\config.yaml");

        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::debug!("No configuration file found in standard locations, using defaults");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("COURIER_DOCKER_SOCKET") {
            if !val.is_empty() {
                tracing::info!("Environment override: COURIER_DOCKER_SOCKET={}", val);
                self.spec.runtime.socket_path = Some(val);
            }
        }

        if let Ok(val) = std::env::var("COURIER_SERVER_SOCKET") {
            if !val.is_empty() {
                tracing::info!("Environment override: COURIER_SERVER_SOCKET={}", val);
                self.spec.server.socket_path = PathBuf::from(val);
            }
        }

        if let Ok(val) = std::env::var("COURIER_SERIALIZE_PER_VOLUME") {
            match parse_bool(&val) {
                Some(flag) => {
                    tracing::info!("Environment override: COURIER_SERIALIZE_PER_VOLUME={}", flag);
                    self.spec.concurrency.serialize_per_volume = flag;
                }
                None => tracing::warn!(
                    "Ignoring COURIER_SERIALIZE_PER_VOLUME={}: expected true/false",
                    val
                ),
            }
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        let images = &self.spec.images;
        for (field, image) in [
            ("worker", &images.worker),
            ("archiver", &images.archiver),
            ("probe", &images.probe),
        ] {
            if image.trim().is_empty() {
                anyhow::bail!("spec.images.{} cannot be empty", field);
            }
        }

        if self.spec.quiesce.stop_timeout_secs == 0 {
            anyhow::bail!("spec.quiesce.stop_timeout_secs must be greater than zero");
        }

        if self.spec.runtime.volumes_root.trim().is_empty() {
            anyhow::bail!("spec.runtime.volumes_root cannot be empty");
        }

        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
