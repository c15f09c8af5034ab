// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

// ============================================================================
// Value Objects
// ============================================================================

/// Name of a runtime-managed volume.
///
/// Docker restricts volume names to `[a-zA-Z0-9][a-zA-Z0-9_.-]+`. Enforcing the
/// same grammar here means a name can be interpolated into worker shell
/// commands and bind specs without quoting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VolumeName(String);

impl VolumeName {
    pub fn new(name: impl Into<String>) -> Result<Self, VolumeNameError> {
        let name = name.into();
        let mut chars = name.chars();

        match chars.next() {
            None => return Err(VolumeNameError::Empty),
            Some(first) if !first.is_ascii_alphanumeric() => {
                return Err(VolumeNameError::Invalid(name));
            }
            Some(_) => {}
        }

        if !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')) {
            return Err(VolumeNameError::Invalid(name));
        }

        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for VolumeName {
    type Error = VolumeNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<VolumeName> for String {
    fn from(value: VolumeName) -> Self {
        value.0
    }
}

impl std::fmt::Display for VolumeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VolumeNameError {
    #[error("volume is required")]
    Empty,
    #[error("invalid volume name '{0}': only [a-zA-Z0-9][a-zA-Z0-9_.-] are allowed")]
    Invalid(String),
}

/// Disk usage of a single volume as reported by the size probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSize {
    #[serde(rename = "Bytes")]
    pub bytes: u64,
    #[serde(rename = "Human")]
    pub human: String,
}

impl VolumeSize {
    pub fn from_bytes(bytes: u64) -> Self {
        Self {
            bytes,
            human: byte_count_si(bytes),
        }
    }
}

impl Default for VolumeSize {
    fn default() -> Self {
        Self::from_bytes(0)
    }
}

/// Selects which volumes a size probe measures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeSelector {
    All,
    Named(VolumeName),
}

impl VolumeSelector {
    /// Path segment appended to the runtime's volumes root. `*` is expanded by
    /// the worker's shell.
    pub fn path_segment(&self) -> &str {
        match self {
            VolumeSelector::All => "*",
            VolumeSelector::Named(name) => name.as_str(),
        }
    }
}

/// Volume as described by the runtime control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeInfo {
    pub name: String,
    pub driver: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

/// Row of the volume listing: driver, size and bound consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSummary {
    #[serde(rename = "Driver")]
    pub driver: String,
    #[serde(rename = "Size")]
    pub size: u64,
    #[serde(rename = "SizeHuman")]
    pub size_human: String,
    #[serde(rename = "Containers")]
    pub containers: Vec<String>,
}

// ============================================================================
// Formatting
// ============================================================================

/// Formats a byte count with decimal (SI) units.
///
/// `999` → `"999 B"`, `1000` → `"1.0 kB"`, `987_654_321` → `"987.7 MB"`.
pub fn byte_count_si(bytes: u64) -> String {
    const UNIT: u64 = 1000;
    const PREFIXES: [char; 6] = ['k', 'M', 'G', 'T', 'P', 'E'];

    if bytes < UNIT {
        return format!("{} B", bytes);
    }

    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }

    format!("{:.1} {}B", bytes as f64 / div as f64, PREFIXES[exp])
}
