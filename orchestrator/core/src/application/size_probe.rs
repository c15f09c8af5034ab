// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Size Probe
//!
//! One privileged worker in the host PID namespace runs `du -d 0` over the
//! runtime's volume directory. Running a single worker for all volumes is much
//! faster than one per volume.

use crate::application::worker::{worker_labels, WorkerRunner};
use crate::domain::archive::disk_usage_command;
use crate::domain::runtime::WorkerSpec;
use crate::domain::transfer::TransferError;
use crate::domain::volume::{VolumeSelector, VolumeSize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Entries under the volumes root that are runtime metadata, not volumes.
const IGNORED_ENTRIES: [&str; 2] = ["backingFsBlockDev", "metadata.db"];

/// `du` reports this many blocks for an empty volume directory.
const EMPTY_DIRECTORY_BLOCKS: u64 = 8;

pub struct SizeProbe {
    runner: Arc<WorkerRunner>,
    image: String,
    volumes_root: String,
}

impl SizeProbe {
    pub fn new(runner: Arc<WorkerRunner>, image: impl Into<String>, volumes_root: impl Into<String>) -> Self {
        Self {
            runner,
            image: image.into(),
            volumes_root: volumes_root.into(),
        }
    }

    /// Sizes of the selected volumes, keyed by volume name. Not cached.
    ///
    /// A non-zero `du` exit is tolerated: it still prints every directory it
    /// could measure.
    pub async fn probe(&self, selector: &VolumeSelector) -> Result<BTreeMap<String, VolumeSize>, TransferError> {
        let outcome = self.runner.execute(&probe_worker_spec(&self.image, &self.volumes_root, selector)).await?;
        if !outcome.succeeded() {
            warn!("Size probe exited with status code {}", outcome.exit_code);
        }

        let sizes = parse_du_output(&outcome.output);
        debug!("Size probe measured {} volume(s)", sizes.len());
        Ok(sizes)
    }
}

/// Privileged, host-PID worker measuring the selected volume directories.
pub fn probe_worker_spec(image: &str, volumes_root: &str, selector: &VolumeSelector) -> WorkerSpec {
    let segment = selector.path_segment();
    WorkerSpec {
        tty: true,
        privileged: true,
        host_pid: true,
        labels: worker_labels("get-volumes-size", segment),
        ..WorkerSpec::shell(image, disk_usage_command(volumes_root, segment))
    }
}

/// Parses `du -d 0` output (`<blocks>\t<path>` per line) into sizes keyed by
/// the path's final component.
pub fn parse_du_output(output: &str) -> BTreeMap<String, VolumeSize> {
    let mut sizes = BTreeMap::new();

    for line in output.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        let [blocks, path] = fields.as_slice() else {
            warn!("skipping line: {}", line);
            continue;
        };

        let path = path.trim_end_matches('\r');
        let blocks: u64 = match blocks.trim().parse() {
            Ok(blocks) => blocks,
            Err(e) => {
                warn!("skipping line {:?}: {}", line, e);
                continue;
            }
        };

        let name = path.rsplit('/').next().unwrap_or(path);
        if name.is_empty() || IGNORED_ENTRIES.contains(&name) {
            continue;
        }

        let blocks = if blocks == EMPTY_DIRECTORY_BLOCKS { 0 } else { blocks };
        sizes.insert(name.to_string(), VolumeSize::from_bytes(blocks * 1000));
    }

    sizes
}
