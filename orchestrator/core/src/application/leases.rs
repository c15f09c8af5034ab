// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::volume::VolumeName;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-volume leases serializing mutating operations on the same volume
/// within this process. Disabled leases are always granted immediately.
pub struct VolumeLeases {
    enabled: bool,
    locks: Arc<DashMap<VolumeName, Arc<Mutex<()>>>>,
}

/// Held for the duration of one operation. Releasing the last lease on a
/// volume drops its lock from the map.
pub struct VolumeLease {
    guards: Vec<(VolumeName, OwnedMutexGuard<()>)>,
    locks: Option<Arc<DashMap<VolumeName, Arc<Mutex<()>>>>>,
}

impl Drop for VolumeLease {
    fn drop(&mut self) {
        let Some(locks) = self.locks.take() else {
            return;
        };
        for (volume, guard) in self.guards.drain(..) {
            drop(guard);
            // Waiters hold their own clone, so a count of one means idle.
            locks.remove_if(&volume, |_, lock| Arc::strong_count(lock) == 1);
        }
    }
}

impl VolumeLeases {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            locks: Arc::new(DashMap::new()),
        }
    }

    pub async fn acquire(&self, volume: &VolumeName) -> VolumeLease {
        self.acquire_many(std::slice::from_ref(volume)).await
    }

    /// Leases several volumes at once. Locks are taken in name order so two
    /// operations over the same pair cannot deadlock.
    pub async fn acquire_many(&self, volumes: &[VolumeName]) -> VolumeLease {
        if !self.enabled {
            return VolumeLease {
                guards: Vec::new(),
                locks: None,
            };
        }

        let mut ordered: Vec<&VolumeName> = volumes.iter().collect();
        ordered.sort();
        ordered.dedup();

        let mut guards = Vec::with_capacity(ordered.len());
        for volume in ordered {
            let lock = self
                .locks
                .entry(volume.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone();
            guards.push((volume.clone(), lock.lock_owned().await));
        }

        VolumeLease {
            guards,
            locks: Some(Arc::clone(&self.locks)),
        }
    }
}
