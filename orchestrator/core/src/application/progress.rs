// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Progress Tracker
//!
//! In-memory map of volume name to the action currently running on it. The
//! tracker is owned by the transfer service and shared with the HTTP layer for
//! polling; it is never persisted.
//!
//! Entries are created by [`ProgressTracker::begin`], which hands back a
//! [`ProgressGuard`]. The entry disappears when the guard is finished or
//! dropped, so it is cleared on every exit path including request cancellation.

use crate::domain::operation::OperationKind;
use crate::domain::runtime::RuntimeError;
use crate::domain::volume::VolumeName;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Non-critical notification telling UIs that the set of in-flight actions
/// changed. Failures are logged and never fail an operation.
#[async_trait]
pub trait RefreshSignal: Send + Sync {
    async fn notify(&self) -> Result<(), RuntimeError>;
}

/// Signal that does nothing; used when no UI is attached.
pub struct NoopRefreshSignal;

#[async_trait]
impl RefreshSignal for NoopRefreshSignal {
    async fn notify(&self) -> Result<(), RuntimeError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    kind: OperationKind,
    token: u64,
}

pub struct ProgressTracker {
    entries: Mutex<HashMap<VolumeName, Entry>>,
    next_token: AtomicU64,
    signal: Arc<dyn RefreshSignal>,
}

impl ProgressTracker {
    pub fn new(signal: Arc<dyn RefreshSignal>) -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(1),
            signal,
        })
    }

    /// Tracker without a refresh signal.
    pub fn detached() -> Arc<Self> {
        Self::new(Arc::new(NoopRefreshSignal))
    }

    /// Marks `volume` as running `kind` and fires the refresh signal.
    ///
    /// A later `begin` on the same volume replaces the entry; the earlier
    /// guard then no longer removes it.
    pub async fn begin(self: &Arc<Self>, volume: &VolumeName, kind: OperationKind) -> ProgressGuard {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let in_flight = {
            let mut entries = self.entries.lock();
            entries.insert(volume.clone(), Entry { kind, token });
            entries.len()
        };
        metrics::gauge!("courier_operations_in_progress").set(in_flight as f64);
        debug!(volume = %volume, action = %kind, "progress entry created");

        self.refresh().await;

        ProgressGuard {
            tracker: Arc::clone(self),
            volume: volume.clone(),
            token,
            finished: false,
        }
    }

    /// Removes whatever entry `volume` has and fires the refresh signal.
    pub async fn end(&self, volume: &VolumeName) {
        if self.remove(volume, None) {
            self.refresh().await;
        }
    }

    /// Copy of the current map, ordered by volume name.
    pub fn snapshot(&self) -> BTreeMap<String, OperationKind> {
        self.entries
            .lock()
            .iter()
            .map(|(volume, entry)| (volume.to_string(), entry.kind))
            .collect()
    }

    /// Removes the entry for `volume`, only if it still carries `token` when
    /// one is given. Returns whether anything was removed.
    fn remove(&self, volume: &VolumeName, token: Option<u64>) -> bool {
        let (removed, in_flight) = {
            let mut entries = self.entries.lock();
            let matches = match (entries.get(volume), token) {
                (Some(entry), Some(token)) => entry.token == token,
                (Some(_), None) => true,
                (None, _) => false,
            };
            if matches {
                entries.remove(volume);
            }
            (matches, entries.len())
        };

        if removed {
            metrics::gauge!("courier_operations_in_progress").set(in_flight as f64);
            debug!(volume = %volume, "progress entry cleared");
        }
        removed
    }

    async fn refresh(&self) {
        if let Err(e) = self.signal.notify().await {
            warn!("UI refresh signal failed: {}", e);
        }
    }
}

/// Scope guard for one progress entry.
pub struct ProgressGuard {
    tracker: Arc<ProgressTracker>,
    volume: VolumeName,
    token: u64,
    finished: bool,
}

impl ProgressGuard {
    /// Clears the entry and waits for the refresh signal.
    pub async fn finish(mut self) {
        self.finished = true;
        if self.tracker.remove(&self.volume, Some(self.token)) {
            self.tracker.refresh().await;
        }
    }
}

impl Drop for ProgressGuard {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        if !self.tracker.remove(&self.volume, Some(self.token)) {
            return;
        }

        // Dropped without finish(): cancelled request or early return.
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let signal = Arc::clone(&self.tracker.signal);
                handle.spawn(async move {
                    if let Err(e) = signal.notify().await {
                        warn!("UI refresh signal failed: {}", e);
                    }
                });
            }
            Err(_) => debug!("no runtime available, skipping UI refresh"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingSignal {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl RefreshSignal for CountingSignal {
        async fn notify(&self) -> Result<(), RuntimeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(RuntimeError::Connection("socket closed".into()))
            } else {
                Ok(())
            }
        }
    }

    fn signal(fail: bool) -> Arc<CountingSignal> {
        Arc::new(CountingSignal {
            calls: AtomicUsize::new(0),
            fail,
        })
    }

    fn volume(name: &str) -> VolumeName {
        VolumeName::new(name).unwrap()
    }

    #[tokio::test]
    async fn test_begin_and_finish_lifecycle() {
        let signal = signal(false);
        let tracker = ProgressTracker::new(signal.clone());
        let vol = volume("db");

        assert!(tracker.snapshot().is_empty());
        let guard = tracker.begin(&vol, OperationKind::Export).await;
        assert_eq!(tracker.snapshot().get("db").copied(), Some(OperationKind::Export));

        guard.finish().await;
        assert!(tracker.snapshot().is_empty());
        assert_eq!(signal.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_drop_clears_entry() {
        let tracker = ProgressTracker::detached();
        let vol = volume("db");
        {
            let _guard = tracker.begin(&vol, OperationKind::Import).await;
            assert_eq!(tracker.snapshot().len(), 1);
        }
        assert!(tracker.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_stale_guard_keeps_newer_entry() {
        let tracker = ProgressTracker::detached();
        let vol = volume("db");

        let first = tracker.begin(&vol, OperationKind::Save).await;
        let second = tracker.begin(&vol, OperationKind::Load).await;
        first.finish().await;
        assert_eq!(tracker.snapshot().get("db").copied(), Some(OperationKind::Load));

        second.finish().await;
        assert_eq!(tracker.snapshot().get("db").copied(), None);
    }

    #[tokio::test]
    async fn test_signal_failure_is_not_fatal() {
        let signal = signal(true);
        let tracker = ProgressTracker::new(signal.clone());
        let vol = volume("db");

        let guard = tracker.begin(&vol, OperationKind::Push).await;
        assert_eq!(tracker.snapshot().get("db").copied(), Some(OperationKind::Push));
        guard.finish().await;
        assert_eq!(tracker.snapshot().get("db").copied(), None);
        assert_eq!(signal.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_end_removes_any_entry() {
        let tracker = ProgressTracker::detached();
        let vol = volume("db");
        let guard = tracker.begin(&vol, OperationKind::Clone).await;
        tracker.end(&vol).await;
        assert!(tracker.snapshot().is_empty());
        // Guard finds nothing left to remove.
        guard.finish().await;
        assert!(tracker.snapshot().is_empty());
    }
}
