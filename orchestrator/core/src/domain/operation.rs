// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Transfer operations and the envelope state machine they move through.

use crate::domain::volume::VolumeName;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Export,
    Import,
    Save,
    Load,
    Push,
    Pull,
    Clone,
    Delete,
    Empty,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Export => "export",
            OperationKind::Import => "import",
            OperationKind::Save => "save",
            OperationKind::Load => "load",
            OperationKind::Push => "push",
            OperationKind::Pull => "pull",
            OperationKind::Clone => "clone",
            OperationKind::Delete => "delete",
            OperationKind::Empty => "empty",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// States of one operation envelope.
///
/// ```text
/// Idle → MarkedInProgress → ConsumersQuiesced → WorkerRunning → WorkerDone
///      → ConsumersRestored → Cleared
/// ```
///
/// Every non-terminal state may move to `Failed`. `Failed` and
/// `ConsumersRestored` both end in `Cleared`, because progress cleanup always
/// runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationState {
    Idle,
    MarkedInProgress,
    ConsumersQuiesced,
    WorkerRunning,
    WorkerDone,
    ConsumersRestored,
    Failed,
    Cleared,
}

impl OperationState {
    pub fn can_transition_to(&self, next: OperationState) -> bool {
        use OperationState::*;
        matches!(
            (self, next),
            (Idle, MarkedInProgress)
                | (MarkedInProgress, ConsumersQuiesced)
                | (ConsumersQuiesced, WorkerRunning)
                | (WorkerRunning, WorkerDone)
                | (WorkerDone, WorkerRunning)
                | (WorkerDone, ConsumersRestored)
                | (ConsumersRestored, Cleared)
                | (Failed, Cleared)
                | (MarkedInProgress, Failed)
                | (ConsumersQuiesced, Failed)
                | (WorkerRunning, Failed)
                | (WorkerDone, Failed)
                | (ConsumersRestored, Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OperationState::Cleared)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid operation state transition {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: OperationState,
    pub to: OperationState,
}

/// One in-flight transfer on a volume. Never persisted.
#[derive(Debug)]
pub struct TransferOperation {
    pub volume: VolumeName,
    pub kind: OperationKind,
    state: OperationState,
    failed: bool,
    started_at: Instant,
}

impl TransferOperation {
    pub fn new(volume: VolumeName, kind: OperationKind) -> Self {
        Self {
            volume,
            kind,
            state: OperationState::Idle,
            failed: false,
            started_at: Instant::now(),
        }
    }

    pub fn state(&self) -> OperationState {
        self.state
    }

    /// True once the operation has passed through `Failed`.
    pub fn has_failed(&self) -> bool {
        self.failed
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }

    pub fn advance(&mut self, next: OperationState) -> Result<(), InvalidTransition> {
        if !self.state.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.state,
                to: next,
            });
        }

        tracing::debug!(
            volume = %self.volume,
            kind = %self.kind,
            "operation state {:?} -> {:?}",
            self.state,
            next
        );
        if next == OperationState::Failed {
            self.failed = true;
        }
        self.state = next;
        Ok(())
    }

    /// Moves to `Failed` unless the operation is already failed or cleared.
    pub fn fail(&mut self) {
        if self.state.can_transition_to(OperationState::Failed) {
            self.failed = true;
            self.state = OperationState::Failed;
        }
    }
}
