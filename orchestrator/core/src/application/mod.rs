// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod leases;
pub mod progress;
pub mod quiescence;
pub mod refresh;
pub mod registry_transfer;
pub mod size_probe;
pub mod transfer_service;
pub mod worker;

// Re-export use cases for convenience
pub use progress::{ProgressGuard, ProgressTracker, RefreshSignal};
pub use transfer_service::{
    CloneRequest, ExportRequest, ImageRequest, ImportRequest, RegistryRequest, StandardTransferService,
    TransferService, TransferSettings,
};
