// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Volume Courier Core
//!
//! Backs up, restores, clones and transfers runtime-managed volumes while
//! keeping the containers that use them from seeing data mid-transfer.
//!
//! # Architecture
//!
//! - **Domain:** volumes, runtime port, registry references, operation envelope
//! - **Application:** quiescence, worker runner, size probe, progress, transfer service
//! - **Infrastructure:** Docker adapter (`bollard`)
//! - **Presentation:** HTTP API (`axum`)

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
