// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Volumes, runtime port, registry references, operation envelope and the
//! worker command vocabulary.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Pure types and rules; no I/O outside the `ContainerRuntime` port

pub mod archive;
pub mod config;
pub mod operation;
pub mod registry;
pub mod runtime;
pub mod transfer;
pub mod volume;
