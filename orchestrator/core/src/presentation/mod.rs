// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Presentation Layer (`volume-courier-core`)
//!
//! HTTP surface that translates requests into transfer service calls. No
//! business logic lives here.
//!
//! | Module | Transport | Description |
//! |--------|-----------|-------------|
//! | [`api`] | HTTP (Axum) | Volume listing, sizes, transfers and progress polling |

pub mod api;
