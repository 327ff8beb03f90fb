// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI command implementations

pub mod cycle;
pub mod daemon;
pub mod input;
pub mod user;
