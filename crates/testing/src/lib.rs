// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Helpers shared by the tests of the workspace crates.

pub mod logging;
pub mod tempdir;
pub mod testscript;
