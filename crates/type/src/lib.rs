// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

#![cfg_attr(not(debug_assertions), deny(warnings))]

pub use error::{Error, Result};
pub use term::TermId;

pub mod error;
mod term;

/// Identifies one recorded revision. Revision 0 is the base snapshot.
pub type PatchId = u32;
