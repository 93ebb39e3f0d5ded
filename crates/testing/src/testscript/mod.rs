// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Golden scripts: blocks of commands, each followed by `---` and the output
//! the commands are expected to produce.
//!
//! ```text
//! # comment
//! add ex:a ex:p ex:b
//! append 1
//! ---
//! additions=1 deletions=0
//!
//! !append 1
//! ---
//! patch 1 must be greater than the latest patch 1
//! ```
//!
//! A `!` before a command expects it to fail and prints the error. Arguments
//! are whitespace separated, either positional or `key=value`, and may be
//! quoted with `"` (escapes allowed) or `'` (taken literally).

mod command;
mod parser;
mod runner;

pub use command::{Argument, ArgumentConsumer, Block, Command};
pub use parser::ParseError;
pub use runner::{Runner, generate, run, run_path, try_run};
