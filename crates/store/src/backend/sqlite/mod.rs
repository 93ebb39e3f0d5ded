// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Persistent storage on SQLite, one table per index.

mod connection;
mod iterator;
mod storage;

use std::path::{Path, PathBuf};

pub use iterator::SqliteRangeIter;
use serde::{Deserialize, Serialize};
pub use storage::SqliteStorage;

/// Where the database lives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DbPath {
	/// A database file, or a directory receiving `tessera.db`.
	File(PathBuf),
	/// A private in-memory database.
	#[default]
	Memory,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalMode {
	Delete,
	Truncate,
	Persist,
	Memory,
	#[default]
	Wal,
	Off,
}

impl JournalMode {
	pub fn as_str(&self) -> &'static str {
		match self {
			JournalMode::Delete => "DELETE",
			JournalMode::Truncate => "TRUNCATE",
			JournalMode::Persist => "PERSIST",
			JournalMode::Memory => "MEMORY",
			JournalMode::Wal => "WAL",
			JournalMode::Off => "OFF",
		}
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynchronousMode {
	Off,
	#[default]
	Normal,
	Full,
	Extra,
}

impl SynchronousMode {
	pub fn as_str(&self) -> &'static str {
		match self {
			SynchronousMode::Off => "OFF",
			SynchronousMode::Normal => "NORMAL",
			SynchronousMode::Full => "FULL",
			SynchronousMode::Extra => "EXTRA",
		}
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TempStore {
	Default,
	File,
	#[default]
	Memory,
}

impl TempStore {
	pub fn as_str(&self) -> &'static str {
		match self {
			TempStore::Default => "DEFAULT",
			TempStore::File => "FILE",
			TempStore::Memory => "MEMORY",
		}
	}
}

/// Connection and pragma settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
	pub path: DbPath,
	pub journal_mode: JournalMode,
	pub synchronous_mode: SynchronousMode,
	pub temp_store: TempStore,
	/// Page cache size in KiB.
	pub cache_size: u32,
	pub page_size: u32,
}

impl Default for SqliteConfig {
	fn default() -> Self {
		Self::in_memory()
	}
}

impl SqliteConfig {
	pub fn new(path: impl AsRef<Path>) -> Self {
		Self {
			path: DbPath::File(path.as_ref().to_path_buf()),
			journal_mode: JournalMode::Wal,
			synchronous_mode: SynchronousMode::Normal,
			temp_store: TempStore::Memory,
			cache_size: 20_000,
			page_size: 4096,
		}
	}

	/// Durable settings for production data.
	pub fn safe(path: impl AsRef<Path>) -> Self {
		Self {
			synchronous_mode: SynchronousMode::Full,
			temp_store: TempStore::File,
			..Self::new(path)
		}
	}

	/// Trades durability for speed.
	pub fn fast(path: impl AsRef<Path>) -> Self {
		Self {
			journal_mode: JournalMode::Memory,
			synchronous_mode: SynchronousMode::Off,
			cache_size: 50_000,
			..Self::new(path)
		}
	}

	pub fn in_memory() -> Self {
		Self {
			path: DbPath::Memory,
			journal_mode: JournalMode::Memory,
			synchronous_mode: SynchronousMode::Off,
			temp_store: TempStore::Memory,
			cache_size: 20_000,
			page_size: 4096,
		}
	}

	pub fn journal_mode(mut self, mode: JournalMode) -> Self {
		self.journal_mode = mode;
		self
	}

	pub fn synchronous_mode(mut self, mode: SynchronousMode) -> Self {
		self.synchronous_mode = mode;
		self
	}

	pub fn cache_size(mut self, size_kib: u32) -> Self {
		self.cache_size = size_kib;
		self
	}
}
