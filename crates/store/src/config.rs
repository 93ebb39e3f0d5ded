// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use serde::{Deserialize, Serialize};
use tessera_core::{Encoding, ValueLayout};
use tessera_type::{Error, Result};

use crate::backend::{Backend, sqlite::SqliteConfig};

pub const DEFAULT_BATCH_SIZE: usize = 1024;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendConfig {
	#[default]
	Memory,
	Sqlite(SqliteConfig),
}

/// Settings fixed for the lifetime of a store.
///
/// `layout` and `encoding` describe the records on disk, reopening a store
/// with different values makes its records unreadable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
	pub backend: BackendConfig,
	pub layout: ValueLayout,
	pub encoding: Encoding,
	/// Entries fetched per storage round trip during scans.
	pub batch_size: usize,
}

impl Default for StoreConfig {
	fn default() -> Self {
		Self {
			backend: BackendConfig::Memory,
			layout: ValueLayout::default(),
			encoding: Encoding::default(),
			batch_size: DEFAULT_BATCH_SIZE,
		}
	}
}

impl StoreConfig {
	pub fn memory() -> Self {
		Self::default()
	}

	pub fn sqlite(config: SqliteConfig) -> Self {
		Self {
			backend: BackendConfig::Sqlite(config),
			..Self::default()
		}
	}

	pub fn layout(mut self, layout: ValueLayout) -> Self {
		self.layout = layout;
		self
	}

	pub fn encoding(mut self, encoding: Encoding) -> Self {
		self.encoding = encoding;
		self
	}

	pub fn batch_size(mut self, batch_size: usize) -> Self {
		self.batch_size = batch_size;
		self
	}

	pub fn from_json(json: &str) -> Result<Self> {
		let config: StoreConfig = serde_json::from_str(json).map_err(|err| Error::Config(err.to_string()))?;
		config.validate()?;
		Ok(config)
	}

	pub fn validate(&self) -> Result<()> {
		if self.batch_size == 0 {
			return Err(Error::Config("batch_size must be positive".to_string()));
		}
		Ok(())
	}

	pub(crate) fn open_backend(&self) -> Result<Backend> {
		match &self.backend {
			BackendConfig::Memory => Ok(Backend::memory()),
			BackendConfig::Sqlite(config) => Backend::sqlite(config.clone()),
		}
	}
}
