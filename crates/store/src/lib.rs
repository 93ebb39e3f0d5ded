// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

#![cfg_attr(not(debug_assertions), deny(warnings))]

pub use tessera_type::Result;

pub mod backend;
pub mod config;
pub mod materialized;
pub mod metadata;
pub mod snapshot;
mod store;
pub mod tree;
pub mod version;

pub use backend::{Backend, IndexId, IndexStorage, RawEntry};
pub use config::{BackendConfig, DEFAULT_BATCH_SIZE, StoreConfig};
pub use materialized::{DeltaMaterializedIterator, TripleDelta, VersionMaterializedIterator};
pub use metadata::MetadataStore;
pub use snapshot::{MemoryDictionary, MemorySnapshot, Snapshot};
pub use store::Store;
pub use tree::{AppendSummary, Patch, PatchElement, PatchTree};
pub use version::{
	CombinedVersionsIterator, MergedVersionsIterator, PatchTreeVersionsIterator, TripleVersions,
	TripleVersionsIterator,
};

pub mod memory {
	pub use crate::backend::memory::MemoryStorage;
}
pub mod sqlite {
	pub use crate::backend::sqlite::{DbPath, JournalMode, SqliteConfig, SqliteStorage, SynchronousMode, TempStore};
}
