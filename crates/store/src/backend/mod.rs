// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Ordered key-value storage underneath the patch indexes.
//!
//! A backend only moves raw bytes. The order of every index is supplied by
//! the [`KeyComparator`] installed through [`IndexStorage::ensure_index`].

use std::{
	fmt::{self, Display, Formatter},
	ops::Bound,
	sync::Arc,
};

use tessera_core::{KeyComparator, TripleOrder};
use tessera_type::Result;

pub mod memory;
pub mod sqlite;
mod storage;

pub use storage::{Backend, BackendRangeIter};

/// Identifies one physical index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexId {
	/// Fact histories in one component order
	Triples(TripleOrder),
	/// Small scalar statistics and tree state, raw byte order
	Metadata,
}

impl IndexId {
	pub fn name(self) -> &'static str {
		match self {
			IndexId::Triples(TripleOrder::Spo) => "triples_spo",
			IndexId::Triples(TripleOrder::Sop) => "triples_sop",
			IndexId::Triples(TripleOrder::Pso) => "triples_pso",
			IndexId::Triples(TripleOrder::Pos) => "triples_pos",
			IndexId::Triples(TripleOrder::Osp) => "triples_osp",
			IndexId::Triples(TripleOrder::Ops) => "triples_ops",
			IndexId::Metadata => "metadata",
		}
	}
}

impl Display for IndexId {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// A stored entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
	pub key: Vec<u8>,
	pub value: Vec<u8>,
}

/// The storage interface the patch tree is written against.
///
/// Implementations are cheap to clone and share their state.
pub trait IndexStorage: Send + Sync + Clone + 'static {
	/// Ascending cursor over an index.
	type RangeIter<'a>: Iterator<Item = Result<RawEntry>>
	where
		Self: 'a;

	/// Creates the index if needed and installs its ordering.
	///
	/// An existing index keeps its entries; the comparator must order them
	/// the way the previous one did.
	fn ensure_index(&self, index: IndexId, comparator: Arc<dyn KeyComparator>) -> Result<()>;

	fn get(&self, index: IndexId, key: &[u8]) -> Result<Option<Vec<u8>>>;

	fn contains(&self, index: IndexId, key: &[u8]) -> Result<bool> {
		Ok(self.get(index, key)?.is_some())
	}

	/// Writes a batch atomically, replacing existing values.
	fn set(&self, index: IndexId, entries: &[(&[u8], &[u8])]) -> Result<()>;

	/// Entries from `start` on, fetched `batch_size` at a time.
	fn range(&self, index: IndexId, start: Bound<&[u8]>, batch_size: usize) -> Result<Self::RangeIter<'_>>;

	/// Removes every entry of the index.
	fn clear_index(&self, index: IndexId) -> Result<()>;
}
