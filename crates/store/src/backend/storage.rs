// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Backend selected at runtime.

use std::{ops::Bound, sync::Arc};

use tessera_core::KeyComparator;
use tessera_type::Result;

use super::{
	IndexId, IndexStorage, RawEntry,
	memory::{MemoryRangeIter, MemoryStorage},
	sqlite::{SqliteConfig, SqliteRangeIter, SqliteStorage},
};

/// Dispatches to the memory or the SQLite storage.
#[derive(Clone)]
#[repr(u8)]
pub enum Backend {
	Memory(MemoryStorage) = 0,
	Sqlite(SqliteStorage) = 1,
}

impl Backend {
	pub fn memory() -> Self {
		Self::Memory(MemoryStorage::new())
	}

	pub fn sqlite(config: SqliteConfig) -> Result<Self> {
		Ok(Self::Sqlite(SqliteStorage::new(config)?))
	}

	pub fn sqlite_in_memory() -> Result<Self> {
		Ok(Self::Sqlite(SqliteStorage::in_memory()?))
	}
}

pub enum BackendRangeIter {
	Memory(MemoryRangeIter),
	Sqlite(SqliteRangeIter),
}

impl Iterator for BackendRangeIter {
	type Item = Result<RawEntry>;

	#[inline]
	fn next(&mut self) -> Option<Self::Item> {
		match self {
			Self::Memory(iter) => iter.next(),
			Self::Sqlite(iter) => iter.next(),
		}
	}
}

impl IndexStorage for Backend {
	type RangeIter<'a> = BackendRangeIter;

	#[inline]
	fn ensure_index(&self, index: IndexId, comparator: Arc<dyn KeyComparator>) -> Result<()> {
		match self {
			Self::Memory(s) => s.ensure_index(index, comparator),
			Self::Sqlite(s) => s.ensure_index(index, comparator),
		}
	}

	#[inline]
	fn get(&self, index: IndexId, key: &[u8]) -> Result<Option<Vec<u8>>> {
		match self {
			Self::Memory(s) => s.get(index, key),
			Self::Sqlite(s) => s.get(index, key),
		}
	}

	#[inline]
	fn set(&self, index: IndexId, entries: &[(&[u8], &[u8])]) -> Result<()> {
		match self {
			Self::Memory(s) => s.set(index, entries),
			Self::Sqlite(s) => s.set(index, entries),
		}
	}

	#[inline]
	fn range(&self, index: IndexId, start: Bound<&[u8]>, batch_size: usize) -> Result<Self::RangeIter<'_>> {
		match self {
			Self::Memory(s) => Ok(BackendRangeIter::Memory(s.range(index, start, batch_size)?)),
			Self::Sqlite(s) => Ok(BackendRangeIter::Sqlite(s.range(index, start, batch_size)?)),
		}
	}

	#[inline]
	fn clear_index(&self, index: IndexId) -> Result<()> {
		match self {
			Self::Memory(s) => s.clear_index(index),
			Self::Sqlite(s) => s.clear_index(index),
		}
	}
}

#[cfg(test)]
mod tests {
	use tessera_core::BytewiseComparator;

	use super::*;

	fn check(storage: Backend) {
		storage.ensure_index(IndexId::Metadata, Arc::new(BytewiseComparator)).unwrap();
		storage.set(IndexId::Metadata, &[(b"key".as_slice(), b"value".as_slice())]).unwrap();
		assert_eq!(storage.get(IndexId::Metadata, b"key").unwrap(), Some(b"value".to_vec()));
		assert_eq!(storage.range(IndexId::Metadata, Bound::Unbounded, 8).unwrap().count(), 1);
	}

	#[test]
	fn test_memory_backend() {
		check(Backend::memory());
	}

	#[test]
	fn test_sqlite_backend() {
		check(Backend::sqlite_in_memory().unwrap());
	}
}
