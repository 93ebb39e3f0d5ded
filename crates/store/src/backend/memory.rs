// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! In-memory storage on lock-free skip lists.

use std::{cmp::Ordering, collections::HashMap, ops::Bound, sync::Arc};

use crossbeam_skiplist::SkipMap;
use parking_lot::RwLock;
use tessera_core::KeyComparator;
use tessera_type::{Error, Result};
use tracing::instrument;

use super::{IndexId, IndexStorage, RawEntry};

/// A key ordered by the comparator of its index.
#[derive(Clone)]
struct OrderedKey {
	bytes: Vec<u8>,
	comparator: Arc<dyn KeyComparator>,
}

impl PartialEq for OrderedKey {
	fn eq(&self, other: &Self) -> bool {
		self.cmp(other) == Ordering::Equal
	}
}

impl Eq for OrderedKey {}

impl PartialOrd for OrderedKey {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for OrderedKey {
	fn cmp(&self, other: &Self) -> Ordering {
		self.comparator.compare_keys(&self.bytes, &other.bytes)
	}
}

struct MemoryIndex {
	comparator: Arc<dyn KeyComparator>,
	entries: SkipMap<OrderedKey, Vec<u8>>,
}

impl MemoryIndex {
	fn key(&self, bytes: &[u8]) -> OrderedKey {
		OrderedKey {
			bytes: bytes.to_vec(),
			comparator: self.comparator.clone(),
		}
	}
}

/// Non-persistent storage, one skip list per index.
#[derive(Clone, Default)]
pub struct MemoryStorage {
	indexes: Arc<RwLock<HashMap<IndexId, Arc<MemoryIndex>>>>,
}

impl MemoryStorage {
	pub fn new() -> Self {
		Self::default()
	}

	fn index(&self, index: IndexId) -> Option<Arc<MemoryIndex>> {
		self.indexes.read().get(&index).cloned()
	}

	/// Number of entries in `index`.
	pub fn len(&self, index: IndexId) -> usize {
		self.index(index).map(|i| i.entries.len()).unwrap_or(0)
	}
}

impl IndexStorage for MemoryStorage {
	type RangeIter<'a> = MemoryRangeIter;

	#[instrument(name = "store::memory::ensure_index", level = "debug", skip_all, fields(index = %index))]
	fn ensure_index(&self, index: IndexId, comparator: Arc<dyn KeyComparator>) -> Result<()> {
		let mut indexes = self.indexes.write();
		let existing = indexes.get(&index).cloned();
		let entries = SkipMap::new();
		if let Some(existing) = existing {
			for entry in existing.entries.iter() {
				entries.insert(
					OrderedKey {
						bytes: entry.key().bytes.clone(),
						comparator: comparator.clone(),
					},
					entry.value().clone(),
				);
			}
		}
		indexes.insert(
			index,
			Arc::new(MemoryIndex {
				comparator,
				entries,
			}),
		);
		Ok(())
	}

	#[instrument(name = "store::memory::get", level = "trace", skip_all, fields(index = %index, key_len = key.len()))]
	fn get(&self, index: IndexId, key: &[u8]) -> Result<Option<Vec<u8>>> {
		let Some(index) = self.index(index) else {
			return Ok(None);
		};
		Ok(index.entries.get(&index.key(key)).map(|entry| entry.value().clone()))
	}

	#[instrument(name = "store::memory::set", level = "debug", skip_all, fields(index = %index, entry_count = entries.len()))]
	fn set(&self, index: IndexId, entries: &[(&[u8], &[u8])]) -> Result<()> {
		let Some(target) = self.index(index) else {
			let key = entries.first().map(|(key, _)| *key).unwrap_or_default();
			return Err(Error::storage("set", index, key, "index not initialized"));
		};
		for (key, value) in entries {
			target.entries.insert(target.key(key), value.to_vec());
		}
		Ok(())
	}

	#[instrument(name = "store::memory::range", level = "trace", skip_all, fields(index = %index, batch_size = batch_size))]
	fn range(&self, index: IndexId, start: Bound<&[u8]>, batch_size: usize) -> Result<Self::RangeIter<'_>> {
		let Some(index) = self.index(index) else {
			return Ok(MemoryRangeIter {
				index: None,
				batch_size,
				buffer: Vec::new(),
				pos: 0,
				exhausted: true,
			});
		};

		let start = match start {
			Bound::Included(key) => Bound::Included(index.key(key)),
			Bound::Excluded(key) => Bound::Excluded(index.key(key)),
			Bound::Unbounded => Bound::Unbounded,
		};
		let mut iter = MemoryRangeIter {
			index: Some(index),
			batch_size: batch_size.max(1),
			buffer: Vec::new(),
			pos: 0,
			exhausted: false,
		};
		iter.load_batch(start);
		Ok(iter)
	}

	#[instrument(name = "store::memory::clear_index", level = "debug", skip_all, fields(index = %index))]
	fn clear_index(&self, index: IndexId) -> Result<()> {
		if let Some(index) = self.index(index) {
			index.entries.clear();
		}
		Ok(())
	}
}

/// Batch-paged cursor over a skip list.
pub struct MemoryRangeIter {
	index: Option<Arc<MemoryIndex>>,
	batch_size: usize,
	buffer: Vec<RawEntry>,
	pos: usize,
	exhausted: bool,
}

impl MemoryRangeIter {
	fn load_batch(&mut self, start: Bound<OrderedKey>) {
		let Some(index) = &self.index else {
			self.exhausted = true;
			return;
		};
		self.buffer = index
			.entries
			.range((start, Bound::Unbounded))
			.take(self.batch_size)
			.map(|entry| RawEntry {
				key: entry.key().bytes.clone(),
				value: entry.value().clone(),
			})
			.collect();
		self.pos = 0;
		self.exhausted = self.buffer.is_empty();
	}

	fn refill(&mut self) {
		let (Some(index), Some(last)) = (&self.index, self.buffer.last()) else {
			self.exhausted = true;
			return;
		};
		let start = Bound::Excluded(index.key(&last.key));
		self.load_batch(start);
	}
}

impl Iterator for MemoryRangeIter {
	type Item = Result<RawEntry>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.pos >= self.buffer.len() && !self.exhausted {
			self.refill();
		}

		if self.pos < self.buffer.len() {
			let entry = self.buffer[self.pos].clone();
			self.pos += 1;
			Some(Ok(entry))
		} else {
			None
		}
	}
}

#[cfg(test)]
mod tests {
	use tessera_core::BytewiseComparator;

	use super::*;

	fn storage() -> MemoryStorage {
		let storage = MemoryStorage::new();
		storage.ensure_index(IndexId::Metadata, Arc::new(BytewiseComparator)).unwrap();
		storage
	}

	struct Reversed;

	impl KeyComparator for Reversed {
		fn compare_keys(&self, a: &[u8], b: &[u8]) -> Ordering {
			b.cmp(a)
		}
	}

	#[test]
	fn test_basic_operations() {
		let storage = storage();
		storage.set(IndexId::Metadata, &[(b"key1".as_slice(), b"value1".as_slice())]).unwrap();
		assert_eq!(storage.get(IndexId::Metadata, b"key1").unwrap(), Some(b"value1".to_vec()));
		assert!(storage.contains(IndexId::Metadata, b"key1").unwrap());
		assert!(!storage.contains(IndexId::Metadata, b"nonexistent").unwrap());

		storage.set(IndexId::Metadata, &[(b"key1".as_slice(), b"value2".as_slice())]).unwrap();
		assert_eq!(storage.get(IndexId::Metadata, b"key1").unwrap(), Some(b"value2".to_vec()));
		assert_eq!(storage.len(IndexId::Metadata), 1);
	}

	#[test]
	fn test_uninitialized_index() {
		let storage = storage();
		let spo = IndexId::Triples(tessera_core::TripleOrder::Spo);
		assert_eq!(storage.get(spo, b"k").unwrap(), None);
		assert_eq!(storage.range(spo, Bound::Unbounded, 10).unwrap().count(), 0);
		let err = storage.set(spo, &[(b"k".as_slice(), b"v".as_slice())]).unwrap_err();
		assert!(err.to_string().contains("triples_spo"));
	}

	#[test]
	fn test_range_lazy_pagination() {
		let storage = storage();
		for i in 0..10u8 {
			storage.set(IndexId::Metadata, &[(&[i][..], &[i * 10][..])]).unwrap();
		}

		let entries = storage
			.range(IndexId::Metadata, Bound::Unbounded, 3)
			.unwrap()
			.collect::<Result<Vec<_>>>()
			.unwrap();
		assert_eq!(entries.len(), 10);
		for (i, entry) in entries.iter().enumerate() {
			assert_eq!(entry.key, vec![i as u8]);
			assert_eq!(entry.value, vec![(i * 10) as u8]);
		}

		let tail = storage
			.range(IndexId::Metadata, Bound::Excluded(&[6u8][..]), 2)
			.unwrap()
			.map(|e| e.unwrap().key[0])
			.collect::<Vec<_>>();
		assert_eq!(tail, vec![7, 8, 9]);
	}

	#[test]
	fn test_comparator_order() {
		let storage = MemoryStorage::new();
		storage.ensure_index(IndexId::Metadata, Arc::new(Reversed)).unwrap();
		for key in [b"a", b"c", b"b"] {
			storage.set(IndexId::Metadata, &[(key.as_slice(), b"".as_slice())]).unwrap();
		}
		let keys = storage
			.range(IndexId::Metadata, Bound::Unbounded, 100)
			.unwrap()
			.map(|e| e.unwrap().key)
			.collect::<Vec<_>>();
		assert_eq!(keys, vec![b"c".to_vec(), b"b".to_vec(), b"a".to_vec()]);

		// reinstalling an ordering keeps entries
		storage.ensure_index(IndexId::Metadata, Arc::new(BytewiseComparator)).unwrap();
		let first = storage.range(IndexId::Metadata, Bound::Unbounded, 1).unwrap().next().unwrap().unwrap();
		assert_eq!(first.key, b"a".to_vec());
	}

	#[test]
	fn test_clear_index() {
		let storage = storage();
		storage.set(IndexId::Metadata, &[(b"a".as_slice(), b"1".as_slice())]).unwrap();
		storage.clear_index(IndexId::Metadata).unwrap();
		assert_eq!(storage.get(IndexId::Metadata, b"a").unwrap(), None);
	}
}
