// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Paged views over the patch index: the facts present at one revision, and
//! the facts that appear or disappear between two revisions.

use std::fmt::{self, Display, Formatter};

use tessera_core::{Triple, TripleOrder};
use tessera_type::{PatchId, Result};
use tracing::{debug, instrument, trace};

use crate::{
	backend::IndexStorage,
	snapshot::Snapshot,
	tree::{self, AdditionIterator, PatchTree, TripleValueIterator},
};

/// A fact that changed between two revisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TripleDelta {
	pub triple: Triple,
	/// Present at the end revision but not at the start one when true.
	pub addition: bool,
}

impl Display for TripleDelta {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "{} {}", if self.addition { "+" } else { "-" }, self.triple)
	}
}

/// Facts matching a pattern present at one revision: the remaining snapshot
/// facts in snapshot order, then the facts added by patches in
/// subject-predicate-object order.
///
/// An offset into the snapshot part is resolved through the deletion
/// positions, so deleted snapshot facts in front of it are never visited.
pub struct VersionMaterializedIterator<'a, S: IndexStorage + 'a> {
	tree: &'a PatchTree<S>,
	pattern: Triple,
	patch_id: PatchId,
	snapshot: Option<Box<dyn Iterator<Item = Triple> + 'a>>,
	additions: Option<AdditionIterator<'a, S>>,
	skip_additions: u64,
	done: bool,
}

impl<'a, S: IndexStorage + 'a> VersionMaterializedIterator<'a, S> {
	/// Revisions past the latest one see the latest state.
	#[instrument(name = "store::materialized::version", level = "debug", skip_all, fields(pattern = %pattern, patch_id = patch_id, offset = offset))]
	pub fn new(tree: &'a PatchTree<S>, pattern: Triple, patch_id: PatchId, offset: u64) -> Result<Self> {
		let patch_id = patch_id.min(tree.max_patch_id().unwrap_or(0));
		let snapshot = tree.snapshot();
		let deleted = tree.deletion_count(&pattern, patch_id)?;
		let remaining = snapshot.count(&pattern).saturating_sub(deleted);

		let mut result = Self {
			tree,
			pattern,
			patch_id,
			snapshot: None,
			additions: None,
			skip_additions: 0,
			done: false,
		};
		if offset >= remaining {
			result.skip_additions = offset - remaining;
			return Ok(result);
		}

		// Find the snapshot index whose count of earlier deletions, added to
		// the offset, lands on the index itself.
		let mut skipped_deletions = 0u64;
		while let Some(candidate) = snapshot.search(&pattern).nth((offset + skipped_deletions) as usize) {
			let before = tree.deletions_before(&pattern, patch_id, &candidate)?;
			if before == skipped_deletions {
				break;
			}
			trace!(candidate = %candidate, before, "offset moved past deletions");
			skipped_deletions = before;
		}
		debug!(skipped_deletions, "snapshot offset resolved");
		result.snapshot = Some(Box::new(snapshot.search(&pattern).skip((offset + skipped_deletions) as usize)));
		Ok(result)
	}

	/// Drains the iterator, returning the number of remaining results.
	pub fn get_count(&mut self) -> Result<u64> {
		let mut count = 0;
		while self.try_next()?.is_some() {
			count += 1;
		}
		Ok(count)
	}

	fn try_next(&mut self) -> Result<Option<Triple>> {
		if let Some(snapshot) = self.snapshot.as_mut() {
			for triple in snapshot.by_ref() {
				if self.tree.contains(&triple, self.patch_id)? {
					return Ok(Some(triple));
				}
			}
			self.snapshot = None;
		}

		if self.done || self.tree.max_patch_id().is_none() {
			return Ok(None);
		}
		if self.additions.is_none() {
			self.additions = Some(self.tree.addition_iterator(&self.pattern, TripleOrder::Spo)?);
		}
		while let Some(item) = self.additions.as_mut().and_then(Iterator::next) {
			let (triple, addition) = item?;
			if !addition.is_patch_id(self.patch_id) || self.tree.snapshot().contains(&triple) {
				continue;
			}
			if self.skip_additions > 0 {
				self.skip_additions -= 1;
				continue;
			}
			return Ok(Some(triple));
		}
		self.done = true;
		Ok(None)
	}
}

impl<'a, S: IndexStorage + 'a> Iterator for VersionMaterializedIterator<'a, S> {
	type Item = Result<Triple>;

	fn next(&mut self) -> Option<Self::Item> {
		self.try_next().transpose()
	}
}

/// Facts matching a pattern whose presence differs between two revisions,
/// in subject-predicate-object order.
///
/// The start revision may lie after the end one, the deltas then undo the
/// changes in between.
pub struct DeltaMaterializedIterator<'a, S: IndexStorage + 'a> {
	values: Option<TripleValueIterator<'a, S>>,
	snapshot: &'a dyn Snapshot,
	start: PatchId,
	end: PatchId,
}

impl<'a, S: IndexStorage + 'a> DeltaMaterializedIterator<'a, S> {
	#[instrument(name = "store::materialized::delta", level = "debug", skip_all, fields(pattern = %pattern, start = start, end = end))]
	pub fn new(tree: &'a PatchTree<S>, pattern: Triple, start: PatchId, end: PatchId) -> Result<Self> {
		let latest = tree.max_patch_id();
		let values = match latest {
			Some(_) => Some(tree.value_iterator(&pattern)?),
			None => None,
		};
		let latest = latest.unwrap_or(0);
		Ok(Self {
			values,
			snapshot: tree.snapshot(),
			start: start.min(latest),
			end: end.min(latest),
		})
	}

	/// Skips up to `n` deltas, returning how many were skipped.
	pub fn offset(&mut self, n: u64) -> Result<u64> {
		let mut skipped = 0;
		while skipped < n && self.try_next()?.is_some() {
			skipped += 1;
		}
		Ok(skipped)
	}

	/// Drains the iterator, returning the number of remaining deltas.
	pub fn get_count(&mut self) -> Result<u64> {
		self.offset(u64::MAX)
	}

	fn try_next(&mut self) -> Result<Option<TripleDelta>> {
		if self.start == self.end {
			return Ok(None);
		}
		let Some(values) = self.values.as_mut() else {
			return Ok(None);
		};
		for item in values {
			let (triple, value) = item?;
			let in_snapshot = self.snapshot.contains(&triple);
			let before = tree::is_present(in_snapshot, &value, self.start);
			let after = tree::is_present(in_snapshot, &value, self.end);
			if before != after {
				return Ok(Some(TripleDelta {
					triple,
					addition: after,
				}));
			}
		}
		self.values = None;
		Ok(None)
	}
}

impl<'a, S: IndexStorage + 'a> Iterator for DeltaMaterializedIterator<'a, S> {
	type Item = Result<TripleDelta>;

	fn next(&mut self) -> Option<Self::Item> {
		self.try_next().transpose()
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use tessera_core::DictionaryManager;

	use super::*;
	use crate::{
		backend::memory::MemoryStorage,
		config::StoreConfig,
		snapshot::MemorySnapshot,
		tree::Patch,
	};

	fn tree() -> PatchTree<MemoryStorage> {
		let snapshot: Arc<dyn Snapshot> = Arc::new(MemorySnapshot::from_strings([
			("a", "p", "x"),
			("b", "p", "x"),
			("c", "p", "x"),
			("d", "p", "x"),
			("e", "p", "x"),
		]));
		let dictionaries = DictionaryManager::new(snapshot.dictionary());
		PatchTree::new(MemoryStorage::new(), dictionaries, snapshot, &StoreConfig::memory()).unwrap()
	}

	fn subjects(tree: &PatchTree<MemoryStorage>, triples: impl IntoIterator<Item = Result<Triple>>) -> Vec<String> {
		triples.into_iter().map(|triple| tree.dictionaries().resolve(triple.unwrap().subject)).collect()
	}

	#[test]
	fn test_version_offsets() {
		let mut tree = tree();
		let t = |s: &str| tree.dictionaries().encode_triple(s, "p", "x");
		let (a, b, c, f) = (t("a"), t("b"), t("c"), t("f"));
		tree.append(1, &Patch::new().delete(a).delete(b).delete(c).add(f)).unwrap();

		let any = Triple::any();
		let page = |offset| subjects(&tree, VersionMaterializedIterator::new(&tree, any, 1, offset).unwrap());
		assert_eq!(page(0), vec!["d", "e", "f"]);
		assert_eq!(page(1), vec!["e", "f"]);
		assert_eq!(page(2), vec!["f"]);
		assert!(page(3).is_empty());
		assert!(page(7).is_empty());

		// the snapshot is untouched at revision 0
		let snapshot = |offset| subjects(&tree, VersionMaterializedIterator::new(&tree, any, 0, offset).unwrap());
		assert_eq!(snapshot(3), vec!["d", "e"]);
	}

	#[test]
	fn test_version_offset_between_deletions() {
		let mut tree = tree();
		let t = |s: &str| tree.dictionaries().lookup_triple(s, "p", "x");
		let (b, d) = (t("b"), t("d"));
		tree.append(1, &Patch::new().delete(b).delete(d)).unwrap();

		let any = Triple::any();
		let page = |offset| subjects(&tree, VersionMaterializedIterator::new(&tree, any, 1, offset).unwrap());
		assert_eq!(page(0), vec!["a", "c", "e"]);
		assert_eq!(page(1), vec!["c", "e"]);
		assert_eq!(page(2), vec!["e"]);

		let mut all = VersionMaterializedIterator::new(&tree, any, 5, 0).unwrap();
		assert_eq!(all.get_count().unwrap(), 3);
	}

	#[test]
	fn test_deltas() {
		let mut tree = tree();
		let t = |s: &str| tree.dictionaries().encode_triple(s, "p", "x");
		let (a, b, f) = (t("a"), t("b"), t("f"));
		tree.append(1, &Patch::new().delete(a).add(f)).unwrap();
		tree.append(2, &Patch::new().delete(b)).unwrap();
		tree.append(3, &Patch::new().add(a)).unwrap();

		let deltas = |start, end| {
			DeltaMaterializedIterator::new(&tree, Triple::any(), start, end)
				.unwrap()
				.map(|delta| {
					let delta = delta.unwrap();
					let subject = tree.dictionaries().resolve(delta.triple.subject);
					format!("{}{}", if delta.addition { "+" } else { "-" }, subject)
				})
				.collect::<Vec<_>>()
		};
		assert_eq!(deltas(0, 2), vec!["-a", "-b", "+f"]);
		// a is back at 3
		assert_eq!(deltas(0, 3), vec!["-b", "+f"]);
		assert_eq!(deltas(3, 0), vec!["+b", "-f"]);
		assert_eq!(deltas(1, 9), vec!["+a", "-b"]);
		assert!(deltas(2, 2).is_empty());

		let mut iterator = DeltaMaterializedIterator::new(&tree, Triple::any(), 0, 2).unwrap();
		assert_eq!(iterator.offset(1).unwrap(), 1);
		assert_eq!(iterator.get_count().unwrap(), 2);
		assert_eq!(iterator.offset(1).unwrap(), 0);
	}

	#[test]
	fn test_without_revisions() {
		let tree = tree();
		let mut deltas = DeltaMaterializedIterator::new(&tree, Triple::any(), 0, 4).unwrap();
		assert!(deltas.next().is_none());
		let facts = subjects(&tree, VersionMaterializedIterator::new(&tree, Triple::any(), 4, 1).unwrap());
		assert_eq!(facts, vec!["b", "c", "d", "e"]);
	}
}
