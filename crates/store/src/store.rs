// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::sync::Arc;

use tessera_core::{DictionaryManager, Triple, TripleComparator, TripleOrder};
use tessera_type::{PatchId, Result};
use tracing::{debug, instrument};

use crate::{
	backend::Backend,
	config::StoreConfig,
	materialized::{DeltaMaterializedIterator, VersionMaterializedIterator},
	metadata::MetadataStore,
	snapshot::Snapshot,
	tree::{AppendSummary, Patch, PatchElement, PatchTree},
	version::PatchTreeVersionsIterator,
};

pub(crate) const ADDITIONS: &str = "additions";
pub(crate) const DELETIONS: &str = "deletions";

/// A versioned triple store: an immutable snapshot plus the patch index
/// recording every later revision.
pub struct Store {
	tree: PatchTree<Backend>,
	metadata: MetadataStore<Backend>,
	snapshot: Arc<dyn Snapshot>,
}

impl Store {
	/// Opens the store described by `config` on top of `snapshot`, restoring
	/// the revisions a previous session appended.
	#[instrument(name = "store::new", level = "debug", skip_all)]
	pub fn new(config: StoreConfig, snapshot: Arc<dyn Snapshot>) -> Result<Self> {
		config.validate()?;
		let backend = config.open_backend()?;
		let metadata = MetadataStore::new(backend.clone())?;
		let patch_dictionary = PatchTree::restore_dictionary(&backend)?;
		let dictionaries = DictionaryManager::with_patch(snapshot.dictionary(), Arc::new(patch_dictionary));
		let tree = PatchTree::new(backend, dictionaries, snapshot.clone(), &config)?;
		debug!(max_patch_id = ?tree.max_patch_id(), "store opened");
		Ok(Self {
			tree,
			metadata,
			snapshot,
		})
	}

	/// In-memory store with the default layout.
	pub fn in_memory(snapshot: Arc<dyn Snapshot>) -> Result<Self> {
		Self::new(StoreConfig::memory(), snapshot)
	}

	/// Appends revision `patch_id` and records its change counts.
	#[instrument(name = "store::append", level = "debug", skip(self, patch))]
	pub fn append(&mut self, patch_id: PatchId, patch: &Patch) -> Result<AppendSummary> {
		let summary = self.tree.append(patch_id, patch)?;
		self.metadata.store_u64(ADDITIONS, patch_id as u64, summary.additions)?;
		self.metadata.store_u64(DELETIONS, patch_id as u64, summary.deletions)?;
		Ok(summary)
	}

	/// Like [`append`](Self::append) with facts given as strings; the flag is
	/// true for additions. Strings new to both dictionaries are added to the
	/// patch dictionary.
	pub fn append_strings<I, T>(&mut self, patch_id: PatchId, changes: I) -> Result<AppendSummary>
	where
		I: IntoIterator<Item = (T, T, T, bool)>,
		T: AsRef<str>,
	{
		let dictionaries = self.tree.dictionaries();
		let mut patch = Patch::new();
		for (subject, predicate, object, addition) in changes {
			let (subject, predicate, object) = (subject.as_ref(), predicate.as_ref(), object.as_ref());
			if addition {
				patch.push(PatchElement::addition(dictionaries.encode_triple(subject, predicate, object)));
			} else {
				// unknown strings cannot name a stored fact
				let triple = dictionaries.lookup_triple(subject, predicate, object);
				if !triple.is_pattern() {
					patch.push(PatchElement::deletion(triple));
				}
			}
		}
		self.append(patch_id, &patch)
	}

	pub fn max_patch_id(&self) -> Option<PatchId> {
		self.tree.max_patch_id()
	}

	/// Versions of the facts matching `pattern`, patch facts in the order
	/// best suited to the pattern.
	pub fn versions(&self, pattern: &Triple) -> PatchTreeVersionsIterator<'_, Backend> {
		self.versions_ordered(pattern, TripleOrder::for_pattern(pattern))
	}

	pub fn versions_ordered(&self, pattern: &Triple, order: TripleOrder) -> PatchTreeVersionsIterator<'_, Backend> {
		PatchTreeVersionsIterator::new(self.snapshot.as_ref(), Some(&self.tree), *pattern, order, 0)
	}

	/// Facts matching `pattern` present at `patch_id`, sorted in the order of
	/// the pattern's index. Revisions past the latest one see the latest state.
	#[instrument(name = "store::materialize", level = "debug", skip_all, fields(pattern = %pattern, patch_id = patch_id))]
	pub fn materialize(&self, pattern: &Triple, patch_id: PatchId) -> Result<Vec<Triple>> {
		let patch_id = patch_id.min(self.max_patch_id().unwrap_or(0));
		let order = TripleOrder::for_pattern(pattern);

		let mut result = Vec::new();
		for triple in self.snapshot.search(pattern) {
			if self.tree.contains(&triple, patch_id)? {
				result.push(triple);
			}
		}
		if self.max_patch_id().is_some() {
			for item in self.tree.addition_iterator(pattern, order)? {
				let (triple, addition) = item?;
				if addition.is_patch_id(patch_id) && !self.snapshot.contains(&triple) {
					result.push(triple);
				}
			}
		}

		let comparator = self.comparator(order);
		result.sort_by(|a, b| comparator.compare(a, b));
		Ok(result)
	}

	/// Facts matching `pattern` present at `patch_id`, starting `offset`
	/// facts in: remaining snapshot facts first, then facts added by patches.
	pub fn materialize_page(
		&self,
		pattern: &Triple,
		patch_id: PatchId,
		offset: u64,
	) -> Result<VersionMaterializedIterator<'_, Backend>> {
		VersionMaterializedIterator::new(&self.tree, *pattern, patch_id, offset)
	}

	/// Number of facts matching `pattern` present at `patch_id`.
	pub fn materialized_count(&self, pattern: &Triple, patch_id: PatchId) -> Result<u64> {
		self.materialize_page(pattern, patch_id, 0)?.get_count()
	}

	/// Facts matching `pattern` added or removed going from `start` to `end`.
	pub fn materialize_delta(
		&self,
		pattern: &Triple,
		start: PatchId,
		end: PatchId,
	) -> Result<DeltaMaterializedIterator<'_, Backend>> {
		DeltaMaterializedIterator::new(&self.tree, *pattern, start, end)
	}

	pub fn contains(&self, triple: &Triple, patch_id: PatchId) -> Result<bool> {
		self.tree.contains(triple, patch_id)
	}

	/// Number of snapshot facts matching `pattern` deleted at `patch_id`.
	pub fn deletion_count(&self, pattern: &Triple, patch_id: PatchId) -> Result<u64> {
		self.tree.deletion_count(pattern, patch_id)
	}

	pub fn comparator(&self, order: TripleOrder) -> TripleComparator {
		self.tree.comparator(order)
	}

	pub fn tree(&self) -> &PatchTree<Backend> {
		&self.tree
	}

	pub fn metadata(&self) -> &MetadataStore<Backend> {
		&self.metadata
	}

	pub fn dictionary(&self) -> &DictionaryManager {
		self.tree.dictionaries()
	}

	pub fn snapshot(&self) -> &dyn Snapshot {
		self.snapshot.as_ref()
	}
}
