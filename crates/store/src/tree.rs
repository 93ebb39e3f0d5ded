// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! The patch index: per fact addition and deletion history, kept in six
//! component orders.

use std::{
	cmp::Ordering,
	collections::HashMap,
	fmt::{self, Display, Formatter},
	ops::Bound,
	sync::Arc,
};

use tessera_core::{
	AdditionValue, DeletionElement, DeletionValue, DictionaryManager, Encoding, PatchDictionary, PatchPositions,
	Projection, Triple, TripleComparator, TripleOrder, TripleValue, ValueContext, ValueLayout,
};
use tessera_type::{Error, PatchId, Result, TermId};
use tracing::{debug, instrument, trace};

use crate::{
	backend::{IndexId, IndexStorage, RawEntry},
	config::StoreConfig,
	snapshot::Snapshot,
};

const MAX_PATCH_ID_KEY: &[u8] = b"tree:max_patch_id";
const DICTIONARY_KEY: &[u8] = b"tree:dictionary";

/// One change of a patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchElement {
	pub triple: Triple,
	/// Insertion when true, removal otherwise.
	pub addition: bool,
}

impl PatchElement {
	pub fn addition(triple: Triple) -> Self {
		Self {
			triple,
			addition: true,
		}
	}

	pub fn deletion(triple: Triple) -> Self {
		Self {
			triple,
			addition: false,
		}
	}
}

impl Display for PatchElement {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "{} {}", if self.addition { "+" } else { "-" }, self.triple)
	}
}

/// The changes of one revision relative to the previous revision.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Patch {
	elements: Vec<PatchElement>,
}

impl Patch {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add(mut self, triple: Triple) -> Self {
		self.elements.push(PatchElement::addition(triple));
		self
	}

	pub fn delete(mut self, triple: Triple) -> Self {
		self.elements.push(PatchElement::deletion(triple));
		self
	}

	pub fn push(&mut self, element: PatchElement) {
		self.elements.push(element);
	}

	pub fn elements(&self) -> &[PatchElement] {
		&self.elements
	}

	pub fn len(&self) -> usize {
		self.elements.len()
	}

	pub fn is_empty(&self) -> bool {
		self.elements.is_empty()
	}
}

impl FromIterator<PatchElement> for Patch {
	fn from_iter<T: IntoIterator<Item = PatchElement>>(iter: T) -> Self {
		Self {
			elements: iter.into_iter().collect(),
		}
	}
}

/// What an append changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppendSummary {
	pub additions: u64,
	pub deletions: u64,
}

struct FactState {
	triple: Triple,
	value: TripleValue,
	in_snapshot: bool,
	dirty: bool,
}

/// Records, for every fact ever touched by a patch, the revisions it was
/// added and deleted at.
///
/// Snapshot facts are tracked through their deletion value, facts introduced
/// by patches through their addition value. Re-adding a deleted snapshot fact
/// marks the addition as a local change.
pub struct PatchTree<S: IndexStorage> {
	storage: S,
	dictionaries: DictionaryManager,
	snapshot: Arc<dyn Snapshot>,
	layout: ValueLayout,
	encoding: Encoding,
	batch_size: usize,
	max_patch_id: Option<PatchId>,
	persisted_dictionary_len: Option<usize>,
}

impl<S: IndexStorage> PatchTree<S> {
	#[instrument(name = "store::tree::new", level = "debug", skip_all, fields(layout = ?config.layout, encoding = ?config.encoding))]
	pub fn new(
		storage: S,
		dictionaries: DictionaryManager,
		snapshot: Arc<dyn Snapshot>,
		config: &StoreConfig,
	) -> Result<Self> {
		config.validate()?;
		let pair = dictionaries.pair().clone();
		for order in TripleOrder::ALL {
			let comparator = TripleComparator::with_dictionaries(order, pair.clone(), pair.clone());
			storage.ensure_index(IndexId::Triples(order), Arc::new(comparator))?;
		}
		storage.ensure_index(IndexId::Metadata, Arc::new(tessera_core::BytewiseComparator))?;

		let max_patch_id = match storage.get(IndexId::Metadata, MAX_PATCH_ID_KEY)? {
			Some(bytes) => {
				let bytes = <[u8; 4]>::try_from(bytes.as_slice())
					.map_err(|_| Error::decode("patch tree", "invalid latest revision record"))?;
				Some(PatchId::from_le_bytes(bytes))
			}
			None => None,
		};
		debug!(?max_patch_id, "patch tree opened");

		Ok(Self {
			storage,
			dictionaries,
			snapshot,
			layout: config.layout,
			encoding: config.encoding,
			batch_size: config.batch_size,
			max_patch_id,
			persisted_dictionary_len: None,
		})
	}

	/// Patch dictionary persisted by an earlier session, empty for a new
	/// store. The metadata index must exist.
	pub fn restore_dictionary(storage: &S) -> Result<PatchDictionary> {
		match storage.get(IndexId::Metadata, DICTIONARY_KEY)? {
			Some(bytes) => PatchDictionary::deserialize(&bytes),
			None => Ok(PatchDictionary::new()),
		}
	}

	/// Latest appended revision, None before the first append.
	pub fn max_patch_id(&self) -> Option<PatchId> {
		self.max_patch_id
	}

	pub fn dictionaries(&self) -> &DictionaryManager {
		&self.dictionaries
	}

	pub fn snapshot(&self) -> &dyn Snapshot {
		self.snapshot.as_ref()
	}

	pub fn storage(&self) -> &S {
		&self.storage
	}

	pub fn comparator(&self, order: TripleOrder) -> TripleComparator {
		let pair = self.dictionaries.pair().clone();
		TripleComparator::with_dictionaries(order, pair.clone(), pair)
	}

	fn context(&self, max_patch_id: PatchId) -> ValueContext {
		ValueContext::new(self.layout, self.encoding, max_patch_id)
	}

	fn current_context(&self) -> ValueContext {
		self.context(self.max_patch_id.unwrap_or(0))
	}

	pub fn get_triple_value(&self, triple: &Triple) -> Result<Option<TripleValue>> {
		let key = triple.encode_key();
		match self.storage.get(IndexId::Triples(TripleOrder::Spo), &key)? {
			Some(bytes) => Ok(Some(TripleValue::deserialize(&bytes, self.current_context())?)),
			None => Ok(None),
		}
	}

	pub fn get_addition_value(&self, triple: &Triple) -> Result<Option<AdditionValue>> {
		Ok(self.get_triple_value(triple)?.and_then(|value| value.addition))
	}

	pub fn get_deletion_value(&self, triple: &Triple) -> Result<Option<DeletionValue>> {
		Ok(self.get_triple_value(triple)?.and_then(|value| value.deletion))
	}

	/// Whether `triple` is part of the state at `patch_id`. Revisions past
	/// the latest one see the latest state.
	pub fn contains(&self, triple: &Triple, patch_id: PatchId) -> Result<bool> {
		let in_snapshot = self.snapshot.contains(triple);
		let Some(max_patch_id) = self.max_patch_id else {
			return Ok(in_snapshot);
		};
		let value = self.get_triple_value(triple)?.unwrap_or_default();
		Ok(is_present(in_snapshot, &value, patch_id.min(max_patch_id)))
	}

	/// Facts with an addition value matching `pattern`, in `order`.
	pub fn addition_iterator(&self, pattern: &Triple, order: TripleOrder) -> Result<AdditionIterator<'_, S>> {
		Ok(AdditionIterator {
			cursor: self.cursor(pattern, order)?,
			order,
			context: self.current_context(),
		})
	}

	/// Facts with a deletion value matching `pattern`, in subject-predicate-object order.
	pub fn deletion_iterator(&self, pattern: &Triple) -> Result<DeletionIterator<'_, S>> {
		Ok(DeletionIterator {
			cursor: self.cursor(pattern, TripleOrder::Spo)?,
			context: self.current_context(),
		})
	}

	/// Facts with history matching `pattern`, with their full values, in
	/// subject-predicate-object order.
	pub fn value_iterator(&self, pattern: &Triple) -> Result<TripleValueIterator<'_, S>> {
		Ok(TripleValueIterator {
			cursor: self.cursor(pattern, TripleOrder::Spo)?,
			context: self.current_context(),
		})
	}

	fn cursor(&self, pattern: &Triple, order: TripleOrder) -> Result<PatternCursor<'_, S>> {
		self.cursor_from(pattern, order, pattern)
	}

	/// Cursor over `pattern` positioned at the first entry not before `from`.
	fn cursor_from(&self, pattern: &Triple, order: TripleOrder, from: &Triple) -> Result<PatternCursor<'_, S>> {
		let start = from.encode_key();
		let upper = Triple::new(
			bound_or_last(pattern.subject),
			bound_or_last(pattern.predicate),
			bound_or_last(pattern.object),
		);
		Ok(PatternCursor {
			entries: self.storage.range(IndexId::Triples(order), Bound::Included(start.as_slice()), self.batch_size)?,
			pattern: *pattern,
			upper,
			comparator: self.comparator(order),
			done: false,
		})
	}

	/// Number of snapshot facts matching `pattern` deleted at `patch_id`,
	/// derived from the stored positions. Patch facts removed again are not
	/// counted, they never were part of the snapshot.
	pub fn deletion_count(&self, pattern: &Triple, patch_id: PatchId) -> Result<u64> {
		let Some(max_patch_id) = self.max_patch_id else {
			return Ok(0);
		};
		let patch_id = patch_id.min(max_patch_id);

		let mut count = 0u64;
		for item in self.deletion_iterator(pattern)? {
			let (_, deletion) = item?;
			if !deletion.is_patch_id(patch_id) {
				continue;
			}
			if let Some(element) = deletion.get(patch_id).filter(|element| !element.local_change) {
				let position = element.positions.get_by_pattern(pattern);
				count = count.max(position.max(0) as u64 + 1);
			}
		}
		Ok(count)
	}

	/// Number of snapshot facts matching `pattern` that are deleted at
	/// `patch_id` and sort before `triple`.
	///
	/// Reads the positions of the first such deletion at or after `triple`
	/// instead of walking the earlier ones.
	pub fn deletions_before(&self, pattern: &Triple, patch_id: PatchId, triple: &Triple) -> Result<u64> {
		let Some(max_patch_id) = self.max_patch_id else {
			return Ok(0);
		};
		let patch_id = patch_id.min(max_patch_id);

		let deletions = DeletionIterator {
			cursor: self.cursor_from(pattern, TripleOrder::Spo, triple)?,
			context: self.current_context(),
		};
		for item in deletions {
			let (_, deletion) = item?;
			if !deletion.is_patch_id(patch_id) {
				continue;
			}
			if let Some(element) = deletion.get(patch_id).filter(|element| !element.local_change) {
				return Ok(element.positions.get_by_pattern(pattern).max(0) as u64);
			}
		}
		self.deletion_count(pattern, patch_id)
	}

	/// Applies the changes of revision `patch_id`.
	///
	/// Adding a present fact or deleting an absent one is a no-op, so is any
	/// change with unbound components. When a patch names a fact more than
	/// once the last element wins.
	#[instrument(name = "store::tree::append", level = "debug", skip(self, patch), fields(elements = patch.len()))]
	pub fn append(&mut self, patch_id: PatchId, patch: &Patch) -> Result<AppendSummary> {
		let previous = self.max_patch_id;
		let latest = previous.unwrap_or(0);
		if patch_id <= latest {
			return Err(Error::PatchOrder {
				patch_id,
				max_patch_id: latest,
			});
		}

		let changes: HashMap<Triple, bool> = patch
			.elements()
			.iter()
			.filter(|element| {
				let bound = !element.triple.is_pattern();
				if !bound {
					debug!(triple = %element.triple, "unbound change ignored");
				}
				bound
			})
			.map(|element| (element.triple, element.addition))
			.collect();
		let mut facts = self.load_changed(patch_id, &changes)?;

		let mut summary = AppendSummary::default();
		let mut deleted_set_changed = false;
		for fact in facts.iter_mut() {
			let present = match previous {
				Some(previous) => is_present(fact.in_snapshot, &fact.value, previous),
				None => fact.in_snapshot,
			};
			match changes.get(&fact.triple) {
				Some(true) if !present => {
					deleted_set_changed |= fact.in_snapshot;
					self.apply_addition(fact, patch_id);
					summary.additions += 1;
				}
				Some(false) if present => {
					deleted_set_changed |= fact.in_snapshot;
					self.apply_deletion(fact, patch_id);
					summary.deletions += 1;
				}
				_ => {
					trace!(triple = %fact.triple, "redundant change ignored");
					if let Some(previous) = previous {
						carry_forward(fact, previous, patch_id);
					}
				}
			}
		}

		// Compressed values reach `patch_id` through their open intervals and
		// keep their positions while the deleted snapshot facts stay the same,
		// so the other facts are only visited for flat values or a changed
		// deleted set.
		if self.layout == ValueLayout::Flat || deleted_set_changed {
			if let Some(previous) = previous {
				let mut untouched = self.load_untouched(patch_id, &changes)?;
				for fact in untouched.iter_mut() {
					carry_forward(fact, previous, patch_id);
				}
				facts.append(&mut untouched);
			}
			let comparator = self.comparator(TripleOrder::Spo);
			facts.sort_by(|a, b| comparator.compare(&a.triple, &b.triple));
			update_positions(&mut facts, patch_id);
		} else {
			trace!(patch_id, "untouched facts skipped");
		}
		self.write_facts(&facts)?;

		self.storage.set(IndexId::Metadata, &[(MAX_PATCH_ID_KEY, patch_id.to_le_bytes().as_slice())])?;
		let dictionary_len = self.dictionaries.patch().len();
		if self.persisted_dictionary_len != Some(dictionary_len) {
			let dictionary = self.dictionaries.patch().serialize();
			self.storage.set(IndexId::Metadata, &[(DICTIONARY_KEY, dictionary.as_slice())])?;
			self.persisted_dictionary_len = Some(dictionary_len);
		}
		self.max_patch_id = Some(patch_id);

		debug!(patch_id, additions = summary.additions, deletions = summary.deletions, "patch appended");
		Ok(summary)
	}

	/// The facts named by `changes`, looked up one by one.
	fn load_changed(&self, patch_id: PatchId, changes: &HashMap<Triple, bool>) -> Result<Vec<FactState>> {
		let context = self.context(patch_id);
		let mut facts = Vec::with_capacity(changes.len());
		for triple in changes.keys() {
			let value = match self.storage.get(IndexId::Triples(TripleOrder::Spo), &triple.encode_key())? {
				Some(bytes) => TripleValue::deserialize(&bytes, context)?,
				None => TripleValue::default(),
			};
			facts.push(FactState {
				triple: *triple,
				value,
				in_snapshot: self.snapshot.contains(triple),
				dirty: false,
			});
		}
		Ok(facts)
	}

	/// Every fact with history that `changes` does not name.
	fn load_untouched(&self, patch_id: PatchId, changes: &HashMap<Triple, bool>) -> Result<Vec<FactState>> {
		let context = self.context(patch_id);
		let mut facts = Vec::new();
		for entry in self.storage.range(IndexId::Triples(TripleOrder::Spo), Bound::Unbounded, self.batch_size)? {
			let RawEntry {
				key,
				value,
			} = entry?;
			let triple = Triple::decode_key(&key)?;
			if changes.contains_key(&triple) {
				continue;
			}
			facts.push(FactState {
				triple,
				value: TripleValue::deserialize(&value, context)?,
				in_snapshot: self.snapshot.contains(&triple),
				dirty: false,
			});
		}
		Ok(facts)
	}

	fn apply_addition(&self, fact: &mut FactState, patch_id: PatchId) {
		if let Some(deletion) = &mut fact.value.deletion {
			deletion.del(patch_id);
		}
		let addition = fact.value.addition.get_or_insert_with(|| AdditionValue::new(self.layout, patch_id));
		addition.add(patch_id);
		if fact.in_snapshot {
			addition.set_local_change(patch_id);
		}
		fact.dirty = true;
	}

	fn apply_deletion(&self, fact: &mut FactState, patch_id: PatchId) {
		if let Some(addition) = &mut fact.value.addition {
			addition.del(patch_id);
		}
		let deletion = fact.value.deletion.get_or_insert_with(|| DeletionValue::new(self.layout, patch_id));
		deletion.add(DeletionElement::new(patch_id).local(!fact.in_snapshot));
		fact.dirty = true;
	}

	fn write_facts(&self, facts: &[FactState]) -> Result<()> {
		let dirty: Vec<&FactState> = facts.iter().filter(|fact| fact.dirty).collect();
		if dirty.is_empty() {
			return Ok(());
		}

		let spo: Vec<([u8; tessera_core::KEY_SIZE], Vec<u8>)> =
			dirty.iter().map(|fact| (fact.triple.encode_key(), fact.value.serialize(self.encoding))).collect();
		self.write_index(IndexId::Triples(TripleOrder::Spo), &spo)?;

		let additions: Vec<([u8; tessera_core::KEY_SIZE], Vec<u8>)> = dirty
			.iter()
			.filter_map(|fact| {
				let addition = fact.value.addition.as_ref()?;
				Some((fact.triple.encode_key(), addition.serialize(self.encoding)))
			})
			.collect();
		for order in TripleOrder::ALL.into_iter().filter(|order| *order != TripleOrder::Spo) {
			self.write_index(IndexId::Triples(order), &additions)?;
		}
		trace!(facts = dirty.len(), "values written");
		Ok(())
	}

	fn write_index(&self, index: IndexId, entries: &[([u8; tessera_core::KEY_SIZE], Vec<u8>)]) -> Result<()> {
		if entries.is_empty() {
			return Ok(());
		}
		let entries: Vec<(&[u8], &[u8])> =
			entries.iter().map(|(key, value)| (key.as_slice(), value.as_slice())).collect();
		self.storage.set(index, &entries)
	}
}

fn bound_or_last(term: TermId) -> TermId {
	if term.is_bound() { term } else { TermId::Last }
}

/// Presence of a fact at `patch_id`, judged against its snapshot membership.
pub(crate) fn is_present(in_snapshot: bool, value: &TripleValue, patch_id: PatchId) -> bool {
	if in_snapshot {
		!value.deletion.as_ref().is_some_and(|deletion| deletion.is_patch_id(patch_id))
	} else {
		value.addition.as_ref().is_some_and(|addition| addition.is_patch_id(patch_id))
	}
}

/// Extends the state a fact had at `previous` to `patch_id`. A no-op for
/// compressed values, where open intervals already cover `patch_id`.
fn carry_forward(fact: &mut FactState, previous: PatchId, patch_id: PatchId) {
	if let Some(addition) = &mut fact.value.addition {
		if addition.is_patch_id(previous) {
			fact.dirty |= addition.add(patch_id);
		}
	}
	if let Some(deletion) = &mut fact.value.deletion {
		if deletion.is_patch_id(previous) {
			if let Some(element) = deletion.get(previous) {
				let carried = DeletionElement::with_positions(patch_id, element.positions).local(element.local_change);
				fact.dirty |= deletion.add(carried);
			}
		}
	}
}

/// Recomputes the positions of every snapshot fact deleted at `patch_id`: its
/// rank, per projection, among the deleted snapshot facts sharing the
/// projected components. `facts` must be in subject-predicate-object order.
fn update_positions(facts: &mut [FactState], patch_id: PatchId) {
	let mut counters: HashMap<(Projection, Triple), i64> = HashMap::new();
	for fact in facts.iter_mut() {
		let Some(deletion) = &mut fact.value.deletion else {
			continue;
		};
		if !deletion.is_patch_id(patch_id) {
			continue;
		}
		let Some(current) = deletion.get(patch_id).filter(|current| !current.local_change) else {
			continue;
		};

		let mut positions = PatchPositions::default();
		for projection in Projection::ALL {
			let counter = counters.entry((projection, projection.project(&fact.triple))).or_insert(0);
			positions.set(projection, *counter);
			*counter += 1;
		}

		if positions != current.positions {
			trace!(triple = %fact.triple, %positions, "positions updated");
			fact.dirty |= deletion.add(DeletionElement::with_positions(patch_id, positions).local(current.local_change));
		}
	}
}

/// Cursor over the entries of one index within the bounds of a pattern.
struct PatternCursor<'a, S: IndexStorage + 'a> {
	entries: S::RangeIter<'a>,
	pattern: Triple,
	upper: Triple,
	comparator: TripleComparator,
	done: bool,
}

impl<'a, S: IndexStorage + 'a> Iterator for PatternCursor<'a, S> {
	type Item = Result<(Triple, Vec<u8>)>;

	fn next(&mut self) -> Option<Self::Item> {
		while !self.done {
			let entry = match self.entries.next()? {
				Ok(entry) => entry,
				Err(err) => {
					self.done = true;
					return Some(Err(err));
				}
			};
			let triple = match Triple::decode_key(&entry.key) {
				Ok(triple) => triple,
				Err(err) => {
					self.done = true;
					return Some(Err(err));
				}
			};
			if self.comparator.compare(&triple, &self.upper) == Ordering::Greater {
				self.done = true;
				break;
			}
			if triple.matches(&self.pattern) {
				return Some(Ok((triple, entry.value)));
			}
		}
		None
	}
}

/// Facts of a pattern with their addition values.
pub struct AdditionIterator<'a, S: IndexStorage + 'a> {
	cursor: PatternCursor<'a, S>,
	order: TripleOrder,
	context: ValueContext,
}

impl<'a, S: IndexStorage + 'a> Iterator for AdditionIterator<'a, S> {
	type Item = Result<(Triple, AdditionValue)>;

	fn next(&mut self) -> Option<Self::Item> {
		loop {
			let (triple, bytes) = match self.cursor.next()? {
				Ok(entry) => entry,
				Err(err) => return Some(Err(err)),
			};
			let addition = if self.order == TripleOrder::Spo {
				TripleValue::deserialize(&bytes, self.context).map(|value| value.addition)
			} else {
				AdditionValue::deserialize(&bytes, self.context).map(Some)
			};
			match addition {
				Ok(Some(addition)) => return Some(Ok((triple, addition))),
				Ok(None) => continue,
				Err(err) => return Some(Err(err)),
			}
		}
	}
}

/// Facts of a pattern with their deletion values.
pub struct DeletionIterator<'a, S: IndexStorage + 'a> {
	cursor: PatternCursor<'a, S>,
	context: ValueContext,
}

impl<'a, S: IndexStorage + 'a> Iterator for DeletionIterator<'a, S> {
	type Item = Result<(Triple, DeletionValue)>;

	fn next(&mut self) -> Option<Self::Item> {
		loop {
			let (triple, bytes) = match self.cursor.next()? {
				Ok(entry) => entry,
				Err(err) => return Some(Err(err)),
			};
			match TripleValue::deserialize(&bytes, self.context) {
				Ok(TripleValue {
					deletion: Some(deletion),
					..
				}) => return Some(Ok((triple, deletion))),
				Ok(_) => continue,
				Err(err) => return Some(Err(err)),
			}
		}
	}
}

/// Facts of a pattern with both their values.
pub struct TripleValueIterator<'a, S: IndexStorage + 'a> {
	cursor: PatternCursor<'a, S>,
	context: ValueContext,
}

impl<'a, S: IndexStorage + 'a> Iterator for TripleValueIterator<'a, S> {
	type Item = Result<(Triple, TripleValue)>;

	fn next(&mut self) -> Option<Self::Item> {
		let (triple, bytes) = match self.cursor.next()? {
			Ok(entry) => entry,
			Err(err) => return Some(Err(err)),
		};
		Some(TripleValue::deserialize(&bytes, self.context).map(|value| (triple, value)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{backend::memory::MemoryStorage, snapshot::MemorySnapshot};

	fn tree(layout: ValueLayout) -> PatchTree<MemoryStorage> {
		let snapshot: Arc<dyn Snapshot> = Arc::new(MemorySnapshot::from_strings([("s1", "p", "o1"), ("s2", "p", "o2")]));
		let dictionaries = DictionaryManager::new(snapshot.dictionary());
		PatchTree::new(MemoryStorage::new(), dictionaries, snapshot, &StoreConfig::memory().layout(layout)).unwrap()
	}

	fn triple(tree: &PatchTree<MemoryStorage>, s: &str, p: &str, o: &str) -> Triple {
		tree.dictionaries().encode_triple(s, p, o)
	}

	#[test]
	fn test_patch_order() {
		let mut tree = tree(ValueLayout::Compressed);
		let t = triple(&tree, "s3", "p", "o3");
		tree.append(2, &Patch::new().add(t)).unwrap();
		let err = tree.append(2, &Patch::new().delete(t)).unwrap_err();
		assert!(matches!(
			err,
			Error::PatchOrder {
				patch_id: 2,
				max_patch_id: 2
			}
		));
		assert!(tree.append(0, &Patch::new()).is_err());
		assert_eq!(tree.max_patch_id(), Some(2));
	}

	#[test]
	fn test_snapshot_fact_lifecycle() {
		for layout in [ValueLayout::Compressed, ValueLayout::Flat] {
			let mut tree = tree(layout);
			let t = triple(&tree, "s1", "p", "o1");
			tree.append(1, &Patch::new()).unwrap();
			tree.append(2, &Patch::new()).unwrap();
			tree.append(3, &Patch::new().delete(t)).unwrap();
			tree.append(4, &Patch::new()).unwrap();
			tree.append(5, &Patch::new().add(t)).unwrap();
			tree.append(6, &Patch::new()).unwrap();

			let visible: Vec<PatchId> = (0..=6).filter(|rev| tree.contains(&t, *rev).unwrap()).collect();
			assert_eq!(visible, vec![0, 1, 2, 5, 6], "{:?}", layout);

			let deletion = tree.get_deletion_value(&t).unwrap().unwrap();
			assert_eq!(deletion.patch_ids(), vec![3, 4]);
			assert!(!deletion.is_local_change(3));

			let addition = tree.get_addition_value(&t).unwrap().unwrap();
			assert_eq!(addition.get_patch_id_at(0), Some(5));
			assert!(addition.is_local_change(5));
		}
	}

	#[test]
	fn test_patch_fact_lifecycle() {
		for layout in [ValueLayout::Compressed, ValueLayout::Flat] {
			let mut tree = tree(layout);
			let t = triple(&tree, "s9", "p", "o9");
			assert!(matches!(t.subject, TermId::Patch(_)));

			tree.append(1, &Patch::new().add(t)).unwrap();
			tree.append(2, &Patch::new().delete(t)).unwrap();
			tree.append(3, &Patch::new().add(t)).unwrap();

			let visible: Vec<PatchId> = (0..=3).filter(|rev| tree.contains(&t, *rev).unwrap()).collect();
			assert_eq!(visible, vec![1, 3], "{:?}", layout);

			let deletion = tree.get_deletion_value(&t).unwrap().unwrap();
			assert_eq!(deletion.patch_ids(), vec![2]);
			assert!(deletion.is_local_change(2));
			assert!(!tree.get_addition_value(&t).unwrap().unwrap().is_local_change(1));
		}
	}

	#[test]
	fn test_redundant_changes_are_ignored() {
		let mut tree = tree(ValueLayout::Compressed);
		let present = triple(&tree, "s1", "p", "o1");
		let absent = triple(&tree, "s7", "p", "o7");
		let summary = tree.append(1, &Patch::new().add(present).delete(absent)).unwrap();
		assert_eq!(summary, AppendSummary::default());
		assert_eq!(tree.get_triple_value(&present).unwrap(), None);
		assert_eq!(tree.get_triple_value(&absent).unwrap(), None);
	}

	#[test]
	fn test_last_element_wins() {
		let mut tree = tree(ValueLayout::Flat);
		let t = triple(&tree, "s7", "p", "o7");
		let summary = tree.append(1, &Patch::new().add(t).delete(t).add(t)).unwrap();
		assert_eq!(summary.additions, 1);
		assert!(tree.contains(&t, 1).unwrap());
	}

	#[test]
	fn test_deletion_positions() {
		for layout in [ValueLayout::Compressed, ValueLayout::Flat] {
			let snapshot: Arc<dyn Snapshot> = Arc::new(MemorySnapshot::from_strings([
				("a", "p", "x"),
				("a", "q", "x"),
				("b", "p", "x"),
				("b", "p", "y"),
			]));
			let dictionaries = DictionaryManager::new(snapshot.dictionary());
			let mut tree =
				PatchTree::new(MemoryStorage::new(), dictionaries, snapshot, &StoreConfig::memory().layout(layout))
					.unwrap();
			let t = |s, p, o| tree.dictionaries().lookup_triple(s, p, o);
			let (apx, aqx, bpx, bpy) = (t("a", "p", "x"), t("a", "q", "x"), t("b", "p", "x"), t("b", "p", "y"));

			tree.append(1, &Patch::new().delete(bpy).delete(aqx)).unwrap();
			let positions = |tree: &PatchTree<MemoryStorage>, triple: &Triple, rev| {
				tree.get_deletion_value(triple).unwrap().unwrap().get(rev).unwrap().positions
			};
			// SP? S?O S?? ?PO ?P? ??O ???
			assert_eq!(positions(&tree, &aqx, 1), PatchPositions::new([0, 0, 0, 0, 0, 0, 0]));
			assert_eq!(positions(&tree, &bpy, 1), PatchPositions::new([0, 0, 0, 0, 0, 0, 1]));

			// apx sorts first and pushes both earlier deletions back
			tree.append(2, &Patch::new().delete(apx)).unwrap();
			assert_eq!(positions(&tree, &apx, 2), PatchPositions::new([0, 0, 0, 0, 0, 0, 0]));
			assert_eq!(positions(&tree, &aqx, 2), PatchPositions::new([0, 1, 1, 0, 0, 1, 1]));
			assert_eq!(positions(&tree, &bpy, 2), PatchPositions::new([0, 0, 0, 0, 1, 0, 2]));
			// the earlier revision keeps its positions
			assert_eq!(positions(&tree, &aqx, 1), PatchPositions::new([0, 0, 0, 0, 0, 0, 0]));

			assert_eq!(tree.deletion_count(&Triple::any(), 1).unwrap(), 2);
			assert_eq!(tree.deletion_count(&Triple::any(), 2).unwrap(), 3);
			assert_eq!(tree.deletion_count(&Triple::new(apx.subject, TermId::Any, TermId::Any), 2).unwrap(), 2);
			assert_eq!(tree.deletion_count(&Triple::new(TermId::Any, apx.predicate, TermId::Any), 2).unwrap(), 2);
			assert_eq!(tree.deletion_count(&bpx, 2).unwrap(), 0);
			assert_eq!(tree.deletion_count(&bpy, 2).unwrap(), 1);
			assert_eq!(tree.deletion_count(&Triple::any(), 0).unwrap(), 0);
		}
	}

	#[test]
	fn test_iterators_respect_pattern_and_order() {
		let mut tree = tree(ValueLayout::Compressed);
		let a = triple(&tree, "s1", "p", "new1");
		let b = triple(&tree, "s2", "p", "new0");
		let c = triple(&tree, "s3", "q", "new0");
		let gone = triple(&tree, "s2", "p", "o2");
		tree.append(1, &Patch::new().add(a).add(b).add(c).delete(gone)).unwrap();

		let p = tree.dictionaries().lookup("p");
		let pattern = Triple::new(TermId::Any, p, TermId::Any);
		let found: Vec<Triple> =
			tree.addition_iterator(&pattern, TripleOrder::Pos).unwrap().map(|item| item.unwrap().0).collect();
		// object first: new0 < new1
		assert_eq!(found, vec![b, a]);

		let all: Vec<Triple> =
			tree.addition_iterator(&Triple::any(), TripleOrder::Spo).unwrap().map(|item| item.unwrap().0).collect();
		assert_eq!(all, vec![a, b, c]);

		let deleted: Vec<Triple> =
			tree.deletion_iterator(&pattern).unwrap().map(|item| item.unwrap().0).collect();
		assert_eq!(deleted, vec![gone]);
	}

	#[test]
	fn test_redundant_change_keeps_flat_history() {
		for layout in [ValueLayout::Compressed, ValueLayout::Flat] {
			let mut tree = tree(layout);
			let added = triple(&tree, "s7", "p", "o7");
			let deleted = triple(&tree, "s1", "p", "o1");
			tree.append(1, &Patch::new().add(added).delete(deleted)).unwrap();
			let summary = tree.append(2, &Patch::new().add(added).delete(deleted)).unwrap();
			assert_eq!(summary, AppendSummary::default());

			assert!(tree.contains(&added, 2).unwrap(), "{:?}", layout);
			assert!(!tree.contains(&deleted, 2).unwrap(), "{:?}", layout);
			assert_eq!(tree.deletion_count(&Triple::any(), 2).unwrap(), 1, "{:?}", layout);
		}
	}

	#[test]
	fn test_local_deletions_are_not_counted() {
		for layout in [ValueLayout::Compressed, ValueLayout::Flat] {
			let mut tree = tree(layout);
			let s1 = triple(&tree, "s1", "p", "o1");
			let s2 = triple(&tree, "s2", "p", "o2");
			let added = triple(&tree, "s0", "p", "o0");
			tree.append(1, &Patch::new().add(added)).unwrap();
			tree.append(2, &Patch::new().delete(added).delete(s2)).unwrap();

			assert_eq!(tree.deletion_count(&Triple::any(), 2).unwrap(), 1, "{:?}", layout);
			assert_eq!(tree.deletion_count(&added, 2).unwrap(), 0, "{:?}", layout);
			let positions = tree.get_deletion_value(&s2).unwrap().unwrap().get(2).unwrap().positions;
			assert_eq!(positions.get_by_pattern(&Triple::any()), 0, "{:?}", layout);

			// s1 is in front of the only snapshot deletion
			assert_eq!(tree.deletions_before(&Triple::any(), 2, &s1).unwrap(), 0);
			assert_eq!(tree.deletions_before(&Triple::any(), 2, &s2).unwrap(), 0);
		}
	}

	#[test]
	fn test_deletions_before() {
		let snapshot: Arc<dyn Snapshot> = Arc::new(MemorySnapshot::from_strings([
			("a", "p", "x"),
			("b", "p", "x"),
			("c", "p", "x"),
			("d", "p", "x"),
			("e", "q", "x"),
		]));
		let dictionaries = DictionaryManager::new(snapshot.dictionary());
		let mut tree = PatchTree::new(MemoryStorage::new(), dictionaries, snapshot, &StoreConfig::memory()).unwrap();
		let t = |s| tree.dictionaries().lookup_triple(s, "p", "x");
		let (a, b, c, d) = (t("a"), t("b"), t("c"), t("d"));
		let e = tree.dictionaries().lookup_triple("e", "q", "x");
		tree.append(1, &Patch::new().delete(b).delete(c).delete(e)).unwrap();

		let any = Triple::any();
		assert_eq!(tree.deletions_before(&any, 1, &a).unwrap(), 0);
		assert_eq!(tree.deletions_before(&any, 1, &b).unwrap(), 0);
		assert_eq!(tree.deletions_before(&any, 1, &c).unwrap(), 1);
		assert_eq!(tree.deletions_before(&any, 1, &d).unwrap(), 2);
		assert_eq!(tree.deletions_before(&any, 1, &e).unwrap(), 2);

		let p = Triple::new(TermId::Any, a.predicate, TermId::Any);
		assert_eq!(tree.deletions_before(&p, 1, &d).unwrap(), 2);
		assert_eq!(tree.deletion_count(&p, 1).unwrap(), 2);
		// nothing is deleted at the snapshot
		assert_eq!(tree.deletions_before(&any, 0, &d).unwrap(), 0);
	}

	mod counting {
		use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

		use tessera_core::KeyComparator;

		use super::*;
		use crate::backend::memory::MemoryRangeIter;

		/// Memory storage that counts full index scans and dictionary writes.
		#[derive(Clone, Default)]
		struct CountingStorage {
			inner: MemoryStorage,
			scans: Arc<AtomicUsize>,
			dictionary_writes: Arc<AtomicUsize>,
		}

		impl IndexStorage for CountingStorage {
			type RangeIter<'a> = MemoryRangeIter;

			fn ensure_index(&self, index: IndexId, comparator: Arc<dyn KeyComparator>) -> Result<()> {
				self.inner.ensure_index(index, comparator)
			}

			fn get(&self, index: IndexId, key: &[u8]) -> Result<Option<Vec<u8>>> {
				self.inner.get(index, key)
			}

			fn set(&self, index: IndexId, entries: &[(&[u8], &[u8])]) -> Result<()> {
				if entries.iter().any(|(key, _)| *key == DICTIONARY_KEY) {
					self.dictionary_writes.fetch_add(1, AtomicOrdering::SeqCst);
				}
				self.inner.set(index, entries)
			}

			fn range(&self, index: IndexId, start: Bound<&[u8]>, batch_size: usize) -> Result<Self::RangeIter<'_>> {
				if matches!(start, Bound::Unbounded) {
					self.scans.fetch_add(1, AtomicOrdering::SeqCst);
				}
				self.inner.range(index, start, batch_size)
			}

			fn clear_index(&self, index: IndexId) -> Result<()> {
				self.inner.clear_index(index)
			}
		}

		fn counting_tree(layout: ValueLayout) -> (PatchTree<CountingStorage>, CountingStorage) {
			let snapshot: Arc<dyn Snapshot> =
				Arc::new(MemorySnapshot::from_strings([("s1", "p", "o1"), ("s2", "p", "o2")]));
			let dictionaries = DictionaryManager::new(snapshot.dictionary());
			let storage = CountingStorage::default();
			let tree =
				PatchTree::new(storage.clone(), dictionaries, snapshot, &StoreConfig::memory().layout(layout)).unwrap();
			(tree, storage)
		}

		#[test]
		fn test_compressed_append_touches_only_changed_facts() {
			let (mut tree, storage) = counting_tree(ValueLayout::Compressed);
			let scans = || storage.scans.load(AtomicOrdering::SeqCst);
			let s1 = tree.dictionaries().encode_triple("s1", "p", "o1");
			let s2 = tree.dictionaries().encode_triple("s2", "p", "o2");
			let added = tree.dictionaries().encode_triple("s8", "p", "o8");

			tree.append(1, &Patch::new().delete(s1)).unwrap();
			tree.append(2, &Patch::new().add(added)).unwrap();
			tree.append(3, &Patch::new().delete(added)).unwrap();
			tree.append(4, &Patch::new()).unwrap();
			assert_eq!(scans(), 0);

			// a snapshot deletion reorders the deleted facts, so every fact is visited
			tree.append(5, &Patch::new().delete(s2)).unwrap();
			assert_eq!(scans(), 1);

			assert!(!tree.contains(&s1, 4).unwrap());
			assert!(tree.contains(&added, 2).unwrap());
			assert!(!tree.contains(&added, 4).unwrap());
			assert_eq!(tree.deletion_count(&Triple::any(), 4).unwrap(), 1);
			assert_eq!(tree.deletion_count(&Triple::any(), 5).unwrap(), 2);
			let positions = tree.get_deletion_value(&s2).unwrap().unwrap().get(5).unwrap().positions;
			assert_eq!(positions.get_by_pattern(&Triple::any()), 1);
		}

		#[test]
		fn test_flat_append_visits_every_fact() {
			let (mut tree, storage) = counting_tree(ValueLayout::Flat);
			let added = tree.dictionaries().encode_triple("s8", "p", "o8");
			tree.append(1, &Patch::new().add(added)).unwrap();
			tree.append(2, &Patch::new()).unwrap();
			assert_eq!(storage.scans.load(AtomicOrdering::SeqCst), 1);
			assert!(tree.contains(&added, 2).unwrap());
		}

		#[test]
		fn test_dictionary_written_when_grown() {
			let (mut tree, storage) = counting_tree(ValueLayout::Compressed);
			let writes = || storage.dictionary_writes.load(AtomicOrdering::SeqCst);
			let added = tree.dictionaries().encode_triple("s8", "p", "o8");
			tree.append(1, &Patch::new().add(added)).unwrap();
			assert_eq!(writes(), 1);
			tree.append(2, &Patch::new()).unwrap();
			tree.append(3, &Patch::new().delete(added)).unwrap();
			assert_eq!(writes(), 1);

			let other = tree.dictionaries().encode_triple("s9", "p", "o9");
			tree.append(4, &Patch::new().add(other)).unwrap();
			assert_eq!(writes(), 2);
			assert_eq!(PatchTree::restore_dictionary(&storage).unwrap().len(), tree.dictionaries().patch().len());
		}
	}
}
