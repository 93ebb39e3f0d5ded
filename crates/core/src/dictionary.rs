// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! String dictionaries behind triple components.

use std::{cmp::Ordering, collections::HashMap, fmt, sync::Arc};

use parking_lot::RwLock;
use tessera_type::{Error, Result, TermId};

use crate::{
	encoding::{Reader, write_segment},
	triple::Triple,
};

/// The read-only dictionary of the base snapshot.
///
/// Ids are non-zero. `compare_ids` must agree with the string order of the
/// resolved ids, since comparisons mix it with string comparisons.
pub trait BaseDictionary: Send + Sync {
	fn id_to_string(&self, id: u32) -> Option<String>;

	fn string_to_id(&self, value: &str) -> Option<u32>;

	/// String order, ids the dictionary cannot resolve sort first by id.
	fn compare_ids(&self, left: u32, right: u32) -> Ordering {
		match (self.id_to_string(left), self.id_to_string(right)) {
			(Some(l), Some(r)) => l.cmp(&r),
			(None, Some(_)) => Ordering::Less,
			(Some(_), None) => Ordering::Greater,
			(None, None) => left.cmp(&right),
		}
	}
}

#[derive(Debug, Default)]
struct PatchStrings {
	strings: Vec<String>,
	ids: HashMap<String, u32>,
}

/// Append-only dictionary of the strings introduced by patches.
#[derive(Debug, Default)]
pub struct PatchDictionary {
	inner: RwLock<PatchStrings>,
}

impl PatchDictionary {
	pub fn new() -> Self {
		Self::default()
	}

	/// Id of `value`, assigning the next free id when unknown.
	pub fn insert(&self, value: &str) -> u32 {
		if let Some(id) = self.lookup(value) {
			return id;
		}
		let mut inner = self.inner.write();
		if let Some(id) = inner.ids.get(value) {
			return *id;
		}
		let id = inner.strings.len() as u32;
		inner.strings.push(value.to_string());
		inner.ids.insert(value.to_string(), id);
		id
	}

	pub fn lookup(&self, value: &str) -> Option<u32> {
		self.inner.read().ids.get(value).copied()
	}

	pub fn resolve(&self, id: u32) -> Option<String> {
		self.inner.read().strings.get(id as usize).cloned()
	}

	pub fn len(&self) -> usize {
		self.inner.read().strings.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Length prefixed strings in id order.
	pub fn serialize(&self) -> Vec<u8> {
		let mut out = Vec::new();
		for value in &self.inner.read().strings {
			write_segment(value.as_bytes(), &mut out);
		}
		out
	}

	pub fn deserialize(bytes: &[u8]) -> Result<Self> {
		let mut reader = Reader::new(bytes, "patch dictionary");
		let mut inner = PatchStrings::default();
		while !reader.is_empty() {
			let value = std::str::from_utf8(reader.read_segment()?)
				.map_err(|err| Error::decode("patch dictionary", err.to_string()))?;
			let id = inner.strings.len() as u32;
			if inner.ids.insert(value.to_string(), id).is_some() {
				return Err(Error::decode("patch dictionary", format!("duplicate entry {:?}", value)));
			}
			inner.strings.push(value.to_string());
		}
		Ok(Self {
			inner: RwLock::new(inner),
		})
	}
}

/// The two dictionaries that resolve the terms of one side of a comparison.
#[derive(Clone)]
pub struct DictionaryPair {
	pub base: Arc<dyn BaseDictionary>,
	pub patch: Arc<PatchDictionary>,
}

impl DictionaryPair {
	pub fn new(base: Arc<dyn BaseDictionary>, patch: Arc<PatchDictionary>) -> Self {
		Self {
			base,
			patch,
		}
	}

	/// Whether both pairs share the same dictionary instances.
	pub fn same_as(&self, other: &DictionaryPair) -> bool {
		std::ptr::addr_eq(Arc::as_ptr(&self.base), Arc::as_ptr(&other.base))
			&& Arc::ptr_eq(&self.patch, &other.patch)
	}

	/// String form of `term`, empty when the id is unknown or unbound.
	pub fn resolve(&self, term: TermId) -> String {
		self.try_resolve(term).unwrap_or_default()
	}

	pub fn try_resolve(&self, term: TermId) -> Option<String> {
		match term {
			TermId::Base(id) => self.base.id_to_string(id),
			TermId::Patch(id) => self.patch.resolve(id),
			TermId::Any | TermId::Last => None,
		}
	}
}

impl fmt::Debug for DictionaryPair {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("DictionaryPair").field("patch_len", &self.patch.len()).finish_non_exhaustive()
	}
}

/// Maps strings to terms, preferring the base dictionary.
#[derive(Debug, Clone)]
pub struct DictionaryManager {
	pair: DictionaryPair,
}

impl DictionaryManager {
	pub fn new(base: Arc<dyn BaseDictionary>) -> Self {
		Self::with_patch(base, Arc::new(PatchDictionary::new()))
	}

	pub fn with_patch(base: Arc<dyn BaseDictionary>, patch: Arc<PatchDictionary>) -> Self {
		Self {
			pair: DictionaryPair::new(base, patch),
		}
	}

	pub fn pair(&self) -> &DictionaryPair {
		&self.pair
	}

	pub fn patch(&self) -> &PatchDictionary {
		&self.pair.patch
	}

	/// Term for `value`; strings unknown to the base go to the patch
	/// dictionary. The empty string is the unbound term.
	pub fn insert(&self, value: &str) -> TermId {
		if value.is_empty() {
			return TermId::Any;
		}
		match self.pair.base.string_to_id(value) {
			Some(id) => TermId::Base(id),
			None => TermId::Patch(self.pair.patch.insert(value)),
		}
	}

	/// Like [`insert`](Self::insert) but never assigns, `Any` when unknown.
	pub fn lookup(&self, value: &str) -> TermId {
		if value.is_empty() {
			return TermId::Any;
		}
		if let Some(id) = self.pair.base.string_to_id(value) {
			return TermId::Base(id);
		}
		self.pair.patch.lookup(value).map(TermId::Patch).unwrap_or(TermId::Any)
	}

	pub fn resolve(&self, term: TermId) -> String {
		self.pair.resolve(term)
	}

	pub fn encode_triple(&self, subject: &str, predicate: &str, object: &str) -> Triple {
		Triple::new(self.insert(subject), self.insert(predicate), self.insert(object))
	}

	/// Pattern for the given strings without growing the dictionary. Unknown
	/// strings become unbound, so callers check [`Self::resolve`] when exact
	/// matches matter.
	pub fn lookup_triple(&self, subject: &str, predicate: &str, object: &str) -> Triple {
		Triple::new(self.lookup(subject), self.lookup(predicate), self.lookup(object))
	}

	pub fn decode_triple(&self, triple: &Triple) -> (String, String, String) {
		(self.resolve(triple.subject), self.resolve(triple.predicate), self.resolve(triple.object))
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;

	/// Sorted string table, ids start at 1.
	pub(crate) struct SortedDictionary(pub Vec<String>);

	impl SortedDictionary {
		pub(crate) fn of(values: &[&str]) -> Arc<dyn BaseDictionary> {
			let mut values: Vec<String> = values.iter().map(|v| v.to_string()).collect();
			values.sort();
			values.dedup();
			Arc::new(SortedDictionary(values))
		}
	}

	impl BaseDictionary for SortedDictionary {
		fn id_to_string(&self, id: u32) -> Option<String> {
			self.0.get((id as usize).checked_sub(1)?).cloned()
		}

		fn string_to_id(&self, value: &str) -> Option<u32> {
			self.0.binary_search_by(|v| v.as_str().cmp(value)).ok().map(|i| i as u32 + 1)
		}

		fn compare_ids(&self, left: u32, right: u32) -> Ordering {
			left.cmp(&right)
		}
	}

	/// Reversed string table that relies on the default id comparison.
	struct ReversedDictionary;

	impl BaseDictionary for ReversedDictionary {
		fn id_to_string(&self, id: u32) -> Option<String> {
			["z", "y"].get(id.checked_sub(1)? as usize).map(|v| v.to_string())
		}

		fn string_to_id(&self, value: &str) -> Option<u32> {
			["z", "y"].iter().position(|v| *v == value).map(|i| i as u32 + 1)
		}
	}

	#[test]
	fn test_default_compare_ids() {
		let dictionary = ReversedDictionary;
		assert_eq!(dictionary.compare_ids(1, 2), Ordering::Greater);
		assert_eq!(dictionary.compare_ids(5, 1), Ordering::Less);
		assert_eq!(dictionary.compare_ids(5, 6), Ordering::Less);
		assert_eq!(dictionary.compare_ids(6, 6), Ordering::Equal);
	}

	#[test]
	fn test_patch_dictionary_assigns_sequential_ids() {
		let dictionary = PatchDictionary::new();
		assert!(dictionary.is_empty());
		assert_eq!(dictionary.insert("b"), 0);
		assert_eq!(dictionary.insert("a"), 1);
		assert_eq!(dictionary.insert("b"), 0);
		assert_eq!(dictionary.len(), 2);
		assert_eq!(dictionary.lookup("a"), Some(1));
		assert_eq!(dictionary.lookup("c"), None);
		assert_eq!(dictionary.resolve(1).as_deref(), Some("a"));
		assert_eq!(dictionary.resolve(7), None);
	}

	#[test]
	fn test_patch_dictionary_serialization() {
		let dictionary = PatchDictionary::new();
		dictionary.insert("ex:alice");
		dictionary.insert("ex:bob");
		let restored = PatchDictionary::deserialize(&dictionary.serialize()).unwrap();
		assert_eq!(restored.lookup("ex:bob"), Some(1));
		assert_eq!(restored.resolve(0).as_deref(), Some("ex:alice"));

		let bytes = dictionary.serialize();
		assert!(PatchDictionary::deserialize(&bytes[..bytes.len() - 1]).is_err());
	}

	#[test]
	fn test_manager_prefers_base() {
		let manager = DictionaryManager::new(SortedDictionary::of(&["a", "c"]));
		assert_eq!(manager.insert("c"), TermId::Base(2));
		assert_eq!(manager.insert("b"), TermId::Patch(0));
		assert_eq!(manager.insert(""), TermId::Any);
		assert_eq!(manager.lookup("b"), TermId::Patch(0));
		assert_eq!(manager.lookup("zzz"), TermId::Any);
		assert_eq!(manager.patch().len(), 1);
	}

	#[test]
	fn test_manager_resolution() {
		let manager = DictionaryManager::new(SortedDictionary::of(&["s", "p"]));
		let triple = manager.encode_triple("s", "p", "o");
		assert_eq!(triple, Triple::new(TermId::Base(2), TermId::Base(1), TermId::Patch(0)));
		assert_eq!(manager.decode_triple(&triple), ("s".to_string(), "p".to_string(), "o".to_string()));

		assert_eq!(manager.resolve(TermId::Base(99)), "");
		assert_eq!(manager.resolve(TermId::Patch(99)), "");
		assert_eq!(manager.resolve(TermId::Any), "");
	}

	#[test]
	fn test_pair_identity() {
		let manager = DictionaryManager::new(SortedDictionary::of(&["a"]));
		let other = DictionaryManager::new(SortedDictionary::of(&["a"]));
		assert!(manager.pair().same_as(&manager.clone().pair().clone()));
		assert!(!manager.pair().same_as(other.pair()));
	}
}
