// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! The immutable base state (revision 0).

use std::{cmp::Ordering, sync::Arc};

use tessera_core::{BaseDictionary, Triple};
use tessera_type::TermId;

/// Read-only access to the base snapshot.
pub trait Snapshot: Send + Sync {
	/// Facts matching `pattern`, in subject-predicate-object order.
	fn search<'a>(&'a self, pattern: &Triple) -> Box<dyn Iterator<Item = Triple> + 'a>;

	fn contains(&self, triple: &Triple) -> bool;

	/// Number of facts matching `pattern`.
	fn count(&self, pattern: &Triple) -> u64 {
		self.search(pattern).count() as u64
	}

	fn dictionary(&self) -> Arc<dyn BaseDictionary>;
}

/// Sorted string table, id `n` is the `n`th string (starting at 1).
#[derive(Debug, Default)]
pub struct MemoryDictionary {
	strings: Vec<String>,
}

impl BaseDictionary for MemoryDictionary {
	fn id_to_string(&self, id: u32) -> Option<String> {
		self.strings.get((id as usize).checked_sub(1)?).cloned()
	}

	fn string_to_id(&self, value: &str) -> Option<u32> {
		self.strings.binary_search_by(|s| s.as_str().cmp(value)).ok().map(|i| i as u32 + 1)
	}

	fn compare_ids(&self, left: u32, right: u32) -> Ordering {
		left.cmp(&right)
	}
}

/// A snapshot held in memory.
///
/// Ids are assigned in string order, so id order and string order agree.
#[derive(Debug, Default)]
pub struct MemorySnapshot {
	dictionary: Arc<MemoryDictionary>,
	triples: Vec<Triple>,
}

impl MemorySnapshot {
	pub fn empty() -> Self {
		Self::default()
	}

	pub fn from_strings<I, S>(facts: I) -> Self
	where
		I: IntoIterator<Item = (S, S, S)>,
		S: AsRef<str>,
	{
		let facts: Vec<[String; 3]> = facts
			.into_iter()
			.map(|(s, p, o)| [s.as_ref().to_string(), p.as_ref().to_string(), o.as_ref().to_string()])
			.collect();

		let mut strings: Vec<String> = facts.iter().flatten().cloned().collect();
		strings.sort();
		strings.dedup();
		let dictionary = MemoryDictionary {
			strings,
		};

		let term = |value: &str| dictionary.string_to_id(value).map(TermId::Base).unwrap_or(TermId::Any);
		let mut triples: Vec<Triple> =
			facts.iter().map(|[s, p, o]| Triple::new(term(s), term(p), term(o))).collect();
		triples.sort_by_key(|t| t.encode_key());
		triples.dedup();

		Self {
			dictionary: Arc::new(dictionary),
			triples,
		}
	}

	pub fn len(&self) -> usize {
		self.triples.len()
	}

	pub fn is_empty(&self) -> bool {
		self.triples.is_empty()
	}
}

impl Snapshot for MemorySnapshot {
	fn search<'a>(&'a self, pattern: &Triple) -> Box<dyn Iterator<Item = Triple> + 'a> {
		let pattern = *pattern;
		// every match sorts at or after the pattern, unbound terms being zero
		let start = self.triples.partition_point(|t| t.encode_key() < pattern.encode_key());
		Box::new(self.triples[start..].iter().filter(move |t| t.matches(&pattern)).copied())
	}

	fn contains(&self, triple: &Triple) -> bool {
		self.triples.binary_search_by_key(&triple.encode_key(), |t| t.encode_key()).is_ok()
	}

	fn dictionary(&self) -> Arc<dyn BaseDictionary> {
		self.dictionary.clone()
	}
}
