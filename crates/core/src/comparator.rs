// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::cmp::Ordering;

use tessera_type::TermId;

use crate::{
	dictionary::DictionaryPair,
	triple::{Triple, TripleOrder},
};

/// Orders triples by the components of a [`TripleOrder`].
///
/// Each side carries the dictionaries its terms belong to. Two base ids of
/// the same dictionaries compare natively, everything else compares by the
/// resolved strings. Without dictionaries terms compare by raw id, base ids
/// before patch ids.
#[derive(Debug, Clone)]
pub struct TripleComparator {
	order: TripleOrder,
	left: Option<DictionaryPair>,
	right: Option<DictionaryPair>,
}

impl TripleComparator {
	pub fn new(order: TripleOrder) -> Self {
		Self {
			order,
			left: None,
			right: None,
		}
	}

	pub fn with_dictionaries(order: TripleOrder, left: DictionaryPair, right: DictionaryPair) -> Self {
		Self {
			order,
			left: Some(left),
			right: Some(right),
		}
	}

	pub fn order(&self) -> TripleOrder {
		self.order
	}

	pub fn compare(&self, a: &Triple, b: &Triple) -> Ordering {
		let a = self.order.components(a);
		let b = self.order.components(b);
		a.iter().zip(b.iter()).map(|(a, b)| self.compare_terms(*a, *b)).find(|o| o.is_ne()).unwrap_or(Ordering::Equal)
	}

	fn compare_terms(&self, a: TermId, b: TermId) -> Ordering {
		match (a, b) {
			(TermId::Any, TermId::Any) | (TermId::Last, TermId::Last) => return Ordering::Equal,
			(TermId::Any, _) | (_, TermId::Last) => return Ordering::Less,
			(_, TermId::Any) | (TermId::Last, _) => return Ordering::Greater,
			_ => {}
		}

		let (Some(left), Some(right)) = (&self.left, &self.right) else {
			return a.to_raw().cmp(&b.to_raw());
		};

		if let (TermId::Base(a), TermId::Base(b)) = (a, b) {
			if left.same_as(right) {
				return left.base.compare_ids(a, b);
			}
		}
		if a == b && left.same_as(right) {
			return Ordering::Equal;
		}
		// unresolvable ids sort first, among themselves by raw id
		match (left.try_resolve(a), right.try_resolve(b)) {
			(Some(a), Some(b)) => a.cmp(&b),
			(None, Some(_)) => Ordering::Less,
			(Some(_), None) => Ordering::Greater,
			(None, None) => a.to_raw().cmp(&b.to_raw()),
		}
	}
}

/// Ordering hook for an index of the storage engine.
pub trait KeyComparator: Send + Sync {
	fn compare_keys(&self, a: &[u8], b: &[u8]) -> Ordering;
}

/// Raw byte order.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytewiseComparator;

impl KeyComparator for BytewiseComparator {
	fn compare_keys(&self, a: &[u8], b: &[u8]) -> Ordering {
		a.cmp(b)
	}
}

impl KeyComparator for TripleComparator {
	/// Keys that are not triple keys sort by their bytes, after triple keys.
	fn compare_keys(&self, a: &[u8], b: &[u8]) -> Ordering {
		match (Triple::decode_key(a), Triple::decode_key(b)) {
			(Ok(a), Ok(b)) => self.compare(&a, &b),
			(Ok(_), Err(_)) => Ordering::Less,
			(Err(_), Ok(_)) => Ordering::Greater,
			(Err(_), Err(_)) => a.cmp(b),
		}
	}
}
