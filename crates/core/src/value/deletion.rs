// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::fmt::{self, Display, Formatter};

use tessera_type::{Error, PatchId, Result};

use crate::{
	dv::DvIntervalList,
	encoding::{Encoding, Reader},
	positions::PatchPositions,
	value::{DeletionElement, ReducedDeletionElement, ValueContext, ValueElement, ValueLayout},
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum History<E: ValueElement> {
	Intervals(DvIntervalList<E>),
	Sorted(Vec<E>),
}

/// Revisions at which a fact was deleted, each with its local change flag
/// and, for full elements, its positions among that revision's deletions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionValue<E: ValueElement = DeletionElement> {
	history: History<E>,
	max_patch_id: PatchId,
}

impl<E: ValueElement> DeletionValue<E> {
	pub fn new(layout: ValueLayout, max_patch_id: PatchId) -> Self {
		let history = match layout {
			ValueLayout::Compressed => History::Intervals(DvIntervalList::new()),
			ValueLayout::Flat => History::Sorted(Vec::new()),
		};
		Self {
			history,
			max_patch_id,
		}
	}

	pub fn layout(&self) -> ValueLayout {
		match self.history {
			History::Intervals(_) => ValueLayout::Compressed,
			History::Sorted(_) => ValueLayout::Flat,
		}
	}

	pub fn max_patch_id(&self) -> PatchId {
		self.max_patch_id
	}

	pub fn set_max_patch_id(&mut self, max_patch_id: PatchId) {
		self.max_patch_id = max_patch_id;
	}

	fn outer_limit(&self) -> PatchId {
		self.max_patch_id.saturating_add(1)
	}

	/// Records `element`, replacing an existing entry for the same revision.
	pub fn add(&mut self, element: E) -> bool {
		match &mut self.history {
			History::Intervals(list) => list.addition(&element),
			History::Sorted(elements) => {
				match elements.binary_search_by_key(&element.patch_id(), |e| e.patch_id()) {
					Ok(at) => {
						if elements[at] == element {
							return false;
						}
						elements[at] = element;
					}
					Err(at) => elements.insert(at, element),
				}
				true
			}
		}
	}

	/// Marks the fact present again from `patch_id` on.
	pub fn del(&mut self, patch_id: PatchId) -> bool {
		match &mut self.history {
			History::Intervals(list) => list.deletion(patch_id),
			History::Sorted(elements) => match elements.binary_search_by_key(&patch_id, |e| e.patch_id()) {
				Ok(at) => {
					elements.remove(at);
					true
				}
				Err(_) => false,
			},
		}
	}

	pub fn is_patch_id(&self, patch_id: PatchId) -> bool {
		match &self.history {
			History::Intervals(list) => patch_id < self.outer_limit() && list.is_in(patch_id),
			History::Sorted(elements) => elements.binary_search_by_key(&patch_id, |e| e.patch_id()).is_ok(),
		}
	}

	/// Entry at `patch_id`, or the last entry when `patch_id` is not recorded.
	///
	/// None only for an empty value.
	pub fn get(&self, patch_id: PatchId) -> Option<E> {
		match &self.history {
			History::Intervals(list) if self.is_patch_id(patch_id) => Some(list.element(patch_id)),
			History::Sorted(elements) => {
				match elements.binary_search_by_key(&patch_id, |e| e.patch_id()) {
					Ok(at) => Some(elements[at].clone()),
					Err(_) => elements.last().cloned(),
				}
			}
			History::Intervals(_) => self.last(),
		}
	}

	pub fn last(&self) -> Option<E> {
		let size = self.get_size();
		if size == 0 {
			return None;
		}
		self.get_patch_at(size - 1)
	}

	/// Rank of `patch_id` among the recorded revisions, -1 when absent.
	pub fn get_patchvalue_index(&self, patch_id: PatchId) -> i64 {
		match &self.history {
			History::Intervals(list) => list.get_index(patch_id, self.outer_limit()),
			History::Sorted(elements) => elements
				.binary_search_by_key(&patch_id, |e| e.patch_id())
				.map(|at| at as i64)
				.unwrap_or(-1),
		}
	}

	pub fn get_size(&self) -> u64 {
		match &self.history {
			History::Intervals(list) => list.size(self.outer_limit()),
			History::Sorted(elements) => elements.len() as u64,
		}
	}

	pub fn get_patch_at(&self, index: u64) -> Option<E> {
		match &self.history {
			History::Intervals(list) => list.get_element_at(index, self.outer_limit()),
			History::Sorted(elements) => usize::try_from(index).ok().and_then(|i| elements.get(i).cloned()),
		}
	}

	/// Local change flag of the entry [`get`](Self::get) returns.
	pub fn is_local_change(&self, patch_id: PatchId) -> bool {
		self.get(patch_id).is_some_and(|element| element.is_local_change())
	}

	/// All recorded revisions up to the latest known revision, ascending.
	pub fn patch_ids(&self) -> Vec<PatchId> {
		match &self.history {
			History::Intervals(list) => {
				let limit = self.outer_limit();
				list.patches()
					.intervals()
					.take_while(|(start, _)| *start < limit)
					.flat_map(|(start, end)| start..end.min(limit))
					.collect()
			}
			History::Sorted(elements) => elements.iter().map(|e| e.patch_id()).collect(),
		}
	}

	/// The same history with positions dropped.
	pub fn to_reduced(&self) -> DeletionValue<ReducedDeletionElement> {
		let history = match &self.history {
			History::Intervals(list) => History::Intervals(list.without_positions()),
			History::Sorted(elements) => History::Sorted(
				elements.iter()
					.map(|e| ReducedDeletionElement::new(e.patch_id(), e.is_local_change()))
					.collect(),
			),
		};
		DeletionValue {
			history,
			max_patch_id: self.max_patch_id,
		}
	}

	pub fn serialize(&self, encoding: Encoding) -> Vec<u8> {
		match &self.history {
			History::Intervals(list) => list.serialize(encoding),
			History::Sorted(elements) => {
				let mut out = Vec::new();
				for element in elements {
					encoding.write_unsigned(element.patch_id() as u64, &mut out);
					out.push(element.is_local_change() as u8);
					if E::HAS_POSITIONS {
						element.positions().encode(encoding, &mut out);
					}
				}
				out
			}
		}
	}

	pub fn deserialize(bytes: &[u8], context: ValueContext) -> Result<Self> {
		let history = match context.layout {
			ValueLayout::Compressed => History::Intervals(DvIntervalList::deserialize(bytes, context.encoding)?),
			ValueLayout::Flat => {
				let mut reader = Reader::new(bytes, "deletion value");
				let mut elements: Vec<E> = Vec::new();
				while !reader.is_empty() {
					let raw = reader.read_unsigned(context.encoding)?;
					let patch_id = PatchId::try_from(raw).map_err(|_| {
						Error::decode("deletion value", format!("revision {} out of range", raw))
					})?;
					let local_change = match reader.read_u8()? {
						0 => false,
						1 => true,
						flag => {
							return Err(Error::decode(
								"deletion value",
								format!("invalid local change flag {}", flag),
							));
						}
					};
					let positions = if E::HAS_POSITIONS {
						PatchPositions::decode(&mut reader, context.encoding)?
					} else {
						PatchPositions::default()
					};
					if elements.last().is_some_and(|last| last.patch_id() >= patch_id) {
						return Err(Error::decode("deletion value", "revisions out of order"));
					}
					elements.push(E::from_parts(patch_id, local_change, positions));
				}
				History::Sorted(elements)
			}
		};
		Ok(Self {
			history,
			max_patch_id: context.max_patch_id,
		})
	}
}

impl<E: ValueElement + Display> Display for DeletionValue<E> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str("{")?;
		for i in 0..self.get_size() {
			let Some(element) = self.get_patch_at(i) else {
				break;
			};
			if i > 0 {
				f.write_str(",")?;
			}
			write!(f, "{}", element)?;
		}
		f.write_str("}")
	}
}
