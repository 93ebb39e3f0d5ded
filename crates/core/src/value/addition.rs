// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::fmt::{self, Display, Formatter};

use tessera_type::{Error, PatchId, Result};

use crate::{
	encoding::{Encoding, Reader, write_segment},
	interval::IntervalList,
	value::{ValueContext, ValueLayout},
};

/// A set of revisions in either value layout.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PatchSet {
	Intervals(IntervalList<PatchId>),
	Sorted(Vec<PatchId>),
}

impl PatchSet {
	fn new(layout: ValueLayout) -> Self {
		match layout {
			ValueLayout::Compressed => PatchSet::Intervals(IntervalList::new()),
			ValueLayout::Flat => PatchSet::Sorted(Vec::new()),
		}
	}

	/// Present from `patch_id` on.
	fn add(&mut self, patch_id: PatchId) -> bool {
		if let PatchSet::Intervals(list) = self {
			return list.addition(patch_id);
		}
		self.mark(patch_id)
	}

	/// Present at exactly `patch_id`.
	fn mark(&mut self, patch_id: PatchId) -> bool {
		match self {
			PatchSet::Intervals(list) => list.lone_addition(patch_id),
			PatchSet::Sorted(patches) => match patches.binary_search(&patch_id) {
				Ok(_) => false,
				Err(at) => {
					patches.insert(at, patch_id);
					true
				}
			},
		}
	}

	fn del(&mut self, patch_id: PatchId) -> bool {
		match self {
			PatchSet::Intervals(list) => list.deletion(patch_id),
			PatchSet::Sorted(patches) => match patches.binary_search(&patch_id) {
				Ok(at) => {
					patches.remove(at);
					true
				}
				Err(_) => false,
			},
		}
	}

	fn contains(&self, patch_id: PatchId) -> bool {
		match self {
			PatchSet::Intervals(list) => list.is_in(patch_id),
			PatchSet::Sorted(patches) => patches.binary_search(&patch_id).is_ok(),
		}
	}

	fn first(&self) -> Option<PatchId> {
		match self {
			PatchSet::Intervals(list) => list.intervals().next().map(|(start, _)| start),
			PatchSet::Sorted(patches) => patches.first().copied(),
		}
	}

	fn size(&self, outer_limit: PatchId) -> u64 {
		match self {
			PatchSet::Intervals(list) => list.size(outer_limit),
			PatchSet::Sorted(patches) => patches.len() as u64,
		}
	}

	fn at(&self, index: u64, outer_limit: PatchId) -> Option<PatchId> {
		match self {
			PatchSet::Intervals(list) => list.get_element_at(index, outer_limit),
			PatchSet::Sorted(patches) => usize::try_from(index).ok().and_then(|i| patches.get(i).copied()),
		}
	}

	fn serialize(&self, encoding: Encoding) -> Vec<u8> {
		match self {
			PatchSet::Intervals(list) => list.serialize(encoding),
			PatchSet::Sorted(patches) => {
				let mut out = Vec::new();
				for patch_id in patches {
					encoding.write_unsigned(*patch_id as u64, &mut out);
				}
				out
			}
		}
	}

	fn deserialize(bytes: &[u8], layout: ValueLayout, encoding: Encoding) -> Result<Self> {
		match layout {
			ValueLayout::Compressed => {
				Ok(PatchSet::Intervals(IntervalList::deserialize(bytes, encoding, PatchId::MAX)?))
			}
			ValueLayout::Flat => {
				let mut reader = Reader::new(bytes, "addition patches");
				let mut patches: Vec<PatchId> = Vec::new();
				while !reader.is_empty() {
					let raw = reader.read_unsigned(encoding)?;
					let patch_id = PatchId::try_from(raw).map_err(|_| {
						Error::decode("addition patches", format!("revision {} out of range", raw))
					})?;
					if patches.last().is_some_and(|last| *last >= patch_id) {
						return Err(Error::decode("addition patches", "revisions out of order"));
					}
					patches.push(patch_id);
				}
				Ok(PatchSet::Sorted(patches))
			}
		}
	}
}

/// Revisions at which a fact was (re)inserted, plus local change markers.
///
/// A revision is a local change when the insertion reverts an earlier
/// deletion of a snapshot fact. Local change status is sticky: it holds from
/// the first marker onwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdditionValue {
	patches: PatchSet,
	local_changes: PatchSet,
	max_patch_id: PatchId,
}

impl AdditionValue {
	pub fn new(layout: ValueLayout, max_patch_id: PatchId) -> Self {
		Self {
			patches: PatchSet::new(layout),
			local_changes: PatchSet::new(layout),
			max_patch_id,
		}
	}

	pub fn layout(&self) -> ValueLayout {
		match self.patches {
			PatchSet::Intervals(_) => ValueLayout::Compressed,
			PatchSet::Sorted(_) => ValueLayout::Flat,
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

	pub fn add(&mut self, patch_id: PatchId) -> bool {
		self.patches.add(patch_id)
	}

	/// Marks the fact absent from `patch_id` on.
	pub fn del(&mut self, patch_id: PatchId) -> bool {
		self.patches.del(patch_id)
	}

	pub fn is_patch_id(&self, patch_id: PatchId) -> bool {
		self.patches.contains(patch_id)
	}

	pub fn get_patch_id_at(&self, index: u64) -> Option<PatchId> {
		self.patches.at(index, self.outer_limit())
	}

	pub fn get_size(&self) -> u64 {
		self.patches.size(self.outer_limit())
	}

	pub fn set_local_change(&mut self, patch_id: PatchId) -> bool {
		self.local_changes.mark(patch_id)
	}

	/// True when a local change marker exists at or below `patch_id`.
	pub fn is_local_change(&self, patch_id: PatchId) -> bool {
		self.local_changes.first().is_some_and(|first| first <= patch_id)
	}

	pub fn serialize(&self, encoding: Encoding) -> Vec<u8> {
		let mut out = Vec::new();
		write_segment(&self.patches.serialize(encoding), &mut out);
		write_segment(&self.local_changes.serialize(encoding), &mut out);
		out
	}

	pub fn deserialize(bytes: &[u8], context: ValueContext) -> Result<Self> {
		let mut reader = Reader::new(bytes, "addition value");
		let patches = PatchSet::deserialize(reader.read_segment()?, context.layout, context.encoding)?;
		let local_changes = PatchSet::deserialize(reader.read_segment()?, context.layout, context.encoding)?;
		Ok(Self {
			patches,
			local_changes,
			max_patch_id: context.max_patch_id,
		})
	}
}

impl Display for AdditionValue {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str("{")?;
		for i in 0..self.get_size() {
			let Some(patch_id) = self.get_patch_id_at(i) else {
				break;
			};
			if i > 0 {
				f.write_str(",")?;
			}
			write!(f, "{}", patch_id)?;
			if self.local_changes.contains(patch_id) {
				f.write_str("L")?;
			}
		}
		f.write_str("}")
	}
}
