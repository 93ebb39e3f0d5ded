// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Interval encoded history of the revisions touching a single fact.

use std::marker::PhantomData;

use tessera_type::{PatchId, Result};

use crate::{
	encoding::{Encoding, Reader, write_segment},
	interval::IntervalList,
	positions::{DeltaPositionsContainer, PatchPositions, PositionsContainer},
	value::ValueElement,
};

/// Combines the revisions a fact appears in, the subset of those that are
/// local changes, and the fact's positions per revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DvIntervalList<E: ValueElement> {
	patches: IntervalList<PatchId>,
	local_changes: IntervalList<PatchId>,
	positions: DeltaPositionsContainer,
	_element: PhantomData<E>,
}

impl<E: ValueElement> Default for DvIntervalList<E> {
	fn default() -> Self {
		Self {
			patches: IntervalList::new(),
			local_changes: IntervalList::new(),
			positions: DeltaPositionsContainer::default(),
			_element: PhantomData,
		}
	}
}

impl<E: ValueElement> DvIntervalList<E> {
	pub fn new() -> Self {
		Self::default()
	}

	/// Records `element`; true when any of the three parts changed.
	pub fn addition(&mut self, element: &E) -> bool {
		let patch_id = element.patch_id();
		let mut changed = self.patches.addition(patch_id);
		if element.is_local_change() {
			changed |= self.local_changes.addition(patch_id);
		}
		if E::HAS_POSITIONS {
			changed |= self.positions.insert_positions(patch_id, element.positions());
		}
		changed
	}

	pub fn deletion(&mut self, patch_id: PatchId) -> bool {
		let mut changed = self.patches.deletion(patch_id);
		changed |= self.local_changes.deletion(patch_id);
		changed |= self.positions.delete_positions(patch_id);
		changed
	}

	pub fn is_in(&self, patch_id: PatchId) -> bool {
		self.patches.is_in(patch_id)
	}

	pub fn is_local_change(&self, patch_id: PatchId) -> bool {
		self.local_changes.is_in(patch_id)
	}

	pub fn get_positions(&self, patch_id: PatchId) -> PatchPositions {
		self.positions.get_positions(patch_id)
	}

	pub fn get_index(&self, patch_id: PatchId, outer_limit: PatchId) -> i64 {
		self.patches.get_index(patch_id, outer_limit)
	}

	pub fn size(&self, outer_limit: PatchId) -> u64 {
		self.patches.size(outer_limit)
	}

	pub fn get_element_at(&self, index: u64, outer_limit: PatchId) -> Option<E> {
		let patch_id = self.patches.get_element_at(index, outer_limit)?;
		Some(self.element(patch_id))
	}

	/// Reconstructs the element for a revision, whether or not it is present.
	pub fn element(&self, patch_id: PatchId) -> E {
		let positions = if E::HAS_POSITIONS {
			self.positions.get_positions(patch_id)
		} else {
			PatchPositions::default()
		};
		E::from_parts(patch_id, self.is_local_change(patch_id), positions)
	}

	pub fn patches(&self) -> &IntervalList<PatchId> {
		&self.patches
	}

	/// Same history without positions.
	pub fn without_positions<R: ValueElement>(&self) -> DvIntervalList<R> {
		DvIntervalList {
			patches: self.patches.clone(),
			local_changes: self.local_changes.clone(),
			positions: DeltaPositionsContainer::default(),
			_element: PhantomData,
		}
	}

	pub fn serialize(&self, encoding: Encoding) -> Vec<u8> {
		let mut out = Vec::new();
		write_segment(&self.patches.serialize(encoding), &mut out);
		write_segment(&self.local_changes.serialize(encoding), &mut out);
		if E::HAS_POSITIONS {
			write_segment(&self.positions.serialize(encoding), &mut out);
		} else {
			write_segment(&[], &mut out);
		}
		out
	}

	pub fn deserialize(bytes: &[u8], encoding: Encoding) -> Result<Self> {
		let mut reader = Reader::new(bytes, "deletion intervals");
		let patches = IntervalList::deserialize(reader.read_segment()?, encoding, PatchId::MAX)?;
		let local_changes = IntervalList::deserialize(reader.read_segment()?, encoding, PatchId::MAX)?;
		let positions = DeltaPositionsContainer::deserialize(reader.read_segment()?, encoding)?;
		Ok(Self {
			patches,
			local_changes,
			positions,
			_element: PhantomData,
		})
	}
}
