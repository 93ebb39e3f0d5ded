// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::fmt::{self, Debug, Display, Formatter};

use tessera_type::PatchId;

use crate::positions::PatchPositions;

/// Capabilities of one entry in a deletion record.
pub trait ValueElement: Clone + PartialEq + Debug {
	/// Whether the element carries positions worth persisting.
	const HAS_POSITIONS: bool;

	fn from_parts(patch_id: PatchId, local_change: bool, positions: PatchPositions) -> Self;

	fn patch_id(&self) -> PatchId;

	fn is_local_change(&self) -> bool;

	/// Default positions for elements without positions.
	fn positions(&self) -> PatchPositions;
}

/// One deletion of a fact: the revision, whether it reverts an earlier
/// addition, and the fact's positions among that revision's deletions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeletionElement {
	pub patch_id: PatchId,
	pub local_change: bool,
	pub positions: PatchPositions,
}

impl DeletionElement {
	pub fn new(patch_id: PatchId) -> Self {
		Self {
			patch_id,
			local_change: false,
			positions: PatchPositions::default(),
		}
	}

	pub fn with_positions(patch_id: PatchId, positions: PatchPositions) -> Self {
		Self {
			patch_id,
			local_change: false,
			positions,
		}
	}

	pub fn local(mut self, local_change: bool) -> Self {
		self.local_change = local_change;
		self
	}

	pub fn to_reduced(&self) -> ReducedDeletionElement {
		ReducedDeletionElement {
			patch_id: self.patch_id,
			local_change: self.local_change,
		}
	}
}

impl ValueElement for DeletionElement {
	const HAS_POSITIONS: bool = true;

	fn from_parts(patch_id: PatchId, local_change: bool, positions: PatchPositions) -> Self {
		Self {
			patch_id,
			local_change,
			positions,
		}
	}

	fn patch_id(&self) -> PatchId {
		self.patch_id
	}

	fn is_local_change(&self) -> bool {
		self.local_change
	}

	fn positions(&self) -> PatchPositions {
		self.positions
	}
}

impl Display for DeletionElement {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "{}{}:{}", self.patch_id, if self.local_change { "L" } else { "" }, self.positions)
	}
}

/// A deletion element without positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReducedDeletionElement {
	pub patch_id: PatchId,
	pub local_change: bool,
}

impl ReducedDeletionElement {
	pub fn new(patch_id: PatchId, local_change: bool) -> Self {
		Self {
			patch_id,
			local_change,
		}
	}
}

impl ValueElement for ReducedDeletionElement {
	const HAS_POSITIONS: bool = false;

	fn from_parts(patch_id: PatchId, local_change: bool, _positions: PatchPositions) -> Self {
		Self {
			patch_id,
			local_change,
		}
	}

	fn patch_id(&self) -> PatchId {
		self.patch_id
	}

	fn is_local_change(&self) -> bool {
		self.local_change
	}

	fn positions(&self) -> PatchPositions {
		PatchPositions::default()
	}
}

impl Display for ReducedDeletionElement {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "{}{}", self.patch_id, if self.local_change { "L" } else { "" })
	}
}
