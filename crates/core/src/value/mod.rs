// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Per fact history records stored in the patch indexes.

mod addition;
mod deletion;
mod element;
mod triple;

pub use addition::AdditionValue;
pub use deletion::DeletionValue;
pub use element::{DeletionElement, ReducedDeletionElement, ValueElement};
use serde::{Deserialize, Serialize};
use tessera_type::PatchId;
pub use triple::TripleValue;

use crate::encoding::Encoding;

/// Physical representation of value records, fixed for the lifetime of a
/// store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueLayout {
	/// Interval lists, open intervals carry a state forward for free.
	#[default]
	Compressed,
	/// Sorted vectors with one entry per revision.
	Flat,
}

/// Everything needed to decode and query a value record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueContext {
	pub layout: ValueLayout,
	pub encoding: Encoding,
	/// Latest known revision; open intervals are capped just above it.
	pub max_patch_id: PatchId,
}

impl ValueContext {
	pub fn new(layout: ValueLayout, encoding: Encoding, max_patch_id: PatchId) -> Self {
		Self {
			layout,
			encoding,
			max_patch_id,
		}
	}

	pub fn outer_limit(&self) -> PatchId {
		self.max_patch_id.saturating_add(1)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_config_names() {
		assert_eq!(serde_json::to_string(&ValueLayout::Flat).unwrap(), "\"flat\"");
		assert_eq!(serde_json::from_str::<ValueLayout>("\"compressed\"").unwrap(), ValueLayout::Compressed);
		assert_eq!(serde_json::from_str::<Encoding>("\"fixed\"").unwrap(), Encoding::Fixed);
	}

	#[test]
	fn test_outer_limit_saturates() {
		let context = ValueContext::new(ValueLayout::Flat, Encoding::Variable, PatchId::MAX);
		assert_eq!(context.outer_limit(), PatchId::MAX);
		assert_eq!(ValueContext::new(ValueLayout::Flat, Encoding::Variable, 4).outer_limit(), 5);
	}
}
