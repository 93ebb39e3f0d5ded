// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use tessera_type::{Error, PatchId, Result};

use crate::{
	encoding::{Encoding, Reader, write_segment},
	value::{AdditionValue, DeletionValue, ValueContext},
};

const HAS_ADDITION: u8 = 0b01;
const HAS_DELETION: u8 = 0b10;

/// Full history of one fact as kept by the primary index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TripleValue {
	pub addition: Option<AdditionValue>,
	pub deletion: Option<DeletionValue>,
}

impl TripleValue {
	pub fn is_empty(&self) -> bool {
		self.addition.is_none() && self.deletion.is_none()
	}

	pub fn set_max_patch_id(&mut self, max_patch_id: PatchId) {
		if let Some(addition) = &mut self.addition {
			addition.set_max_patch_id(max_patch_id);
		}
		if let Some(deletion) = &mut self.deletion {
			deletion.set_max_patch_id(max_patch_id);
		}
	}

	pub fn serialize(&self, encoding: Encoding) -> Vec<u8> {
		let mut flags = 0;
		if self.addition.is_some() {
			flags |= HAS_ADDITION;
		}
		if self.deletion.is_some() {
			flags |= HAS_DELETION;
		}

		let mut out = vec![flags];
		if let Some(addition) = &self.addition {
			write_segment(&addition.serialize(encoding), &mut out);
		}
		if let Some(deletion) = &self.deletion {
			write_segment(&deletion.serialize(encoding), &mut out);
		}
		out
	}

	pub fn deserialize(bytes: &[u8], context: ValueContext) -> Result<Self> {
		let mut reader = Reader::new(bytes, "triple value");
		let flags = reader.read_u8()?;
		if flags & !(HAS_ADDITION | HAS_DELETION) != 0 {
			return Err(Error::decode("triple value", format!("invalid flags {:#04x}", flags)));
		}

		let addition = if flags & HAS_ADDITION != 0 {
			Some(AdditionValue::deserialize(reader.read_segment()?, context)?)
		} else {
			None
		};
		let deletion = if flags & HAS_DELETION != 0 {
			Some(DeletionValue::deserialize(reader.read_segment()?, context)?)
		} else {
			None
		};

		if !reader.is_empty() {
			return Err(Error::decode("triple value", format!("{} trailing bytes", reader.remaining())));
		}
		Ok(Self {
			addition,
			deletion,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		positions::PatchPositions,
		value::{DeletionElement, ValueLayout},
	};

	#[test]
	fn test_presence_flags() {
		let context = ValueContext::new(ValueLayout::Compressed, Encoding::Variable, 9);

		let empty = TripleValue::default();
		assert!(empty.is_empty());
		assert_eq!(empty.serialize(Encoding::Variable), vec![0]);
		assert_eq!(TripleValue::deserialize(&[0], context).unwrap(), empty);

		let mut addition = AdditionValue::new(ValueLayout::Compressed, 9);
		addition.add(4);
		let only_addition = TripleValue {
			addition: Some(addition),
			deletion: None,
		};
		let bytes = only_addition.serialize(Encoding::Variable);
		assert_eq!(bytes[0], HAS_ADDITION);
		let restored = TripleValue::deserialize(&bytes, context).unwrap();
		assert_eq!(restored.addition.unwrap().to_string(), "{4,5,6,7,8,9}");
		assert!(restored.deletion.is_none());
	}

	#[test]
	fn test_both_values() {
		for layout in [ValueLayout::Compressed, ValueLayout::Flat] {
			let context = ValueContext::new(layout, Encoding::Fixed, 5);
			let mut addition = AdditionValue::new(layout, 5);
			addition.add(1);
			addition.del(3);
			let mut deletion = DeletionValue::new(layout, 5);
			deletion.add(DeletionElement::with_positions(3, PatchPositions::new([0, 1, 2, 3, 4, 5, 6])));

			let value = TripleValue {
				addition: Some(addition),
				deletion: Some(deletion),
			};
			let bytes = value.serialize(Encoding::Fixed);
			let restored = TripleValue::deserialize(&bytes, context).unwrap();
			assert_eq!(restored.addition.as_ref().map(|a| a.to_string()), value.addition.as_ref().map(|a| a.to_string()));
			assert_eq!(restored.deletion.as_ref().map(|d| d.to_string()), value.deletion.as_ref().map(|d| d.to_string()));
		}
	}

	#[test]
	fn test_rejects_garbage() {
		let context = ValueContext::new(ValueLayout::Flat, Encoding::Variable, 5);
		assert!(TripleValue::deserialize(&[], context).is_err());
		assert!(TripleValue::deserialize(&[0x04], context).is_err());
		assert!(TripleValue::deserialize(&[0, 1], context).is_err());
		assert!(TripleValue::deserialize(&[HAS_DELETION, 9, 0, 0, 0], context).is_err());
	}
}
