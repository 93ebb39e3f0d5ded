// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

#![cfg_attr(not(debug_assertions), deny(warnings))]

pub use comparator::{BytewiseComparator, KeyComparator, TripleComparator};
pub use dictionary::{BaseDictionary, DictionaryManager, DictionaryPair, PatchDictionary};
pub use dv::DvIntervalList;
pub use encoding::Encoding;
pub use interval::IntervalList;
pub use positions::{
	DeltaPositionsContainer, MapPositionsContainer, PatchPosition, PatchPositions, PositionsContainer, Projection,
};
pub use triple::{KEY_SIZE, Triple, TripleOrder};
pub use value::{
	AdditionValue, DeletionElement, DeletionValue, ReducedDeletionElement, TripleValue, ValueContext, ValueElement,
	ValueLayout,
};

mod comparator;
mod dictionary;
mod dv;
pub mod encoding;
pub mod interval;
mod positions;
mod triple;
pub mod value;
