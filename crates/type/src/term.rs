// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

const PATCH_BIT: u32 = 0x8000_0000;

/// A triple component identifier.
///
/// Base ids index the immutable snapshot dictionary, patch ids the mutable
/// patch dictionary. Ids of the two dictionaries are not comparable as
/// integers, ordering always goes through a dictionary pair.
///
/// On disk a term is a `u32`: `Any` is 0, `Last` is `u32::MAX`, and patch ids
/// carry the most significant bit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TermId {
	/// Unbound pattern component, ranks before every id.
	#[default]
	Any,
	Base(u32),
	Patch(u32),
	/// Upper sentinel, ranks after every id.
	Last,
}

impl TermId {
	pub fn from_raw(raw: u32) -> Self {
		match raw {
			0 => TermId::Any,
			u32::MAX => TermId::Last,
			raw if raw & PATCH_BIT != 0 => TermId::Patch(raw & !PATCH_BIT),
			raw => TermId::Base(raw),
		}
	}

	pub fn to_raw(self) -> u32 {
		match self {
			TermId::Any => 0,
			TermId::Base(id) => id,
			TermId::Patch(id) => PATCH_BIT | id,
			TermId::Last => u32::MAX,
		}
	}

	pub fn is_bound(self) -> bool {
		!matches!(self, TermId::Any)
	}

	pub fn is_base(self) -> bool {
		matches!(self, TermId::Base(_))
	}
}

impl Display for TermId {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			TermId::Any => f.write_str("?"),
			TermId::Base(id) => write!(f, "{}", id),
			TermId::Patch(id) => write!(f, "p{}", id),
			TermId::Last => f.write_str("MAX"),
		}
	}
}
