// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use tessera_type::{Error, Result, TermId};

/// Encoded size of a triple key: three big endian `u32` terms.
pub const KEY_SIZE: usize = 12;

/// A subject-predicate-object fact. A triple with unbound (`Any`) components
/// doubles as a pattern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triple {
	pub subject: TermId,
	pub predicate: TermId,
	pub object: TermId,
}

impl Triple {
	pub fn new(subject: TermId, predicate: TermId, object: TermId) -> Self {
		Self {
			subject,
			predicate,
			object,
		}
	}

	/// The pattern matching every fact.
	pub fn any() -> Self {
		Self::default()
	}

	pub fn is_pattern(&self) -> bool {
		!(self.subject.is_bound() && self.predicate.is_bound() && self.object.is_bound())
	}

	/// True when every bound component of `pattern` equals the one of `self`.
	pub fn matches(&self, pattern: &Triple) -> bool {
		fn component(value: TermId, pattern: TermId) -> bool {
			!pattern.is_bound() || value == pattern
		}
		component(self.subject, pattern.subject)
			&& component(self.predicate, pattern.predicate)
			&& component(self.object, pattern.object)
	}

	pub fn encode_key(&self) -> [u8; KEY_SIZE] {
		let mut key = [0u8; KEY_SIZE];
		key[0..4].copy_from_slice(&self.subject.to_raw().to_be_bytes());
		key[4..8].copy_from_slice(&self.predicate.to_raw().to_be_bytes());
		key[8..12].copy_from_slice(&self.object.to_raw().to_be_bytes());
		key
	}

	pub fn decode_key(key: &[u8]) -> Result<Self> {
		if key.len() != KEY_SIZE {
			return Err(Error::decode("triple key", format!("expected {} bytes, found {}", KEY_SIZE, key.len())));
		}
		let term = |at: usize| TermId::from_raw(u32::from_be_bytes([key[at], key[at + 1], key[at + 2], key[at + 3]]));
		Ok(Self::new(term(0), term(4), term(8)))
	}
}

impl Display for Triple {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "{} {} {}", self.subject, self.predicate, self.object)
	}
}

/// Component order of one physical index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum TripleOrder {
	Spo = 0,
	Sop = 1,
	Pso = 2,
	Pos = 3,
	Osp = 4,
	Ops = 5,
}

impl TripleOrder {
	pub const ALL: [TripleOrder; 6] =
		[TripleOrder::Spo, TripleOrder::Sop, TripleOrder::Pso, TripleOrder::Pos, TripleOrder::Osp, TripleOrder::Ops];

	/// Components of `triple` in primary, secondary, tertiary order.
	pub fn components(self, triple: &Triple) -> [TermId; 3] {
		let Triple {
			subject: s,
			predicate: p,
			object: o,
		} = *triple;
		match self {
			TripleOrder::Spo => [s, p, o],
			TripleOrder::Sop => [s, o, p],
			TripleOrder::Pso => [p, s, o],
			TripleOrder::Pos => [p, o, s],
			TripleOrder::Osp => [o, s, p],
			TripleOrder::Ops => [o, p, s],
		}
	}

	/// The index whose bound prefix covers the bound components of `pattern`.
	pub fn for_pattern(pattern: &Triple) -> Self {
		match (pattern.subject.is_bound(), pattern.predicate.is_bound(), pattern.object.is_bound()) {
			(true, false, true) => TripleOrder::Sop,
			(false, true, true) => TripleOrder::Pos,
			(false, true, false) => TripleOrder::Pso,
			(false, false, true) => TripleOrder::Osp,
			_ => TripleOrder::Spo,
		}
	}

	pub fn name(self) -> &'static str {
		match self {
			TripleOrder::Spo => "spo",
			TripleOrder::Sop => "sop",
			TripleOrder::Pso => "pso",
			TripleOrder::Pos => "pos",
			TripleOrder::Osp => "osp",
			TripleOrder::Ops => "ops",
		}
	}

	pub fn parse(name: &str) -> Option<Self> {
		TripleOrder::ALL.into_iter().find(|order| order.name().eq_ignore_ascii_case(name))
	}
}

impl Display for TripleOrder {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}
