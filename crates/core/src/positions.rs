// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Per revision rank of a deleted fact under each pattern projection.

use std::{
	collections::BTreeMap,
	fmt::{self, Display, Formatter},
};

use tessera_type::{Error, PatchId, Result};

use crate::{
	encoding::{Encoding, Reader},
	triple::Triple,
};

pub type PatchPosition = i64;

/// Projections of a triple pattern, in serialization order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Projection {
	/// `SP?`
	SubjectPredicate = 0,
	/// `S?O`
	SubjectObject = 1,
	/// `S??`
	Subject = 2,
	/// `?PO`
	PredicateObject = 3,
	/// `?P?`
	Predicate = 4,
	/// `??O`
	Object = 5,
	/// `???`
	All = 6,
}

impl Projection {
	pub const ALL: [Projection; 7] = [
		Projection::SubjectPredicate,
		Projection::SubjectObject,
		Projection::Subject,
		Projection::PredicateObject,
		Projection::Predicate,
		Projection::Object,
		Projection::All,
	];

	/// None for a fully bound pattern.
	pub fn for_pattern(pattern: &Triple) -> Option<Self> {
		match (pattern.subject.is_bound(), pattern.predicate.is_bound(), pattern.object.is_bound()) {
			(true, true, true) => None,
			(true, true, false) => Some(Projection::SubjectPredicate),
			(true, false, true) => Some(Projection::SubjectObject),
			(true, false, false) => Some(Projection::Subject),
			(false, true, true) => Some(Projection::PredicateObject),
			(false, true, false) => Some(Projection::Predicate),
			(false, false, true) => Some(Projection::Object),
			(false, false, false) => Some(Projection::All),
		}
	}

	/// `triple` reduced to the components this projection keeps bound.
	pub fn project(self, triple: &Triple) -> Triple {
		let mut projected = Triple::any();
		let (s, p, o) = match self {
			Projection::SubjectPredicate => (true, true, false),
			Projection::SubjectObject => (true, false, true),
			Projection::Subject => (true, false, false),
			Projection::PredicateObject => (false, true, true),
			Projection::Predicate => (false, true, false),
			Projection::Object => (false, false, true),
			Projection::All => (false, false, false),
		};
		if s {
			projected.subject = triple.subject;
		}
		if p {
			projected.predicate = triple.predicate;
		}
		if o {
			projected.object = triple.object;
		}
		projected
	}
}

/// Position of a deleted fact among the deletions of one revision, for each
/// [`Projection`]. Unknown positions are -1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PatchPositions([PatchPosition; 7]);

impl Default for PatchPositions {
	fn default() -> Self {
		Self([-1; 7])
	}
}

impl PatchPositions {
	pub fn new(positions: [PatchPosition; 7]) -> Self {
		Self(positions)
	}

	pub fn get(&self, projection: Projection) -> PatchPosition {
		self.0[projection as usize]
	}

	pub fn set(&mut self, projection: Projection, position: PatchPosition) {
		self.0[projection as usize] = position;
	}

	/// Position for the projection of `pattern`; 0 for a fully bound pattern.
	pub fn get_by_pattern(&self, pattern: &Triple) -> PatchPosition {
		match Projection::for_pattern(pattern) {
			Some(projection) => self.get(projection),
			None => 0,
		}
	}

	pub fn as_array(&self) -> &[PatchPosition; 7] {
		&self.0
	}

	pub fn encode(&self, encoding: Encoding, out: &mut Vec<u8>) {
		for position in self.0 {
			encoding.write_signed(position, out);
		}
	}

	pub fn decode(reader: &mut Reader<'_>, encoding: Encoding) -> Result<Self> {
		let mut positions = [0; 7];
		for position in positions.iter_mut() {
			*position = reader.read_signed(encoding)?;
		}
		Ok(Self(positions))
	}
}

impl Display for PatchPositions {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str("{")?;
		for position in self.0 {
			write!(f, " {}", position)?;
		}
		f.write_str(" }")
	}
}

/// Storage of position tuples keyed by revision.
pub trait PositionsContainer: Default + Clone {
	/// Returns whether storage changed.
	fn insert_positions(&mut self, patch_id: PatchId, positions: PatchPositions) -> bool;

	/// Returns whether storage changed.
	fn delete_positions(&mut self, patch_id: PatchId) -> bool;

	fn get_positions(&self, patch_id: PatchId) -> PatchPositions;

	fn serialize(&self, encoding: Encoding) -> Vec<u8>;

	fn deserialize(bytes: &[u8], encoding: Encoding) -> Result<Self>;
}

/// Exact revision to positions map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapPositionsContainer {
	entries: BTreeMap<PatchId, PatchPositions>,
}

impl PositionsContainer for MapPositionsContainer {
	fn insert_positions(&mut self, patch_id: PatchId, positions: PatchPositions) -> bool {
		self.entries.insert(patch_id, positions) != Some(positions)
	}

	fn delete_positions(&mut self, patch_id: PatchId) -> bool {
		self.entries.remove(&patch_id).is_some()
	}

	fn get_positions(&self, patch_id: PatchId) -> PatchPositions {
		self.entries.get(&patch_id).copied().unwrap_or_default()
	}

	fn serialize(&self, encoding: Encoding) -> Vec<u8> {
		let mut out = Vec::new();
		for (patch_id, positions) in &self.entries {
			encoding.write_unsigned(*patch_id as u64, &mut out);
			positions.encode(encoding, &mut out);
		}
		out
	}

	fn deserialize(bytes: &[u8], encoding: Encoding) -> Result<Self> {
		let mut reader = Reader::new(bytes, "positions map");
		let mut entries = BTreeMap::new();
		while !reader.is_empty() {
			let patch_id = read_patch_id(reader.read_unsigned(encoding)?)?;
			entries.insert(patch_id, PatchPositions::decode(&mut reader, encoding)?);
		}
		Ok(Self {
			entries,
		})
	}
}

/// Positions stored only where they change.
///
/// An entry holds from its revision up to the next entry, so lookups take the
/// nearest entry at or below the requested revision. Entries are expected to
/// be inserted in ascending revision order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltaPositionsContainer {
	entries: BTreeMap<PatchId, PatchPositions>,
}

impl DeltaPositionsContainer {
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

impl PositionsContainer for DeltaPositionsContainer {
	fn insert_positions(&mut self, patch_id: PatchId, positions: PatchPositions) -> bool {
		if let Some(existing) = self.entries.get_mut(&patch_id) {
			if *existing == positions {
				return false;
			}
			*existing = positions;
			return true;
		}

		let in_effect = self.entries.range(..patch_id).next_back().map(|(_, p)| *p).unwrap_or_default();
		if in_effect == positions {
			return false;
		}
		self.entries.insert(patch_id, positions);
		true
	}

	fn delete_positions(&mut self, patch_id: PatchId) -> bool {
		self.entries.remove(&patch_id).is_some()
	}

	fn get_positions(&self, patch_id: PatchId) -> PatchPositions {
		self.entries.range(..=patch_id).next_back().map(|(_, p)| *p).unwrap_or_default()
	}

	// Variable: first entry is the patch id and all seven positions, every
	// following entry is a change mask byte (bit i for projection i), the
	// patch id delta and the differences of the changed projections only.
	fn serialize(&self, encoding: Encoding) -> Vec<u8> {
		let mut out = Vec::new();
		let mut previous: Option<(PatchId, PatchPositions)> = None;

		for (patch_id, positions) in &self.entries {
			match (encoding, previous) {
				(Encoding::Variable, Some((prev_id, prev))) => {
					let mut mask = 0u8;
					for i in 0..7 {
						if positions.0[i] != prev.0[i] {
							mask |= 1 << i;
						}
					}
					out.push(mask);
					encoding.write_signed(*patch_id as i64 - prev_id as i64, &mut out);
					for i in 0..7 {
						if mask & (1 << i) != 0 {
							encoding.write_signed(positions.0[i].wrapping_sub(prev.0[i]), &mut out);
						}
					}
				}
				_ => {
					encoding.write_signed(*patch_id as i64, &mut out);
					positions.encode(encoding, &mut out);
				}
			}
			previous = Some((*patch_id, *positions));
		}
		out
	}

	fn deserialize(bytes: &[u8], encoding: Encoding) -> Result<Self> {
		let mut reader = Reader::new(bytes, "positions delta");
		let mut entries = BTreeMap::new();
		let mut previous: Option<(PatchId, PatchPositions)> = None;

		while !reader.is_empty() {
			let (patch_id, positions) = match (encoding, previous) {
				(Encoding::Variable, Some((prev_id, prev))) => {
					let mask = reader.read_u8()?;
					if mask & 0x80 != 0 {
						return Err(Error::decode("positions delta", format!("invalid change mask {:#04x}", mask)));
					}
					let delta = reader.read_signed(encoding)?;
					if delta <= 0 {
						return Err(Error::decode("positions delta", "revisions out of order"));
					}
					let patch_id = (prev_id as i64)
						.checked_add(delta)
						.ok_or_else(|| Error::decode("positions delta", "revision overflow"))?;
					let patch_id = read_patch_id(patch_id as u64)?;
					let mut positions = prev;
					for i in 0..7 {
						if mask & (1 << i) != 0 {
							let diff = reader.read_signed(encoding)?;
							positions.0[i] = prev.0[i]
								.checked_add(diff)
								.ok_or_else(|| Error::decode("positions delta", "position overflow"))?;
						}
					}
					(patch_id, positions)
				}
				_ => {
					let raw = reader.read_signed(encoding)?;
					if raw < 0 {
						return Err(Error::decode("positions delta", format!("negative revision {}", raw)));
					}
					(read_patch_id(raw as u64)?, PatchPositions::decode(&mut reader, encoding)?)
				}
			};
			entries.insert(patch_id, positions);
			previous = Some((patch_id, positions));
		}

		Ok(Self {
			entries,
		})
	}
}

fn read_patch_id(raw: u64) -> Result<PatchId> {
	PatchId::try_from(raw).map_err(|_| Error::decode("positions", format!("revision {} out of range", raw)))
}
