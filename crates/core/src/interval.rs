// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Compressed ordered integer sets.
//!
//! An [`IntervalList`] stores a set of integers as maximal half-open
//! `[start, end)` ranges keyed by their start. An interval ending at the
//! list's `max` is open: it stands for "from `start` onwards" and is capped
//! by an `outer_limit` supplied at query time.

use std::{
	collections::BTreeMap,
	fmt::{self, Debug, Display, Formatter},
};

use tessera_type::{Error, Result};

use crate::encoding::{Encoding, Reader};

/// Integer types usable as interval bounds.
pub trait IntervalValue: Copy + Ord + Debug + Display {
	const MAX: Self;

	fn to_u64(self) -> u64;

	fn from_u64(value: u64) -> Option<Self>;
}

impl IntervalValue for u32 {
	const MAX: Self = u32::MAX;

	fn to_u64(self) -> u64 {
		self as u64
	}

	fn from_u64(value: u64) -> Option<Self> {
		u32::try_from(value).ok()
	}
}

impl IntervalValue for u64 {
	const MAX: Self = u64::MAX;

	fn to_u64(self) -> u64 {
		self
	}

	fn from_u64(value: u64) -> Option<Self> {
		Some(value)
	}
}

#[derive(Clone, PartialEq, Eq)]
pub struct IntervalList<T: IntervalValue = u32> {
	intervals: BTreeMap<T, T>,
	max: T,
}

impl<T: IntervalValue> Default for IntervalList<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T: IntervalValue> IntervalList<T> {
	pub fn new() -> Self {
		Self::with_max(T::MAX)
	}

	/// Creates a list whose open intervals end at `max`.
	pub fn with_max(max: T) -> Self {
		Self {
			intervals: BTreeMap::new(),
			max,
		}
	}

	pub fn max(&self) -> T {
		self.max
	}

	pub fn is_empty(&self) -> bool {
		self.intervals.is_empty()
	}

	/// Number of stored intervals, not the number of covered values.
	pub fn len(&self) -> usize {
		self.intervals.len()
	}

	pub fn intervals(&self) -> impl Iterator<Item = (T, T)> + '_ {
		self.intervals.iter().map(|(start, end)| (*start, *end))
	}

	fn covering(&self, value: T) -> Option<(T, T)> {
		self.intervals
			.range(..=value)
			.next_back()
			.map(|(start, end)| (*start, *end))
			.filter(|(_, end)| value < *end)
	}

	/// Marks `value` present until the next recorded absence.
	///
	/// Opens `[value, max)` when nothing follows, otherwise pulls the start
	/// of the following interval down to `value`, merging with a preceding
	/// interval that ends exactly at `value`.
	pub fn addition(&mut self, value: T) -> bool {
		if value >= self.max {
			return false;
		}

		let prev = self.intervals.range(..value).next_back().map(|(s, e)| (*s, *e));
		if let Some((_, prev_end)) = prev {
			if prev_end > value {
				return false;
			}
		}

		let next = self.intervals.range(value..).next().map(|(s, e)| (*s, *e));
		match next {
			Some((next_start, _)) if next_start == value => false,
			Some((next_start, next_end)) => {
				self.intervals.remove(&next_start);
				match prev {
					Some((prev_start, prev_end)) if prev_end == value => {
						self.intervals.insert(prev_start, next_end);
					}
					_ => {
						self.intervals.insert(value, next_end);
					}
				}
				true
			}
			None => {
				match prev {
					Some((prev_start, prev_end)) if prev_end == value => {
						self.intervals.insert(prev_start, self.max);
					}
					_ => {
						self.intervals.insert(value, self.max);
					}
				}
				true
			}
		}
	}

	/// Inserts `value` as a single element if it is not covered yet.
	pub fn lone_addition(&mut self, value: T) -> bool {
		if value >= self.max || self.covering(value).is_some() {
			return false;
		}
		let Some(end) = T::from_u64(value.to_u64() + 1) else {
			return false;
		};

		let mut start = value;
		let mut end = end;

		if let Some((prev_start, prev_end)) = self.intervals.range(..value).next_back().map(|(s, e)| (*s, *e)) {
			if prev_end == value {
				self.intervals.remove(&prev_start);
				start = prev_start;
			}
		}
		if let Some(next_end) = self.intervals.get(&end).copied() {
			self.intervals.remove(&end);
			end = next_end;
		}

		self.intervals.insert(start, end);
		true
	}

	/// Removes `value` and everything after it within its interval.
	pub fn deletion(&mut self, value: T) -> bool {
		match self.covering(value) {
			Some((start, _)) if start == value => {
				self.intervals.remove(&start);
				true
			}
			Some((start, _)) => {
				self.intervals.insert(start, value);
				true
			}
			None => false,
		}
	}

	pub fn is_in(&self, value: T) -> bool {
		self.covering(value).is_some()
	}

	/// The interval covering `value`, or `(max, max)` when absent.
	pub fn get_interval(&self, value: T) -> (T, T) {
		self.covering(value).unwrap_or((self.max, self.max))
	}

	/// Number of covered values below `outer_limit`.
	pub fn size(&self, outer_limit: T) -> u64 {
		self.intervals
			.iter()
			.take_while(|(start, _)| **start < outer_limit)
			.map(|(start, end)| (*end).min(outer_limit).to_u64() - start.to_u64())
			.sum()
	}

	/// Rank of `value` in the expanded ascending sequence, -1 when absent.
	pub fn get_index(&self, value: T, outer_limit: T) -> i64 {
		if value >= outer_limit {
			return -1;
		}
		let Some((start, _)) = self.covering(value) else {
			return -1;
		};

		let before: u64 = self
			.intervals
			.range(..start)
			.map(|(s, e)| (*e).min(outer_limit).to_u64() - s.to_u64())
			.sum();
		(before + value.to_u64() - start.to_u64()) as i64
	}

	/// Value at rank `index` in the expanded ascending sequence.
	pub fn get_element_at(&self, index: u64, outer_limit: T) -> Option<T> {
		let mut remaining = index;
		for (start, end) in self.intervals.iter() {
			if *start >= outer_limit {
				break;
			}
			let len = (*end).min(outer_limit).to_u64() - start.to_u64();
			if remaining < len {
				return T::from_u64(start.to_u64() + remaining);
			}
			remaining -= len;
		}
		None
	}

	pub fn serialize(&self, encoding: Encoding) -> Vec<u8> {
		let mut out = Vec::new();
		for (start, end) in self.intervals.iter() {
			encoding.write_unsigned(start.to_u64(), &mut out);
			encoding.write_unsigned(end.to_u64(), &mut out);
		}
		out
	}

	pub fn deserialize(bytes: &[u8], encoding: Encoding, max: T) -> Result<Self> {
		let mut reader = Reader::new(bytes, "interval list");
		let mut list = Self::with_max(max);
		let mut last_end: Option<T> = None;

		while !reader.is_empty() {
			let start = read_bound(&mut reader, encoding)?;
			let end = read_bound(&mut reader, encoding)?;
			if start >= end {
				return Err(Error::decode("interval list", format!("empty interval [{}, {})", start, end)));
			}
			if let Some(last_end) = last_end {
				if start <= last_end {
					return Err(Error::decode(
						"interval list",
						format!("interval [{}, {}) overlaps or touches its predecessor", start, end),
					));
				}
			}
			last_end = Some(end);
			list.intervals.insert(start, end);
		}

		Ok(list)
	}
}

fn read_bound<T: IntervalValue>(reader: &mut Reader<'_>, encoding: Encoding) -> Result<T> {
	let raw = reader.read_unsigned(encoding)?;
	T::from_u64(raw).ok_or_else(|| Error::decode("interval list", format!("bound {} out of range", raw)))
}

impl<T: IntervalValue> Display for IntervalList<T> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		if self.intervals.is_empty() {
			return f.write_str("[]");
		}
		for (i, (start, end)) in self.intervals.iter().enumerate() {
			if i > 0 {
				f.write_str(" ")?;
			}
			if *end == self.max {
				write!(f, "[{},MAX)", start)?;
			} else {
				write!(f, "[{},{})", start, end)?;
			}
		}
		Ok(())
	}
}

impl<T: IntervalValue> Debug for IntervalList<T> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		Display::fmt(self, f)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn assert_members(list: &IntervalList<u32>, present: &[u32], absent: &[u32]) {
		for v in present {
			assert!(list.is_in(*v), "{} should be in {}", v, list);
		}
		for v in absent {
			assert!(!list.is_in(*v), "{} should not be in {}", v, list);
		}
	}

	fn assert_maximal(list: &IntervalList<u32>) {
		let intervals: Vec<_> = list.intervals().collect();
		for pair in intervals.windows(2) {
			assert!(pair[0].1 < pair[1].0, "intervals {:?} and {:?} are not maximal", pair[0], pair[1]);
		}
	}

	#[test]
	fn test_simple_addition() {
		let mut list = IntervalList::with_max(2u32);
		assert!(list.addition(1));
		assert_members(&list, &[1], &[0]);
		assert_eq!(list.to_string(), "[1,MAX)");
	}

	#[test]
	fn test_addition_then_deletion() {
		let mut list = IntervalList::with_max(3u32);
		list.addition(1);
		assert!(list.deletion(2));
		assert_members(&list, &[1], &[0, 2, 3]);
	}

	#[test]
	fn test_reinsertion_merges() {
		let mut list = IntervalList::with_max(3u32);
		list.addition(1);
		list.deletion(2);
		assert!(list.addition(2));
		assert_members(&list, &[1, 2], &[0]);
		assert_eq!(list.len(), 1);
	}

	#[test]
	fn test_multiple_intervals() {
		let mut list = IntervalList::with_max(5u32);
		list.addition(1);
		list.deletion(2);
		list.addition(3);
		assert_members(&list, &[1, 3, 4], &[0, 2]);

		list.deletion(4);
		assert_members(&list, &[1, 3], &[0, 2, 4]);
		assert_eq!(list.to_string(), "[1,2) [3,4)");
	}

	#[test]
	fn test_revert_deletion_merges_neighbours() {
		let mut list = IntervalList::with_max(5u32);
		list.addition(1);
		list.deletion(2);
		list.addition(3);
		list.deletion(4);
		list.addition(2);
		assert_members(&list, &[1, 2, 3], &[0, 4]);
		assert_eq!(list.to_string(), "[1,4)");
	}

	#[test]
	fn test_inner_addition_extends_next_interval() {
		let mut list = IntervalList::with_max(6u32);
		list.addition(1);
		list.deletion(2);
		list.addition(4);
		list.deletion(5);
		list.addition(3);
		assert_members(&list, &[1, 3, 4], &[0, 2, 5]);
		assert_maximal(&list);
	}

	#[test]
	fn test_double_addition_is_unchanged() {
		let mut list = IntervalList::with_max(10u32);
		list.addition(1);
		list.deletion(2);
		assert!(list.addition(4));
		assert!(!list.addition(4));
		assert!(!list.addition(6));
		assert_members(&list, &[1, 4, 5, 6], &[0, 2]);
	}

	#[test]
	fn test_delete_and_readd_same_value() {
		let mut list = IntervalList::with_max(10u32);
		list.addition(1);
		list.deletion(2);
		list.addition(4);
		assert!(list.deletion(4));
		assert!(list.addition(4));
		assert_members(&list, &[1, 4, 5, 6], &[0, 2]);
	}

	#[test]
	fn test_interval_deletion() {
		let mut list = IntervalList::with_max(5u32);
		list.addition(1);
		list.deletion(2);
		list.addition(3);
		list.deletion(4);
		assert!(list.deletion(3));
		assert_members(&list, &[1], &[0, 2, 3, 4]);
	}

	#[test]
	fn test_interval_modification() {
		let mut list = IntervalList::with_max(8u32);
		list.addition(1);
		list.deletion(2);
		list.addition(3);
		list.deletion(5);
		list.addition(6);
		list.deletion(7);
		list.deletion(4);
		assert_members(&list, &[1, 3, 6], &[0, 2, 4, 7]);
	}

	#[test]
	fn test_empty_deletion() {
		let mut list = IntervalList::with_max(3u32);
		assert!(!list.deletion(2));
		assert_members(&list, &[], &[0, 1, 2, 3]);
	}

	#[test]
	fn test_addition_at_max_is_ignored() {
		let mut list = IntervalList::with_max(3u32);
		assert!(!list.addition(3));
		assert!(list.is_empty());
	}

	#[test]
	fn test_lone_addition() {
		let mut list = IntervalList::<u32>::new();
		assert!(list.lone_addition(3));
		assert!(list.lone_addition(5));
		assert_members(&list, &[3, 5], &[2, 4, 6]);
		assert_eq!(list.to_string(), "[3,4) [5,6)");

		assert!(list.lone_addition(4));
		assert_eq!(list.to_string(), "[3,6)");
		assert!(!list.lone_addition(4));
		assert_maximal(&list);
	}

	#[test]
	fn test_lone_addition_inside_open_interval() {
		let mut list = IntervalList::<u32>::new();
		list.addition(2);
		assert!(!list.lone_addition(10));
		assert_eq!(list.to_string(), "[2,MAX)");
	}

	#[test]
	fn test_get_interval() {
		let mut list = IntervalList::<u32>::new();
		list.addition(1);
		list.deletion(3);
		list.addition(5);

		assert_eq!(list.get_interval(1), (1, 3));
		assert_eq!(list.get_interval(2), (1, 3));
		assert_eq!(list.get_interval(3), (u32::MAX, u32::MAX));
		assert_eq!(list.get_interval(7), (5, u32::MAX));
		assert_eq!(list.get_interval(0), (u32::MAX, u32::MAX));
	}

	#[test]
	fn test_size_is_capped_by_outer_limit() {
		let mut list = IntervalList::<u32>::new();
		list.addition(1);
		list.deletion(3);
		list.addition(5);

		assert_eq!(list.size(8), 2 + 3);
		assert_eq!(list.size(2), 1);
		assert_eq!(list.size(0), 0);
	}

	#[test]
	fn test_index_and_element_are_inverse() {
		let mut list = IntervalList::<u32>::new();
		list.addition(1);
		list.deletion(3);
		list.addition(5);
		list.deletion(6);
		list.addition(9);

		let limit = 12;
		let present: Vec<u32> = (0..limit).filter(|v| list.is_in(*v)).collect();
		assert_eq!(present, vec![1, 2, 5, 9, 10, 11]);

		for (rank, value) in present.iter().enumerate() {
			assert_eq!(list.get_index(*value, limit), rank as i64);
			assert_eq!(list.get_element_at(rank as u64, limit), Some(*value));
		}
		assert_eq!(list.get_index(4, limit), -1);
		assert_eq!(list.get_index(12, limit), -1);
		assert_eq!(list.get_element_at(present.len() as u64, limit), None);
	}

	#[test]
	fn test_serialization_keeps_membership() {
		let mut list = IntervalList::with_max(7u32);
		list.addition(1);
		list.deletion(2);
		list.addition(4);
		list.deletion(6);

		for encoding in [Encoding::Fixed, Encoding::Variable] {
			let bytes = list.serialize(encoding);
			let restored = IntervalList::deserialize(&bytes, encoding, 7u32).unwrap();
			assert_members(&restored, &[1, 4, 5], &[0, 2, 3, 6]);
			assert_eq!(restored, list);
		}
	}

	#[test]
	fn test_empty_list_serializes_to_nothing() {
		let list = IntervalList::<u32>::new();
		assert!(list.serialize(Encoding::Variable).is_empty());
		assert!(list.serialize(Encoding::Fixed).is_empty());
		assert!(IntervalList::<u32>::deserialize(&[], Encoding::Variable, u32::MAX).unwrap().is_empty());
	}

	#[test]
	fn test_truncated_input_fails() {
		let mut list = IntervalList::<u32>::new();
		list.addition(300);
		let mut bytes = list.serialize(Encoding::Variable);
		bytes.pop();
		assert!(IntervalList::<u32>::deserialize(&bytes, Encoding::Variable, u32::MAX).is_err());

		let bytes = list.serialize(Encoding::Fixed);
		assert!(IntervalList::<u32>::deserialize(&bytes[..12], Encoding::Fixed, u32::MAX).is_err());
	}

	#[test]
	fn test_unordered_input_fails() {
		let mut bytes = Vec::new();
		for bound in [5u64, 7, 1, 2] {
			Encoding::Variable.write_unsigned(bound, &mut bytes);
		}
		let err = IntervalList::<u32>::deserialize(&bytes, Encoding::Variable, u32::MAX).unwrap_err();
		assert!(err.is_decode());
	}

	#[test]
	fn test_random_walk_matches_model() {
		let mut list = IntervalList::with_max(40u32);
		let mut model = [false; 40];
		let mut state: u32 = 17;
		for _ in 0..500 {
			state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
			let value = ((state >> 8) % 40) as usize;
			if (state >> 4) & 1 == 0 {
				list.addition(value as u32);
				let mut i = value;
				while i < 40 && !model[i] {
					model[i] = true;
					i += 1;
				}
			} else {
				list.deletion(value as u32);
				let mut i = value;
				while i < 40 && model[i] {
					model[i] = false;
					i += 1;
				}
			}

			for (v, present) in model.iter().enumerate() {
				assert_eq!(list.is_in(v as u32), *present, "membership of {} in {}", v, list);
			}
			assert_maximal(&list);

			let restored = IntervalList::deserialize(&list.serialize(Encoding::Variable), Encoding::Variable, 40u32)
				.unwrap();
			assert_eq!(restored, list);
		}
	}
}
