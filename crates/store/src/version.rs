// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Iterators producing, for every fact matching a pattern, the revisions it
//! is present in.

use std::{
	cmp::Ordering,
	collections::VecDeque,
	fmt::{self, Display, Formatter},
	mem,
};

use tessera_core::{Triple, TripleComparator, TripleOrder};
use tessera_type::{PatchId, Result};
use tracing::{debug, instrument, trace};

use crate::{
	backend::IndexStorage,
	snapshot::Snapshot,
	tree::{AdditionIterator, PatchTree},
};

/// A fact with its ascending revision list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripleVersions {
	pub triple: Triple,
	pub versions: Vec<PatchId>,
}

impl TripleVersions {
	pub fn new(triple: Triple, versions: Vec<PatchId>) -> Self {
		Self {
			triple,
			versions,
		}
	}
}

impl Display for TripleVersions {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "{} [", self.triple)?;
		for (i, version) in self.versions.iter().enumerate() {
			if i > 0 {
				f.write_str(",")?;
			}
			write!(f, "{version}")?;
		}
		f.write_str("]")
	}
}

/// Pull based stream of [`TripleVersions`].
pub trait TripleVersionsIterator {
	fn next(&mut self) -> Result<Option<TripleVersions>>;

	/// Drains the iterator, returning the number of remaining results.
	fn get_count(&mut self) -> Result<u64> {
		let mut count = 0;
		while self.next()?.is_some() {
			count += 1;
		}
		Ok(count)
	}

	/// Skips up to `n` results, returning how many were skipped.
	fn offset(&mut self, n: u64) -> Result<u64> {
		let mut skipped = 0;
		while skipped < n && self.next()?.is_some() {
			skipped += 1;
		}
		Ok(skipped)
	}

	fn drain(&mut self) -> Result<Vec<TripleVersions>> {
		let mut result = Vec::new();
		while let Some(versions) = self.next()? {
			result.push(versions);
		}
		Ok(result)
	}
}

impl<I: TripleVersionsIterator + ?Sized> TripleVersionsIterator for Box<I> {
	fn next(&mut self) -> Result<Option<TripleVersions>> {
		(**self).next()
	}
}

enum Phase {
	Snapshot,
	Additions,
	Done,
}

/// Versions of the facts matching a pattern: snapshot facts first, in
/// snapshot order, then facts introduced by patches, in the requested order.
pub struct PatchTreeVersionsIterator<'a, S: IndexStorage> {
	snapshot: Box<dyn Iterator<Item = Triple> + 'a>,
	tree: Option<&'a PatchTree<S>>,
	pattern: Triple,
	order: TripleOrder,
	first_version: PatchId,
	phase: Phase,
	additions: Option<AdditionIterator<'a, S>>,
}

impl<'a, S: IndexStorage> PatchTreeVersionsIterator<'a, S> {
	/// Without a tree every snapshot fact has the single version `first_version`.
	#[instrument(name = "store::version::new", level = "debug", skip_all, fields(pattern = %pattern, order = %order))]
	pub fn new(
		snapshot: &'a dyn Snapshot,
		tree: Option<&'a PatchTree<S>>,
		pattern: Triple,
		order: TripleOrder,
		first_version: PatchId,
	) -> Self {
		Self {
			snapshot: snapshot.search(&pattern),
			tree,
			pattern,
			order,
			first_version,
			phase: Phase::Snapshot,
			additions: None,
		}
	}

	/// `[anchor ..= max_patch_id]` without the revisions `triple` is deleted in.
	fn versions(&self, tree: &PatchTree<S>, max_patch_id: PatchId, triple: &Triple, anchor: PatchId) -> Result<Vec<PatchId>> {
		let deleted = match tree.get_deletion_value(triple)? {
			Some(deletion) => deletion.patch_ids(),
			None => Vec::new(),
		};
		Ok((anchor..=max_patch_id).filter(|version| deleted.binary_search(version).is_err()).collect())
	}

	fn next_snapshot(&mut self) -> Result<Option<TripleVersions>> {
		while let Some(triple) = self.snapshot.next() {
			let versions = match self.tree.and_then(|tree| Some((tree, tree.max_patch_id()?))) {
				Some((tree, max_patch_id)) => self.versions(tree, max_patch_id, &triple, self.first_version)?,
				None => vec![self.first_version],
			};
			if versions.is_empty() {
				continue;
			}
			return Ok(Some(TripleVersions::new(triple, versions)));
		}
		Ok(None)
	}

	fn next_addition(&mut self) -> Result<Option<TripleVersions>> {
		let Some(tree) = self.tree else {
			return Ok(None);
		};
		let Some(max_patch_id) = tree.max_patch_id() else {
			return Ok(None);
		};
		if self.additions.is_none() {
			self.additions = Some(tree.addition_iterator(&self.pattern, self.order)?);
		}

		loop {
			let Some(item) = self.additions.as_mut().and_then(Iterator::next) else {
				return Ok(None);
			};
			let (triple, addition) = item?;
			let Some(first) = addition.get_patch_id_at(0) else {
				continue;
			};
			// already reported by the snapshot phase
			if addition.is_local_change(first) {
				trace!(triple = %triple, "snapshot fact skipped");
				continue;
			}
			let versions = self.versions(tree, max_patch_id, &triple, first)?;
			if !versions.is_empty() {
				return Ok(Some(TripleVersions::new(triple, versions)));
			}
		}
	}
}

impl<S: IndexStorage> TripleVersionsIterator for PatchTreeVersionsIterator<'_, S> {
	fn next(&mut self) -> Result<Option<TripleVersions>> {
		loop {
			match self.phase {
				Phase::Snapshot => match self.next_snapshot()? {
					Some(result) => return Ok(Some(result)),
					None => self.phase = Phase::Additions,
				},
				Phase::Additions => match self.next_addition()? {
					Some(result) => return Ok(Some(result)),
					None => self.phase = Phase::Done,
				},
				Phase::Done => return Ok(None),
			}
		}
	}
}

/// Ascending union of two ascending revision lists.
pub fn union_versions(left: &[PatchId], right: &[PatchId]) -> Vec<PatchId> {
	let mut result = Vec::with_capacity(left.len() + right.len());
	let (mut i, mut j) = (0, 0);
	while i < left.len() || j < right.len() {
		let next = match (left.get(i), right.get(j)) {
			(Some(l), Some(r)) if l < r => {
				i += 1;
				*l
			}
			(Some(l), Some(r)) if r < l => {
				j += 1;
				*r
			}
			(Some(l), Some(_)) => {
				i += 1;
				j += 1;
				*l
			}
			(Some(l), None) => {
				i += 1;
				*l
			}
			(None, Some(r)) => {
				j += 1;
				*r
			}
			(None, None) => break,
		};
		if result.last() != Some(&next) {
			result.push(next);
		}
	}
	result
}

fn merge_sorted(
	comparator: &TripleComparator,
	left: Vec<TripleVersions>,
	right: Vec<TripleVersions>,
) -> Vec<TripleVersions> {
	let mut result = Vec::with_capacity(left.len() + right.len());
	let mut left = left.into_iter().peekable();
	let mut right = right.into_iter().peekable();
	loop {
		let ordering = match (left.peek(), right.peek()) {
			(Some(l), Some(r)) => comparator.compare(&l.triple, &r.triple),
			(Some(_), None) => Ordering::Less,
			(None, Some(_)) => Ordering::Greater,
			(None, None) => break,
		};
		let next = match ordering {
			Ordering::Less => left.next(),
			Ordering::Greater => right.next(),
			Ordering::Equal => match (left.next(), right.next()) {
				(Some(l), Some(r)) => Some(TripleVersions::new(l.triple, union_versions(&l.versions, &r.versions))),
				(l, r) => l.or(r),
			},
		};
		result.extend(next);
	}
	result
}

/// Combines any number of iterators into one sorted stream without
/// duplicates. Inputs are materialized on the first call to `next`.
pub struct CombinedVersionsIterator<'a> {
	comparator: TripleComparator,
	inputs: Vec<Box<dyn TripleVersionsIterator + 'a>>,
	merged: Option<VecDeque<TripleVersions>>,
}

impl<'a> CombinedVersionsIterator<'a> {
	pub fn new(comparator: TripleComparator, inputs: Vec<Box<dyn TripleVersionsIterator + 'a>>) -> Self {
		Self {
			comparator,
			inputs,
			merged: None,
		}
	}

	fn materialize(&mut self) -> Result<VecDeque<TripleVersions>> {
		let mut sorted = Vec::with_capacity(self.inputs.len());
		for mut input in mem::take(&mut self.inputs) {
			let mut results = input.drain()?;
			results.sort_by(|a, b| self.comparator.compare(&a.triple, &b.triple));
			// a single input may report one fact twice
			let mut deduplicated: Vec<TripleVersions> = Vec::with_capacity(results.len());
			for item in results {
				match deduplicated.last_mut() {
					Some(last) if last.triple == item.triple => {
						last.versions = union_versions(&last.versions, &item.versions);
					}
					_ => deduplicated.push(item),
				}
			}
			sorted.push(deduplicated);
		}

		let mut merged = Vec::new();
		for results in sorted {
			merged = merge_sorted(&self.comparator, merged, results);
		}
		debug!(results = merged.len(), "versions combined");
		Ok(merged.into())
	}
}

impl TripleVersionsIterator for CombinedVersionsIterator<'_> {
	fn next(&mut self) -> Result<Option<TripleVersions>> {
		if self.merged.is_none() {
			self.merged = Some(self.materialize()?);
		}
		Ok(self.merged.as_mut().and_then(VecDeque::pop_front))
	}
}

/// Streaming merge of two iterators that are already sorted by `comparator`.
pub struct MergedVersionsIterator<'a> {
	comparator: TripleComparator,
	left: Box<dyn TripleVersionsIterator + 'a>,
	right: Box<dyn TripleVersionsIterator + 'a>,
	left_head: Option<TripleVersions>,
	right_head: Option<TripleVersions>,
	primed: bool,
}

impl<'a> MergedVersionsIterator<'a> {
	pub fn new(
		comparator: TripleComparator,
		left: Box<dyn TripleVersionsIterator + 'a>,
		right: Box<dyn TripleVersionsIterator + 'a>,
	) -> Self {
		Self {
			comparator,
			left,
			right,
			left_head: None,
			right_head: None,
			primed: false,
		}
	}
}

impl TripleVersionsIterator for MergedVersionsIterator<'_> {
	fn next(&mut self) -> Result<Option<TripleVersions>> {
		if !self.primed {
			self.left_head = self.left.next()?;
			self.right_head = self.right.next()?;
			self.primed = true;
		}

		let ordering = match (&self.left_head, &self.right_head) {
			(Some(l), Some(r)) => self.comparator.compare(&l.triple, &r.triple),
			(Some(_), None) => Ordering::Less,
			(None, Some(_)) => Ordering::Greater,
			(None, None) => return Ok(None),
		};

		let result = match ordering {
			Ordering::Less => mem::replace(&mut self.left_head, self.left.next()?),
			Ordering::Greater => mem::replace(&mut self.right_head, self.right.next()?),
			Ordering::Equal => {
				let left = mem::replace(&mut self.left_head, self.left.next()?);
				let right = mem::replace(&mut self.right_head, self.right.next()?);
				match (left, right) {
					(Some(l), Some(r)) => {
						Some(TripleVersions::new(l.triple, union_versions(&l.versions, &r.versions)))
					}
					(l, r) => l.or(r),
				}
			}
		};
		Ok(result)
	}
}
