// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Append-only lists of scalar statistics keyed by `(prefix, id)`.

use std::sync::Arc;

use tessera_core::BytewiseComparator;
use tessera_type::{Error, Result};
use tracing::instrument;

use crate::backend::{IndexId, IndexStorage};

const WORD: usize = 8;

#[derive(Clone)]
pub struct MetadataStore<S: IndexStorage> {
	storage: S,
}

impl<S: IndexStorage> MetadataStore<S> {
	pub fn new(storage: S) -> Result<Self> {
		storage.ensure_index(IndexId::Metadata, Arc::new(BytewiseComparator))?;
		Ok(Self {
			storage,
		})
	}

	fn key(prefix: &str, id: u64) -> Vec<u8> {
		format!("{}{}", prefix, id).into_bytes()
	}

	fn words(&self, key: &[u8]) -> Result<Vec<[u8; WORD]>> {
		let Some(bytes) = self.storage.get(IndexId::Metadata, key)? else {
			return Ok(Vec::new());
		};
		if bytes.len() % WORD != 0 {
			return Err(Error::decode("metadata", format!("{} bytes is not a multiple of {}", bytes.len(), WORD)));
		}
		Ok(bytes.chunks_exact(WORD).map(|chunk| <[u8; WORD]>::try_from(chunk).unwrap_or_default()).collect())
	}

	fn push(&self, key: &[u8], word: [u8; WORD]) -> Result<Vec<[u8; WORD]>> {
		let mut words = self.words(key)?;
		words.push(word);
		let bytes: Vec<u8> = words.iter().flatten().copied().collect();
		self.storage.set(IndexId::Metadata, &[(key, bytes.as_slice())])?;
		Ok(words)
	}

	/// Appends `value` and returns the updated list.
	#[instrument(name = "store::metadata::store_u64", level = "trace", skip(self))]
	pub fn store_u64(&self, prefix: &str, id: u64, value: u64) -> Result<Vec<u64>> {
		let words = self.push(&Self::key(prefix, id), value.to_le_bytes())?;
		Ok(words.into_iter().map(u64::from_le_bytes).collect())
	}

	pub fn get_u64(&self, prefix: &str, id: u64) -> Result<Vec<u64>> {
		Ok(self.words(&Self::key(prefix, id))?.into_iter().map(u64::from_le_bytes).collect())
	}

	#[instrument(name = "store::metadata::store_f64", level = "trace", skip(self))]
	pub fn store_f64(&self, prefix: &str, id: u64, value: f64) -> Result<Vec<f64>> {
		let words = self.push(&Self::key(prefix, id), value.to_le_bytes())?;
		Ok(words.into_iter().map(f64::from_le_bytes).collect())
	}

	pub fn get_f64(&self, prefix: &str, id: u64) -> Result<Vec<f64>> {
		Ok(self.words(&Self::key(prefix, id))?.into_iter().map(f64::from_le_bytes).collect())
	}
}
