// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{ops::Bound, sync::Arc};

use parking_lot::Mutex;
use rusqlite::{Connection, params_from_iter, types::Value};
use tessera_type::{Error, Result};

use crate::backend::{IndexId, RawEntry};

/// Reads up to `limit` entries from `start` on, in collation order.
pub(super) fn fetch_batch(
	conn: &Mutex<Connection>,
	index: IndexId,
	start: Bound<&[u8]>,
	limit: usize,
) -> Result<Vec<RawEntry>> {
	let (condition, start_key) = match start {
		Bound::Included(key) => (" WHERE key >= ?1", Some(key)),
		Bound::Excluded(key) => (" WHERE key > ?1", Some(key)),
		Bound::Unbounded => ("", None),
	};
	let limit_param = if start_key.is_some() { "?2" } else { "?1" };
	let query = format!("SELECT key, value FROM \"{}\"{} ORDER BY key LIMIT {}", index.name(), condition, limit_param);

	let mut params: Vec<Value> = start_key.iter().map(|key| Value::Text(hex::encode(key))).collect();
	params.push(Value::Integer(limit as i64));

	let failed = |err: &dyn std::fmt::Display| Error::storage("range", index, start_key.unwrap_or_default(), err);

	let conn = conn.lock();
	let mut stmt = conn.prepare(&query).map_err(|err| failed(&err))?;
	let rows = stmt
		.query_map(params_from_iter(params.iter()), |row| Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?)))
		.map_err(|err| failed(&err))?;

	let mut entries = Vec::new();
	for row in rows {
		let (key, value) = row.map_err(|err| failed(&err))?;
		let key = hex::decode(&key).map_err(|err| failed(&err))?;
		entries.push(RawEntry {
			key,
			value,
		});
	}
	Ok(entries)
}

/// Batch-paged cursor over an index table.
pub struct SqliteRangeIter {
	pub(super) conn: Arc<Mutex<Connection>>,
	pub(super) index: IndexId,
	pub(super) batch_size: usize,
	pub(super) buffer: Vec<RawEntry>,
	pub(super) pos: usize,
	pub(super) exhausted: bool,
}

impl SqliteRangeIter {
	pub(super) fn load_initial(&mut self, start: Bound<&[u8]>) -> Result<()> {
		self.load_batch(start)
	}

	fn load_batch(&mut self, start: Bound<&[u8]>) -> Result<()> {
		self.buffer = fetch_batch(&self.conn, self.index, start, self.batch_size)?;
		self.pos = 0;
		self.exhausted = self.buffer.is_empty();
		Ok(())
	}

	fn refill(&mut self) -> Result<()> {
		let Some(last_key) = self.buffer.last().map(|e| e.key.clone()) else {
			self.exhausted = true;
			return Ok(());
		};
		self.load_batch(Bound::Excluded(last_key.as_slice()))
	}
}

impl Iterator for SqliteRangeIter {
	type Item = Result<RawEntry>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.pos >= self.buffer.len() && !self.exhausted {
			if let Err(err) = self.refill() {
				self.exhausted = true;
				return Some(Err(err));
			}
		}

		if self.pos < self.buffer.len() {
			let entry = self.buffer[self.pos].clone();
			self.pos += 1;
			Some(Ok(entry))
		} else {
			None
		}
	}
}
