// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	cmp::Ordering,
	collections::HashSet,
	ops::Bound,
	panic::{RefUnwindSafe, UnwindSafe},
	sync::Arc,
};

use parking_lot::{Mutex, RwLock};
use rusqlite::{Connection, OptionalExtension, params};
use tessera_core::KeyComparator;
use tessera_type::{Error, Result};
use tracing::{debug, instrument};

use super::{
	DbPath, SqliteConfig,
	connection::{configure, connect, resolve_db_path},
	iterator::SqliteRangeIter,
};
use crate::backend::{IndexId, IndexStorage};

/// Orders hex encoded keys with the comparator of an index.
struct Collation {
	comparator: Arc<dyn KeyComparator>,
}

// The comparator is pure and holds no state a panic could leave broken.
impl UnwindSafe for Collation {}
impl RefUnwindSafe for Collation {}

impl Collation {
	fn compare(&self, a: &str, b: &str) -> Ordering {
		match (hex::decode(a), hex::decode(b)) {
			(Ok(a), Ok(b)) => self.comparator.compare_keys(&a, &b),
			_ => a.cmp(b),
		}
	}
}

/// SQLite backed storage.
///
/// Keys are stored as hex text in a column collated by the index comparator,
/// so range scans come back in index order. A single connection serves reads
/// and writes.
#[derive(Clone)]
pub struct SqliteStorage {
	inner: Arc<SqliteStorageInner>,
}

struct SqliteStorageInner {
	conn: Arc<Mutex<Connection>>,
	db_path: DbPath,
	indexes: RwLock<HashSet<IndexId>>,
}

impl SqliteStorage {
	#[instrument(name = "store::sqlite::new", level = "info", skip(config), fields(
		db_path = ?config.path,
		page_size = config.page_size,
		journal_mode = %config.journal_mode.as_str()
	))]
	pub fn new(config: SqliteConfig) -> Result<Self> {
		let db_path = resolve_db_path(&config.path)?;
		let conn = connect(&db_path)?;
		configure(&conn, &config)?;

		Ok(Self {
			inner: Arc::new(SqliteStorageInner {
				conn: Arc::new(Mutex::new(conn)),
				db_path,
				indexes: RwLock::new(HashSet::new()),
			}),
		})
	}

	pub fn in_memory() -> Result<Self> {
		Self::new(SqliteConfig::in_memory())
	}

	pub fn db_path(&self) -> &DbPath {
		&self.inner.db_path
	}

	fn is_ensured(&self, index: IndexId) -> bool {
		self.inner.indexes.read().contains(&index)
	}
}

impl IndexStorage for SqliteStorage {
	type RangeIter<'a> = SqliteRangeIter;

	#[instrument(name = "store::sqlite::ensure_index", level = "debug", skip_all, fields(index = %index))]
	fn ensure_index(&self, index: IndexId, comparator: Arc<dyn KeyComparator>) -> Result<()> {
		let collation_name = format!("tessera_{}", index.name());
		let collation = Collation {
			comparator,
		};

		let conn = self.inner.conn.lock();
		conn.create_collation(collation_name.as_str(), move |a, b| collation.compare(a, b))
			.map_err(|err| Error::storage("ensure_index", index, &[], err))?;
		conn.execute_batch(&format!(
			"CREATE TABLE IF NOT EXISTS \"{}\" (
				key   TEXT NOT NULL PRIMARY KEY COLLATE {},
				value BLOB NOT NULL
			) WITHOUT ROWID;",
			index.name(),
			collation_name
		))
		.map_err(|err| Error::storage("ensure_index", index, &[], err))?;
		drop(conn);

		self.inner.indexes.write().insert(index);
		debug!(index = %index, "index ready");
		Ok(())
	}

	#[instrument(name = "store::sqlite::get", level = "trace", skip_all, fields(index = %index, key_len = key.len()))]
	fn get(&self, index: IndexId, key: &[u8]) -> Result<Option<Vec<u8>>> {
		if !self.is_ensured(index) {
			return Ok(None);
		}

		let conn = self.inner.conn.lock();
		conn.query_row(
			&format!("SELECT value FROM \"{}\" WHERE key = ?1", index.name()),
			params![hex::encode(key)],
			|row| row.get::<_, Vec<u8>>(0),
		)
		.optional()
		.map_err(|err| Error::storage("get", index, key, err))
	}

	#[instrument(name = "store::sqlite::set", level = "debug", skip_all, fields(index = %index, entry_count = entries.len()))]
	fn set(&self, index: IndexId, entries: &[(&[u8], &[u8])]) -> Result<()> {
		if !self.is_ensured(index) {
			let key = entries.first().map(|(key, _)| *key).unwrap_or_default();
			return Err(Error::storage("set", index, key, "index not initialized"));
		}

		let sql = format!("INSERT OR REPLACE INTO \"{}\" (key, value) VALUES (?1, ?2)", index.name());
		let mut conn = self.inner.conn.lock();
		let tx = conn.transaction().map_err(|err| Error::storage("set", index, &[], err))?;
		{
			let mut stmt = tx.prepare(&sql).map_err(|err| Error::storage("set", index, &[], err))?;
			for (key, value) in entries {
				stmt.execute(params![hex::encode(key), value])
					.map_err(|err| Error::storage("set", index, key, err))?;
			}
		}
		tx.commit().map_err(|err| Error::storage("set", index, &[], err))
	}

	#[instrument(name = "store::sqlite::range", level = "trace", skip_all, fields(index = %index, batch_size = batch_size))]
	fn range(&self, index: IndexId, start: Bound<&[u8]>, batch_size: usize) -> Result<Self::RangeIter<'_>> {
		let mut iter = SqliteRangeIter {
			conn: self.inner.conn.clone(),
			index,
			batch_size: batch_size.max(1),
			buffer: Vec::new(),
			pos: 0,
			exhausted: true,
		};
		if self.is_ensured(index) {
			iter.load_initial(start)?;
		}
		Ok(iter)
	}

	#[instrument(name = "store::sqlite::clear_index", level = "debug", skip_all, fields(index = %index))]
	fn clear_index(&self, index: IndexId) -> Result<()> {
		if !self.is_ensured(index) {
			return Ok(());
		}
		let conn = self.inner.conn.lock();
		conn.execute(&format!("DELETE FROM \"{}\"", index.name()), [])
			.map_err(|err| Error::storage("clear_index", index, &[], err))?;
		Ok(())
	}
}
