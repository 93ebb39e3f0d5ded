// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::path::PathBuf;

use rusqlite::{Connection, OpenFlags};
use tessera_type::{Error, Result};

use super::{DbPath, SqliteConfig};

const DB_FILE: &str = "tessera.db";

/// Resolves the database path, creating directories as needed.
pub(super) fn resolve_db_path(path: &DbPath) -> Result<DbPath> {
	match path {
		DbPath::Memory => Ok(DbPath::Memory),
		DbPath::File(path) => {
			if path.extension().is_none() {
				std::fs::create_dir_all(path)?;
				Ok(DbPath::File(path.join(DB_FILE)))
			} else {
				if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
					std::fs::create_dir_all(parent)?;
				}
				Ok(DbPath::File(path.clone()))
			}
		}
	}
}

pub(super) fn connect(path: &DbPath) -> Result<Connection> {
	let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE | OpenFlags::SQLITE_OPEN_NO_MUTEX;
	let (target, result) = match path {
		DbPath::Memory => (PathBuf::from(":memory:"), Connection::open_in_memory_with_flags(flags)),
		DbPath::File(path) => (path.clone(), Connection::open_with_flags(path, flags)),
	};
	result.map_err(|err| Error::storage("open", target.display(), &[], err))
}

pub(super) fn configure(conn: &Connection, config: &SqliteConfig) -> Result<()> {
	let pragma = |name: &'static str, value: &dyn rusqlite::ToSql| {
		conn.pragma_update(None, name, value).map_err(|err| Error::storage("pragma", name, &[], err))
	};
	pragma("page_size", &config.page_size)?;
	pragma("journal_mode", &config.journal_mode.as_str())?;
	pragma("synchronous", &config.synchronous_mode.as_str())?;
	pragma("temp_store", &config.temp_store.as_str())?;
	pragma("cache_size", &-(config.cache_size as i64))?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use tessera_testing::tempdir::temp_dir;

	use super::*;

	#[test]
	fn test_resolve_db_path_with_directory() {
		temp_dir(|temp_path| {
			let dir_path = temp_path.join("mydb");
			let result = resolve_db_path(&DbPath::File(dir_path.clone())).unwrap();
			assert_eq!(result, DbPath::File(dir_path.join(DB_FILE)));
			assert!(dir_path.is_dir());
			Ok(())
		})
		.expect("test failed");
	}

	#[test]
	fn test_resolve_db_path_with_file() {
		temp_dir(|temp_path| {
			let file_path = temp_path.join("nested").join("custom.db");
			let result = resolve_db_path(&DbPath::File(file_path.clone())).unwrap();
			assert_eq!(result, DbPath::File(file_path.clone()));
			assert!(temp_path.join("nested").is_dir());
			assert!(!file_path.exists());
			Ok(())
		})
		.expect("test failed");
	}

	#[test]
	fn test_connect_in_memory() {
		let conn = connect(&DbPath::Memory).unwrap();
		configure(&conn, &SqliteConfig::in_memory()).unwrap();
	}
}
