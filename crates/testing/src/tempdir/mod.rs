// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{env, fs, path::Path};

use uuid::Uuid;

/// Runs `f` with a fresh directory that is removed afterwards, whatever `f`
/// returns.
pub fn temp_dir<F>(f: F) -> std::io::Result<()>
where
	F: FnOnce(&Path) -> std::io::Result<()>,
{
	let mut path = env::temp_dir();
	path.push(format!("tessera-{}", Uuid::new_v4()));

	fs::create_dir(&path)?;
	let result = f(&path);

	let _ = fs::remove_dir_all(&path);
	result
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_directory_is_removed() {
		let mut seen = None;
		temp_dir(|path| {
			assert!(path.is_dir());
			fs::write(path.join("file"), b"data")?;
			seen = Some(path.to_path_buf());
			Ok(())
		})
		.unwrap();
		assert!(!seen.unwrap().exists());
	}

	#[test]
	fn test_error_is_returned() {
		let result = temp_dir(|_| Err(std::io::Error::other("boom")));
		assert_eq!(result.unwrap_err().to_string(), "boom");
	}
}
