// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::fmt::Display;

use crate::PatchId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("failed to decode {what}: {reason}")]
	Decode {
		what: &'static str,
		reason: String,
	},

	#[error("storage {operation} on {index} failed for key {key}: {message}")]
	Storage {
		operation: &'static str,
		index: String,
		key: String,
		message: String,
	},

	#[error("patch {patch_id} must be greater than the latest patch {max_patch_id}")]
	PatchOrder {
		patch_id: PatchId,
		max_patch_id: PatchId,
	},

	#[error("invalid configuration: {0}")]
	Config(String),

	#[error(transparent)]
	Io(#[from] std::io::Error),
}

impl Error {
	pub fn decode(what: &'static str, reason: impl Into<String>) -> Self {
		Error::Decode {
			what,
			reason: reason.into(),
		}
	}

	/// Storage failure with the offending key rendered as hex.
	pub fn storage(operation: &'static str, index: impl Display, key: &[u8], message: impl Display) -> Self {
		Error::Storage {
			operation,
			index: index.to_string(),
			key: hex::encode(key),
			message: message.to_string(),
		}
	}

	pub fn is_decode(&self) -> bool {
		matches!(self, Error::Decode { .. })
	}
}
