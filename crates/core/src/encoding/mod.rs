// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Byte level encoding shared by every persisted structure.
//!
//! Values are written either fixed width (8 byte little endian words) or as
//! LEB128 varints, selected once per store through [`Encoding`]. Decoding goes
//! through a bounds checked [`Reader`], so truncated or corrupt input surfaces
//! as [`Error::Decode`] instead of reading past the buffer.

pub mod varint;

use serde::{Deserialize, Serialize};
use tessera_type::{Error, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
	Fixed,
	#[default]
	Variable,
}

impl Encoding {
	pub fn write_unsigned(self, value: u64, out: &mut Vec<u8>) {
		match self {
			Encoding::Fixed => out.extend_from_slice(&value.to_le_bytes()),
			Encoding::Variable => {
				varint::encode_unsigned(value, out);
			}
		}
	}

	pub fn write_signed(self, value: i64, out: &mut Vec<u8>) {
		match self {
			Encoding::Fixed => out.extend_from_slice(&value.to_le_bytes()),
			Encoding::Variable => {
				varint::encode_signed(value, out);
			}
		}
	}
}

/// Appends `bytes` preceded by its little endian `u32` length.
pub fn write_segment(bytes: &[u8], out: &mut Vec<u8>) {
	out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
	out.extend_from_slice(bytes);
}

pub struct Reader<'a> {
	bytes: &'a [u8],
	pos: usize,
	what: &'static str,
}

impl<'a> Reader<'a> {
	/// `what` names the structure being decoded in error messages.
	pub fn new(bytes: &'a [u8], what: &'static str) -> Self {
		Self {
			bytes,
			pos: 0,
			what,
		}
	}

	pub fn is_empty(&self) -> bool {
		self.pos >= self.bytes.len()
	}

	pub fn remaining(&self) -> usize {
		self.bytes.len().saturating_sub(self.pos)
	}

	pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
		if self.remaining() < len {
			return Err(Error::decode(
				self.what,
				format!("expected {} bytes at offset {}, found {}", len, self.pos, self.remaining()),
			));
		}
		let slice = &self.bytes[self.pos..self.pos + len];
		self.pos += len;
		Ok(slice)
	}

	pub fn read_u8(&mut self) -> Result<u8> {
		Ok(self.read_bytes(1)?[0])
	}

	pub fn read_u32_le(&mut self) -> Result<u32> {
		let mut buf = [0u8; 4];
		buf.copy_from_slice(self.read_bytes(4)?);
		Ok(u32::from_le_bytes(buf))
	}

	pub fn read_unsigned(&mut self, encoding: Encoding) -> Result<u64> {
		match encoding {
			Encoding::Fixed => {
				let mut buf = [0u8; 8];
				buf.copy_from_slice(self.read_bytes(8)?);
				Ok(u64::from_le_bytes(buf))
			}
			Encoding::Variable => {
				let (value, len) = varint::decode_unsigned(&self.bytes[self.pos.min(self.bytes.len())..])
					.map_err(|err| self.wrap(err))?;
				self.pos += len;
				Ok(value)
			}
		}
	}

	pub fn read_signed(&mut self, encoding: Encoding) -> Result<i64> {
		match encoding {
			Encoding::Fixed => {
				let mut buf = [0u8; 8];
				buf.copy_from_slice(self.read_bytes(8)?);
				Ok(i64::from_le_bytes(buf))
			}
			Encoding::Variable => {
				let (value, len) = varint::decode_signed(&self.bytes[self.pos.min(self.bytes.len())..])
					.map_err(|err| self.wrap(err))?;
				self.pos += len;
				Ok(value)
			}
		}
	}

	/// Reads a segment written by [`write_segment`].
	pub fn read_segment(&mut self) -> Result<&'a [u8]> {
		let len = self.read_u32_le()? as usize;
		self.read_bytes(len)
	}

	fn wrap(&self, err: Error) -> Error {
		match err {
			Error::Decode {
				reason,
				..
			} => Error::decode(self.what, format!("{} at offset {}", reason, self.pos)),
			other => other,
		}
	}
}
