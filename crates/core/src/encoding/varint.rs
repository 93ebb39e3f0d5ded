// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! LEB128 variable length integers.
//!
//! Each byte carries seven bits of payload, least significant group first.
//! The high bit is the continuation bit: set on every byte except the last.
//! Signed values use the two's complement variant, where bit 6 of the final
//! byte is the sign.

use tessera_type::{Error, Result};

/// Writes `value` as ULEB128, returning the number of bytes written.
pub fn encode_unsigned(mut value: u64, out: &mut Vec<u8>) -> usize {
	let mut written = 0;
	loop {
		let byte = (value & 0x7f) as u8;
		value >>= 7;
		written += 1;
		if value == 0 {
			out.push(byte);
			return written;
		}
		out.push(byte | 0x80);
	}
}

/// Writes `value` as SLEB128, returning the number of bytes written.
pub fn encode_signed(mut value: i64, out: &mut Vec<u8>) -> usize {
	let mut written = 0;
	loop {
		let byte = (value & 0x7f) as u8;
		value >>= 7;
		written += 1;
		let done = (value == 0 && byte & 0x40 == 0) || (value == -1 && byte & 0x40 != 0);
		if done {
			out.push(byte);
			return written;
		}
		out.push(byte | 0x80);
	}
}

/// Decodes a ULEB128 value, returning it with the number of bytes consumed.
pub fn decode_unsigned(bytes: &[u8]) -> Result<(u64, usize)> {
	let mut result: u64 = 0;
	let mut shift: u32 = 0;
	let mut pos = 0;
	loop {
		let byte = *bytes.get(pos).ok_or_else(|| Error::decode("unsigned varint", "unexpected end of input"))?;
		pos += 1;

		let low = (byte & 0x7f) as u64;
		if shift >= 64 {
			if low != 0 {
				return Err(Error::decode("unsigned varint", "value is too big"));
			}
		} else {
			if shift == 63 && low > 1 {
				return Err(Error::decode("unsigned varint", "value is too big"));
			}
			result |= low << shift;
		}

		shift += 7;
		if byte & 0x80 == 0 {
			return Ok((result, pos));
		}
	}
}

/// Decodes a SLEB128 value, returning it with the number of bytes consumed.
pub fn decode_signed(bytes: &[u8]) -> Result<(i64, usize)> {
	let mut result: i64 = 0;
	let mut shift: u32 = 0;
	let mut pos = 0;
	loop {
		let byte = *bytes.get(pos).ok_or_else(|| Error::decode("signed varint", "unexpected end of input"))?;
		pos += 1;

		let low = (byte & 0x7f) as i64;
		// beyond bit 63 only sign extension is allowed
		if shift >= 63 && low != 0 && low != 0x7f {
			return Err(Error::decode("signed varint", "value is too big"));
		}
		if shift < 64 {
			result |= low << shift;
		}

		shift += 7;
		if byte & 0x80 == 0 {
			if shift < 64 && byte & 0x40 != 0 {
				result |= -1i64 << shift;
			}
			return Ok((result, pos));
		}
	}
}

pub fn unsigned_size(mut value: u64) -> usize {
	let mut size = 1;
	while value >= 0x80 {
		value >>= 7;
		size += 1;
	}
	size
}

pub fn signed_size(mut value: i64) -> usize {
	let mut size = 0;
	loop {
		let byte = (value & 0x7f) as u8;
		value >>= 7;
		size += 1;
		if (value == 0 && byte & 0x40 == 0) || (value == -1 && byte & 0x40 != 0) {
			return size;
		}
	}
}
