//! The `ValueReader` trait and its slice-backed implementation.
//!
//! Readers decode the integer and varint primitives the serialized tile-layout
//! record is made of. The trait is implemented by [`ValueReaderSlice`] for
//! in-memory descriptors; byte order is little-endian throughout the catalog.

use crate::types::Blob;
use anyhow::{Context, Result, bail};
use byteorder::ReadBytesExt;
use std::io::{Cursor, Read};

/// Reads integer values and varints from a bounded byte source.
pub trait ValueReader {
	/// Returns the underlying reader to access raw bytes.
	fn get_reader(&mut self) -> &mut dyn Read;

	/// Total length of the readable data in bytes.
	fn len(&self) -> u64;

	/// Current read position.
	fn position(&mut self) -> u64;

	/// Returns `true` if there is no data at all.
	fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Number of bytes left to read.
	fn remaining(&mut self) -> u64 {
		self.len() - self.position()
	}

	/// Returns `true` if any bytes are left.
	fn has_remaining(&mut self) -> bool {
		self.remaining() > 0
	}

	/// Reads a variable-length unsigned integer.
	///
	/// # Errors
	/// Fails if the source ends mid-varint or the varint exceeds 70 bits.
	fn read_varint(&mut self) -> Result<u64> {
		let mut value = 0;
		let mut shift = 0;
		loop {
			let byte = self.get_reader().read_u8()?;
			value |= (u64::from(byte) & 0x7F) << shift;
			if byte & 0x80 == 0 {
				break;
			}
			shift += 7;
			if shift >= 70 {
				bail!("varint too long");
			}
		}
		Ok(value)
	}

	/// Reads a varint and narrows it to `u32`.
	///
	/// # Errors
	/// Fails if the decoded value does not fit in 32 bits.
	fn read_varint_u32(&mut self) -> Result<u32> {
		let value = self.read_varint()?;
		u32::try_from(value).with_context(|| format!("varint {value} does not fit in u32"))
	}

	/// Reads `count` consecutive varints, each narrowed to `u32`.
	fn read_packed_varint_u32(&mut self, count: usize) -> Result<Vec<u32>> {
		let mut values = Vec::with_capacity(count);
		for _ in 0..count {
			values.push(self.read_varint_u32().context("failed to read packed varint")?);
		}
		Ok(values)
	}

	/// Reads a single byte.
	fn read_u8(&mut self) -> Result<u8> {
		Ok(self.get_reader().read_u8()?)
	}

	/// Reads a binary blob of the given length.
	fn read_blob(&mut self, length: u64) -> Result<Blob> {
		let mut blob = Blob::new_sized(length as usize);
		self.get_reader().read_exact(blob.as_mut_slice())?;
		Ok(blob)
	}

	/// Reads a UTF-8 string of the given byte length.
	fn read_string(&mut self, length: u64) -> Result<String> {
		let mut vec = vec![0u8; length as usize];
		self.get_reader().read_exact(&mut vec)?;
		Ok(String::from_utf8(vec)?)
	}
}

/// A [`ValueReader`] over a borrowed byte slice.
pub struct ValueReaderSlice<'a> {
	cursor: Cursor<&'a [u8]>,
	len: u64,
}

impl<'a> ValueReaderSlice<'a> {
	/// Creates a reader over `slice`.
	#[must_use]
	pub fn new(slice: &'a [u8]) -> ValueReaderSlice<'a> {
		ValueReaderSlice {
			len: slice.len() as u64,
			cursor: Cursor::new(slice),
		}
	}
}

impl ValueReader for ValueReaderSlice<'_> {
	fn get_reader(&mut self) -> &mut dyn Read {
		&mut self.cursor
	}

	fn len(&self) -> u64 {
		self.len
	}

	fn position(&mut self) -> u64 {
		self.cursor.position()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn read_varint() -> Result<()> {
		let mut reader = ValueReaderSlice::new(&[0xAC, 0x02]);
		assert_eq!(reader.read_varint()?, 300);
		Ok(())
	}

	#[test]
	fn read_varint_too_long() {
		let blob = [0x80u8; 10];
		let mut reader = ValueReaderSlice::new(&blob);
		assert!(reader.read_varint().is_err());
	}

	#[test]
	fn read_varint_u32_rejects_wide_values() -> Result<()> {
		// 2^35 as a varint.
		let mut reader = ValueReaderSlice::new(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x01]);
		assert!(reader.read_varint_u32().is_err());
		Ok(())
	}

	#[test]
	fn read_packed_varint_u32() -> Result<()> {
		let mut reader = ValueReaderSlice::new(&[0x64, 0x96, 0x01, 0xAC, 0x02]);
		assert_eq!(reader.read_packed_varint_u32(3)?, vec![100, 150, 300]);
		Ok(())
	}

	#[test]
	fn read_blob_and_string() -> Result<()> {
		let mut reader = ValueReaderSlice::new(b"hello!");
		assert_eq!(reader.read_blob(2)?.as_slice(), b"he");
		assert_eq!(reader.read_string(4)?, "llo!");
		assert!(!reader.has_remaining());
		Ok(())
	}

	#[test]
	fn position_tracking() -> Result<()> {
		let mut reader = ValueReaderSlice::new(&[1, 2, 3]);
		assert_eq!(reader.len(), 3);
		assert_eq!(reader.read_u8()?, 1);
		assert_eq!(reader.position(), 1);
		assert_eq!(reader.remaining(), 2);
		Ok(())
	}
}
