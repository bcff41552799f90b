//! The `ValueWriter` trait and its blob-backed implementation.
//!
//! The counterpart of [`super::ValueReader`]: everything the serialized
//! tile-layout record needs to be written with.

use crate::types::Blob;
use anyhow::Result;
use byteorder::WriteBytesExt;
use std::io::{Cursor, Write};

/// Writes integer values and varints to a byte destination.
pub trait ValueWriter {
	/// Returns a mutable reference to the underlying writer.
	fn get_writer(&mut self) -> &mut dyn Write;

	/// Current write position.
	fn position(&mut self) -> Result<u64>;

	/// Writes an unsigned variable-length integer.
	fn write_varint(&mut self, mut value: u64) -> Result<()> {
		while value >= 0x80 {
			self.get_writer().write_all(&[((value & 0x7F) as u8) | 0x80])?;
			value >>= 7;
		}
		self.get_writer().write_all(&[value as u8])?;
		Ok(())
	}

	/// Writes each value of `values` as a varint, without a length prefix.
	fn write_packed_varint_u32(&mut self, values: &[u32]) -> Result<()> {
		for value in values {
			self.write_varint(u64::from(*value))?;
		}
		Ok(())
	}

	/// Writes a single byte.
	fn write_u8(&mut self, value: u8) -> Result<()> {
		Ok(self.get_writer().write_u8(value)?)
	}

	/// Writes a blob's raw bytes.
	fn write_blob(&mut self, blob: &Blob) -> Result<()> {
		self.get_writer().write_all(blob.as_slice())?;
		Ok(())
	}

	/// Writes a string's UTF-8 bytes.
	fn write_string(&mut self, text: &str) -> Result<()> {
		self.get_writer().write_all(text.as_bytes())?;
		Ok(())
	}
}

/// A [`ValueWriter`] accumulating into an owned [`Blob`].
#[derive(Default)]
pub struct ValueWriterBlob {
	cursor: Cursor<Vec<u8>>,
}

impl ValueWriterBlob {
	/// Creates an empty writer.
	#[must_use]
	pub fn new() -> ValueWriterBlob {
		ValueWriterBlob {
			cursor: Cursor::new(Vec::new()),
		}
	}

	/// Consumes the writer, returning the written bytes.
	#[must_use]
	pub fn into_blob(self) -> Blob {
		Blob::from(self.cursor.into_inner())
	}
}

impl ValueWriter for ValueWriterBlob {
	fn get_writer(&mut self) -> &mut dyn Write {
		&mut self.cursor
	}

	fn position(&mut self) -> Result<u64> {
		Ok(self.cursor.position())
	}
}
