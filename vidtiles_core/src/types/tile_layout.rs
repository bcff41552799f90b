//! The `TileLayout` struct, an immutable partition of a video frame into a
//! grid of independently decodable tiles.
//!
//! # Overview
//!
//! A layout is a list of column widths and row heights. Tiles are numbered
//! row-major: `tile = row * columns + col`. Every storage and selection
//! decision in the engine reduces to the geometric queries here: which
//! rectangle a tile covers, and which tiles a rectangle touches.
//!
//! Layouts are serialized into the catalog as a versioned varint record
//! (version, columns, rows, packed widths, packed heights); readers reject
//! any other version.

use super::Rectangle;
use crate::error::VidtilesError;
use crate::io::{ValueReader, ValueReaderSlice, ValueWriter, ValueWriterBlob};
use crate::types::Blob;
use anyhow::{Context, Result, bail, ensure};
use std::fmt;

/// Format version of the serialized layout record.
const LAYOUT_FORMAT_VERSION: u64 = 1;

/// An immutable partition of a frame into `columns × rows` tiles.
///
/// Invariants, enforced on construction and never mutated afterwards:
/// `columns ≥ 1`, `rows ≥ 1`, one width per column, one height per row.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TileLayout {
	columns: u32,
	rows: u32,
	widths_of_columns: Vec<u32>,
	heights_of_rows: Vec<u32>,
}

impl TileLayout {
	/// Creates a layout from explicit column widths and row heights.
	///
	/// # Errors
	/// Fails if either dimension is zero or the vector lengths do not match
	/// the tile counts.
	pub fn new(columns: u32, rows: u32, widths_of_columns: Vec<u32>, heights_of_rows: Vec<u32>) -> Result<TileLayout> {
		ensure!(columns >= 1, "layout needs at least one column");
		ensure!(rows >= 1, "layout needs at least one row");
		ensure!(
			widths_of_columns.len() == columns as usize,
			"expected {columns} column widths, got {}",
			widths_of_columns.len()
		);
		ensure!(
			heights_of_rows.len() == rows as usize,
			"expected {rows} row heights, got {}",
			heights_of_rows.len()
		);

		Ok(TileLayout {
			columns,
			rows,
			widths_of_columns,
			heights_of_rows,
		})
	}

	/// Creates a uniform `columns × rows` layout over a `width × height`
	/// frame. Every cell gets the same truncated share of each dimension.
	///
	/// # Errors
	/// Fails if either dimension of the grid is zero.
	pub fn new_uniform(columns: u32, rows: u32, width: u32, height: u32) -> Result<TileLayout> {
		ensure!(columns >= 1, "layout needs at least one column");
		ensure!(rows >= 1, "layout needs at least one row");

		TileLayout::new(
			columns,
			rows,
			vec![width / columns; columns as usize],
			vec![height / rows; rows as usize],
		)
	}

	/// The distinguished "no tiles yet" sentinel, `(1, 1, [1], [1])`.
	#[must_use]
	pub fn new_empty() -> TileLayout {
		TileLayout {
			columns: 1,
			rows: 1,
			widths_of_columns: vec![1],
			heights_of_rows: vec![1],
		}
	}

	/// Returns `true` if this layout is the "no tiles yet" sentinel.
	#[must_use]
	pub fn is_empty_sentinel(&self) -> bool {
		*self == TileLayout::new_empty()
	}

	/// Creates a single-tile layout covering the whole frame.
	#[must_use]
	pub fn new_single(width: u32, height: u32) -> TileLayout {
		TileLayout {
			columns: 1,
			rows: 1,
			widths_of_columns: vec![width],
			heights_of_rows: vec![height],
		}
	}

	#[must_use]
	pub fn number_of_tiles(&self) -> u32 {
		self.columns * self.rows
	}

	#[must_use]
	pub fn number_of_columns(&self) -> u32 {
		self.columns
	}

	#[must_use]
	pub fn number_of_rows(&self) -> u32 {
		self.rows
	}

	#[must_use]
	pub fn widths_of_columns(&self) -> &[u32] {
		&self.widths_of_columns
	}

	#[must_use]
	pub fn heights_of_rows(&self) -> &[u32] {
		&self.heights_of_rows
	}

	#[must_use]
	pub fn total_width(&self) -> u32 {
		self.widths_of_columns.iter().sum()
	}

	#[must_use]
	pub fn total_height(&self) -> u32 {
		self.heights_of_rows.iter().sum()
	}

	/// Total pixels per frame under this layout.
	#[must_use]
	pub fn total_pixels(&self) -> u64 {
		u64::from(self.total_width()) * u64::from(self.total_height())
	}

	/// Returns the rectangle covered by tile `tile`.
	///
	/// # Panics
	/// Panics if `tile ≥ number_of_tiles()`.
	#[must_use]
	pub fn rectangle_for_tile(&self, tile: u32) -> Rectangle {
		assert!(tile < self.number_of_tiles(), "tile {tile} out of range");

		let column = (tile % self.columns) as usize;
		let row = (tile / self.columns) as usize;

		let left: u32 = self.widths_of_columns[..column].iter().sum();
		let top: u32 = self.heights_of_rows[..row].iter().sum();

		Rectangle::new(0, left, top, self.widths_of_columns[column], self.heights_of_rows[row])
	}

	/// Returns every tile whose rectangle intersects `rectangle`, in
	/// ascending tile order.
	#[must_use]
	pub fn tiles_for_rectangle(&self, rectangle: &Rectangle) -> Vec<u32> {
		(0..self.number_of_tiles())
			.filter(|tile| self.rectangle_for_tile(*tile).intersects(rectangle))
			.collect()
	}

	/// Returns the ids of the given rectangles that intersect tile `tile`.
	#[must_use]
	pub fn rectangle_ids_that_intersect_tile(&self, rectangles: &[Rectangle], tile: u32) -> Vec<u32> {
		let tile_rectangle = self.rectangle_for_tile(tile);
		rectangles
			.iter()
			.filter(|rectangle| tile_rectangle.intersects(rectangle))
			.map(|rectangle| rectangle.id)
			.collect()
	}

	/// Serializes the layout into the versioned varint record.
	pub fn to_blob(&self) -> Result<Blob> {
		let mut writer = ValueWriterBlob::new();
		writer.write_varint(LAYOUT_FORMAT_VERSION)?;
		writer.write_varint(u64::from(self.columns))?;
		writer.write_varint(u64::from(self.rows))?;
		writer.write_packed_varint_u32(&self.widths_of_columns)?;
		writer.write_packed_varint_u32(&self.heights_of_rows)?;
		Ok(writer.into_blob())
	}

	/// Deserializes a layout from the versioned varint record.
	///
	/// # Errors
	/// Fails with [`VidtilesError::SerializationMismatch`] on any format
	/// version other than 1, and on structurally invalid contents.
	pub fn from_blob(blob: &Blob) -> Result<TileLayout> {
		let mut reader = ValueReaderSlice::new(blob.as_slice());

		let version = reader.read_varint().context("failed to read layout version")?;
		if version != LAYOUT_FORMAT_VERSION {
			bail!(VidtilesError::SerializationMismatch {
				found: version,
				expected: LAYOUT_FORMAT_VERSION,
			});
		}

		let columns = reader.read_varint_u32().context("failed to read column count")?;
		let rows = reader.read_varint_u32().context("failed to read row count")?;
		let widths = reader
			.read_packed_varint_u32(columns as usize)
			.context("failed to read column widths")?;
		let heights = reader
			.read_packed_varint_u32(rows as usize)
			.context("failed to read row heights")?;

		TileLayout::new(columns, rows, widths, heights)
	}
}

impl fmt::Debug for TileLayout {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"TileLayout({}x{}, widths {:?}, heights {:?})",
			self.columns, self.rows, self.widths_of_columns, self.heights_of_rows
		)
	}
}
