//! The `PixelBuffer` struct: an RGBA pixel plane passed between the decoder,
//! the tile-merge step, and the image transform.

use super::Rectangle;
use anyhow::{Result, ensure};
use std::fmt;

/// Bytes per pixel; the decoder contract delivers RGBA.
pub const PIXEL_CHANNELS: u32 = 4;

/// A `width × height` RGBA pixel plane in row-major order.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
	width: u32,
	height: u32,
	data: Vec<u8>,
}

impl PixelBuffer {
	/// Creates a zero-filled (transparent black) buffer.
	#[must_use]
	pub fn new_black(width: u32, height: u32) -> PixelBuffer {
		PixelBuffer {
			width,
			height,
			data: vec![0u8; (width * height * PIXEL_CHANNELS) as usize],
		}
	}

	/// Wraps existing RGBA bytes.
	///
	/// # Errors
	/// Fails if `data` is not exactly `width * height * 4` bytes.
	pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<PixelBuffer> {
		ensure!(
			data.len() == (width * height * PIXEL_CHANNELS) as usize,
			"pixel buffer of {width}x{height} needs {} bytes, got {}",
			width * height * PIXEL_CHANNELS,
			data.len()
		);
		Ok(PixelBuffer { width, height, data })
	}

	#[must_use]
	pub fn width(&self) -> u32 {
		self.width
	}

	#[must_use]
	pub fn height(&self) -> u32 {
		self.height
	}

	#[must_use]
	pub fn as_raw(&self) -> &[u8] {
		&self.data
	}

	#[must_use]
	pub fn into_raw(self) -> Vec<u8> {
		self.data
	}

	/// Reads the RGBA value at `(x, y)`.
	///
	/// # Panics
	/// Panics if the coordinate is outside the buffer.
	#[must_use]
	pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
		assert!(x < self.width && y < self.height, "pixel ({x},{y}) out of bounds");
		let offset = ((y * self.width + x) * PIXEL_CHANNELS) as usize;
		[
			self.data[offset],
			self.data[offset + 1],
			self.data[offset + 2],
			self.data[offset + 3],
		]
	}

	/// Fills the whole buffer with one RGBA value.
	pub fn fill(&mut self, rgba: [u8; 4]) {
		for chunk in self.data.chunks_exact_mut(PIXEL_CHANNELS as usize) {
			chunk.copy_from_slice(&rgba);
		}
	}

	/// Copies `source` into this buffer with its top-left corner at
	/// `(left, top)`. Rows falling outside this buffer are clipped.
	pub fn copy_from(&mut self, source: &PixelBuffer, left: u32, top: u32) {
		let copy_width = source.width.min(self.width.saturating_sub(left));
		let copy_height = source.height.min(self.height.saturating_sub(top));

		for row in 0..copy_height {
			let src_start = (row * source.width * PIXEL_CHANNELS) as usize;
			let src_end = src_start + (copy_width * PIXEL_CHANNELS) as usize;
			let dst_start = (((top + row) * self.width + left) * PIXEL_CHANNELS) as usize;
			let dst_end = dst_start + (copy_width * PIXEL_CHANNELS) as usize;
			self.data[dst_start..dst_end].copy_from_slice(&source.data[src_start..src_end]);
		}
	}

	/// Returns a copy of the pixels inside `rectangle`, clipped to the
	/// buffer bounds.
	#[must_use]
	pub fn crop(&self, rectangle: &Rectangle) -> PixelBuffer {
		let left = rectangle.x.min(self.width);
		let top = rectangle.y.min(self.height);
		let width = rectangle.width.min(self.width - left);
		let height = rectangle.height.min(self.height - top);

		let mut out = PixelBuffer::new_black(width, height);
		for row in 0..height {
			let src_start = (((top + row) * self.width + left) * PIXEL_CHANNELS) as usize;
			let src_end = src_start + (width * PIXEL_CHANNELS) as usize;
			let dst_start = (row * width * PIXEL_CHANNELS) as usize;
			let dst_end = dst_start + (width * PIXEL_CHANNELS) as usize;
			out.data[dst_start..dst_end].copy_from_slice(&self.data[src_start..src_end]);
		}
		out
	}
}

impl fmt::Debug for PixelBuffer {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "PixelBuffer({}x{})", self.width, self.height)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn from_raw_validates_length() {
		assert!(PixelBuffer::from_raw(2, 2, vec![0u8; 16]).is_ok());
		assert!(PixelBuffer::from_raw(2, 2, vec![0u8; 15]).is_err());
	}

	#[test]
	fn copy_from_places_block_at_offset() {
		let mut canvas = PixelBuffer::new_black(4, 4);
		let mut block = PixelBuffer::new_black(2, 2);
		block.fill([9, 9, 9, 255]);

		canvas.copy_from(&block, 1, 2);

		assert_eq!(canvas.pixel(1, 2), [9, 9, 9, 255]);
		assert_eq!(canvas.pixel(2, 3), [9, 9, 9, 255]);
		assert_eq!(canvas.pixel(0, 0), [0, 0, 0, 0]);
		assert_eq!(canvas.pixel(3, 2), [0, 0, 0, 0]);
	}

	#[test]
	fn copy_from_clips_at_buffer_edge() {
		let mut canvas = PixelBuffer::new_black(4, 4);
		let mut block = PixelBuffer::new_black(3, 3);
		block.fill([1, 2, 3, 4]);

		canvas.copy_from(&block, 2, 2);

		assert_eq!(canvas.pixel(3, 3), [1, 2, 3, 4]);
		assert_eq!(canvas.pixel(1, 3), [0, 0, 0, 0]);
	}

	#[test]
	fn crop_extracts_block() {
		let mut canvas = PixelBuffer::new_black(4, 4);
		let mut block = PixelBuffer::new_black(2, 2);
		block.fill([7, 7, 7, 255]);
		canvas.copy_from(&block, 2, 0);

		let cropped = canvas.crop(&Rectangle::new(0, 2, 0, 2, 2));
		assert_eq!(cropped.width(), 2);
		assert_eq!(cropped.height(), 2);
		assert_eq!(cropped.pixel(0, 0), [7, 7, 7, 255]);
		assert_eq!(cropped.pixel(1, 1), [7, 7, 7, 255]);
	}
}
