//! The `ObjectBox` struct: a labeled detection supplied by the external
//! semantic index.

use super::Rectangle;

/// A per-frame object bounding box from the semantic index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectBox {
	pub frame: u32,
	pub label: String,
	pub x: u32,
	pub y: u32,
	pub width: u32,
	pub height: u32,
}

impl ObjectBox {
	#[must_use]
	pub fn new(frame: u32, label: &str, x: u32, y: u32, width: u32, height: u32) -> ObjectBox {
		ObjectBox {
			frame,
			label: label.to_string(),
			x,
			y,
			width,
			height,
		}
	}

	/// Converts the box into an even-normalized rectangle tagged with `id`.
	#[must_use]
	pub fn to_rectangle(&self, id: u32) -> Rectangle {
		Rectangle::new(id, self.x, self.y, self.width, self.height)
	}
}
