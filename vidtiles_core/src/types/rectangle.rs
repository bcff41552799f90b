//! Even-aligned rectangles and the merger that fuses overlapping ones.
//!
//! Rectangles are the geometric currency of the whole engine: object bounding
//! boxes, tile extents, and query regions are all `Rectangle`s. Codecs work on
//! even pixel grids, so every rectangle is normalized to even coordinates on
//! construction: `x`/`y` are rounded down, `width`/`height` are rounded up, and
//! the normalized rectangle always contains the requested one.

use std::fmt;

/// An axis-aligned rectangle with even coordinates and dimensions.
///
/// The right and bottom edges are half-open: a rectangle covers the pixel range
/// `[x, x + width) × [y, y + height)`. The `id` tags which object the rectangle
/// came from; geometric operations ignore it except where documented.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rectangle {
	pub id: u32,
	pub x: u32,
	pub y: u32,
	pub width: u32,
	pub height: u32,
}

impl Rectangle {
	/// Creates a rectangle, normalizing odd inputs to the even grid.
	///
	/// `x` and `y` are rounded down, `width` and `height` rounded up, so the
	/// result contains `[x, x + width) × [y, y + height)` of the input.
	#[must_use]
	pub fn new(id: u32, x: u32, y: u32, width: u32, height: u32) -> Rectangle {
		Rectangle {
			id,
			x: x - (x % 2),
			y: y - (y % 2),
			width: width + (width % 2),
			height: height + (height % 2),
		}
	}

	/// Returns `true` if both rectangles have the same width and height.
	#[must_use]
	pub fn has_equal_dimensions(&self, other: &Rectangle) -> bool {
		self.width == other.width && self.height == other.height
	}

	/// The covered area in pixels.
	#[must_use]
	pub fn area(&self) -> u64 {
		u64::from(self.width) * u64::from(self.height)
	}

	/// Returns `true` if `(pos_x, pos_y)` lies inside the rectangle.
	///
	/// Containment is half-open on the right and bottom edges.
	#[must_use]
	pub fn contains_point(&self, pos_x: u32, pos_y: u32) -> bool {
		self.x <= pos_x && self.y <= pos_y && self.x + self.width > pos_x && self.y + self.height > pos_y
	}

	/// Returns `true` if the two rectangles share any pixel.
	#[must_use]
	pub fn intersects(&self, other: &Rectangle) -> bool {
		!(self.x >= other.x + other.width
			|| other.x >= self.x + self.width
			|| self.y >= other.y + other.height
			|| other.y >= self.y + self.height)
	}

	/// Returns the intersection rectangle, tagged with `other`'s id.
	///
	/// Callers must check [`intersects`](Self::intersects) first; the edge
	/// subtraction underflows for disjoint rectangles.
	#[must_use]
	pub fn overlapping_rectangle(&self, other: &Rectangle) -> Rectangle {
		let top = self.y.max(other.y);
		let bottom = (self.y + self.height).min(other.y + other.height);
		let left = self.x.max(other.x);
		let right = (self.x + self.width).min(other.x + other.width);

		Rectangle::new(other.id, left, top, right - left, bottom - top)
	}

	/// Grows this rectangle in place to the bounding union with `other`.
	pub fn expand(&mut self, other: &Rectangle) {
		let left = self.x.min(other.x);
		let right = (self.x + self.width).max(other.x + other.width);
		self.x = left;
		self.width = right - left;

		let top = self.y.min(other.y);
		let bottom = (self.y + self.height).max(other.y + other.height);
		self.y = top;
		self.height = bottom - top;
	}
}

impl fmt::Debug for Rectangle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"Rectangle({}: {},{} {}x{})",
			self.id, self.x, self.y, self.width, self.height
		)
	}
}

/// Fuses intersecting rectangles into their bounding unions.
///
/// The merger owns its list and keeps it at a fixpoint: no two stored
/// rectangles intersect. Each fusion removes one rectangle, so merging is
/// bounded by the initial count.
pub struct RectangleMerger {
	rectangles: Vec<Rectangle>,
}

impl RectangleMerger {
	/// Creates a merger over `rectangles` and immediately merges them.
	#[must_use]
	pub fn new(rectangles: Vec<Rectangle>) -> RectangleMerger {
		let mut merger = RectangleMerger { rectangles };
		merger.merge();
		merger
	}

	/// Adds a rectangle, expanding any stored rectangle it intersects, then
	/// re-merges to restore the fixpoint.
	pub fn add_rectangle(&mut self, other: &Rectangle) {
		let mut merged = false;
		for rectangle in &mut self.rectangles {
			if rectangle.intersects(other) {
				rectangle.expand(other);
				merged = true;
			}
		}
		if !merged {
			self.rectangles.push(*other);
		}

		self.merge();
	}

	/// The current pairwise-disjoint rectangles.
	#[must_use]
	pub fn rectangles(&self) -> &[Rectangle] {
		&self.rectangles
	}

	/// Consumes the merger, returning the merged rectangles.
	#[must_use]
	pub fn into_rectangles(self) -> Vec<Rectangle> {
		self.rectangles
	}

	fn merge(&mut self) {
		let mut changed = true;
		while changed {
			changed = false;
			'outer: for i in 0..self.rectangles.len() {
				for j in (i + 1)..self.rectangles.len() {
					if self.rectangles[i].intersects(&self.rectangles[j]) {
						let other = self.rectangles.remove(j);
						self.rectangles[i].expand(&other);
						changed = true;
						break 'outer;
					}
				}
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn normalization_produces_even_containing_rectangle() {
		let rect = Rectangle::new(0, 3, 5, 7, 9);
		assert_eq!((rect.x, rect.y, rect.width, rect.height), (2, 4, 8, 10));

		// The normalized rectangle must contain the original one.
		assert!(rect.contains_point(3, 5));
		assert!(rect.contains_point(3 + 7 - 1, 5 + 9 - 1));
	}

	#[test]
	fn normalization_keeps_even_input_unchanged() {
		let rect = Rectangle::new(7, 2, 4, 6, 8);
		assert_eq!(rect, Rectangle { id: 7, x: 2, y: 4, width: 6, height: 8 });
	}

	#[test]
	fn contains_point_is_half_open() {
		let rect = Rectangle::new(0, 10, 10, 10, 10);
		assert!(rect.contains_point(10, 10));
		assert!(rect.contains_point(19, 19));
		assert!(!rect.contains_point(20, 10));
		assert!(!rect.contains_point(10, 20));
	}

	#[test]
	fn intersects_is_half_open_on_right_and_bottom() {
		let rect = Rectangle::new(0, 0, 0, 10, 10);
		assert!(rect.intersects(&Rectangle::new(1, 8, 8, 4, 4)));
		// Touching edges do not intersect.
		assert!(!rect.intersects(&Rectangle::new(1, 10, 0, 10, 10)));
		assert!(!rect.intersects(&Rectangle::new(1, 0, 10, 10, 10)));
	}

	#[test]
	fn overlapping_rectangle_inherits_other_id() {
		let a = Rectangle::new(1, 0, 0, 10, 10);
		let b = Rectangle::new(9, 6, 4, 10, 10);
		let overlap = a.overlapping_rectangle(&b);
		assert_eq!(overlap, Rectangle::new(9, 6, 4, 4, 6));
	}

	#[test]
	fn expand_produces_bounding_union() {
		let mut a = Rectangle::new(0, 4, 6, 4, 4);
		a.expand(&Rectangle::new(1, 0, 8, 4, 4));
		assert_eq!(a, Rectangle::new(0, 0, 6, 8, 6));
	}

	#[test]
	fn merger_fuses_transitive_overlaps() {
		let merger = RectangleMerger::new(vec![
			Rectangle::new(0, 0, 0, 10, 10),
			Rectangle::new(1, 5, 5, 10, 10),
			Rectangle::new(2, 100, 100, 5, 5),
		]);

		// (5,5) normalizes to (4,4), so the fused union is 14x14; the odd 5x5
		// becomes 6x6.
		assert_eq!(
			merger.rectangles(),
			&[Rectangle::new(0, 0, 0, 14, 14), Rectangle::new(2, 100, 100, 6, 6)]
		);
	}

	#[test]
	fn merger_is_idempotent_on_disjoint_input() {
		let disjoint = vec![Rectangle::new(0, 0, 0, 4, 4), Rectangle::new(1, 10, 10, 4, 4)];
		let once = RectangleMerger::new(disjoint.clone());
		assert_eq!(once.rectangles(), disjoint.as_slice());

		let twice = RectangleMerger::new(once.rectangles().to_vec());
		assert_eq!(twice.rectangles(), once.rectangles());
	}

	#[test]
	fn add_rectangle_keeps_fixpoint() {
		let mut merger = RectangleMerger::new(vec![Rectangle::new(0, 0, 0, 4, 4)]);
		merger.add_rectangle(&Rectangle::new(1, 20, 20, 4, 4));
		assert_eq!(merger.rectangles().len(), 2);

		// Bridges both existing rectangles into one.
		merger.add_rectangle(&Rectangle::new(2, 2, 2, 20, 20));
		assert_eq!(merger.rectangles(), &[Rectangle::new(0, 0, 0, 24, 24)]);
	}
}
