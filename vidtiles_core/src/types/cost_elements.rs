//! The `CostElements` struct: the additive cost of decoding work.

use std::fmt;
use std::ops::{Add, AddAssign};

/// Decoded-pixel and tile-read counts attributed to a query or workload.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct CostElements {
	pub num_pixels: u64,
	pub num_tiles: u64,
}

impl CostElements {
	#[must_use]
	pub fn new(num_pixels: u64, num_tiles: u64) -> CostElements {
		CostElements { num_pixels, num_tiles }
	}

	/// Scales both counts, e.g. by a workload query multiplier.
	#[must_use]
	pub fn scaled(&self, multiplier: u64) -> CostElements {
		CostElements {
			num_pixels: self.num_pixels * multiplier,
			num_tiles: self.num_tiles * multiplier,
		}
	}
}

impl Add for CostElements {
	type Output = CostElements;

	fn add(self, other: CostElements) -> CostElements {
		CostElements {
			num_pixels: self.num_pixels + other.num_pixels,
			num_tiles: self.num_tiles + other.num_tiles,
		}
	}
}

impl AddAssign for CostElements {
	fn add_assign(&mut self, other: CostElements) {
		self.num_pixels += other.num_pixels;
		self.num_tiles += other.num_tiles;
	}
}

impl fmt::Debug for CostElements {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "CostElements(pixels: {}, tiles: {})", self.num_pixels, self.num_tiles)
	}
}
