//! Tile-layout providers: the policies mapping a frame number to the layout
//! it is (or should be) stored under.
//!
//! Every provider hands out shared, immutable [`TileLayout`]s. The fine-
//! grained and grouped providers derive one layout per GOP from the object
//! boxes the semantic index reports; the conglomeration provider replays an
//! explicit per-GOP plan produced by the regret controller.

use anyhow::Result;
use itertools::Itertools;
use std::sync::Arc;
use vidtiles_core::{CODED_ALIGNMENT, Rectangle, TileLayout};

mod catalog;
pub use catalog::*;

mod conglomeration;
pub use conglomeration::*;

mod fine_grained;
pub use fine_grained::*;

mod grouped;
pub use grouped::*;

mod single;
pub use single::*;

mod uniform;
pub use uniform::*;

/// Maps a frame number to the tile layout governing it.
///
/// Implementations are immutable from the caller's perspective and safe to
/// share across the storage and cost-estimation paths.
pub trait TileLayoutProvider: Send + Sync {
	fn layout_for_frame(&self, frame: u32) -> Result<Arc<TileLayout>>;
}

/// Builds a layout whose tile boundaries are the aligned edges of the given
/// object rectangles.
///
/// Column boundaries are the sorted distinct x-edges of the rectangles,
/// rounded down to the coded alignment; row boundaries analogously. Edges on
/// or outside the frame border are clipped, and edge candidates that round to
/// the same aligned value collapse to one. An empty rectangle set yields the
/// whole frame as a single tile.
pub(crate) fn layout_from_object_rectangles(rectangles: &[Rectangle], width: u32, height: u32) -> Result<TileLayout> {
	if rectangles.is_empty() {
		return Ok(TileLayout::new_single(width, height));
	}

	let widths = strip_dimensions(
		rectangles.iter().flat_map(|rectangle| [rectangle.x, rectangle.x + rectangle.width]),
		width,
	);
	let heights = strip_dimensions(
		rectangles.iter().flat_map(|rectangle| [rectangle.y, rectangle.y + rectangle.height]),
		height,
	);

	TileLayout::new(widths.len() as u32, heights.len() as u32, widths, heights)
}

/// Turns edge candidates along one axis into consecutive strip sizes
/// spanning `0..total`.
fn strip_dimensions(edges: impl Iterator<Item = u32>, total: u32) -> Vec<u32> {
	let boundaries: Vec<u32> = edges
		.map(|edge| edge - edge % CODED_ALIGNMENT)
		.filter(|edge| *edge > 0 && *edge < total)
		.sorted_unstable()
		.dedup()
		.collect();

	let mut dimensions = Vec::with_capacity(boundaries.len() + 1);
	let mut previous = 0;
	for boundary in boundaries {
		dimensions.push(boundary - previous);
		previous = boundary;
	}
	dimensions.push(total - previous);
	dimensions
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_object_set_yields_single_tile() -> Result<()> {
		let layout = layout_from_object_rectangles(&[], 960, 544)?;
		assert_eq!(layout, TileLayout::new_single(960, 544));
		Ok(())
	}

	#[test]
	fn edges_align_down_and_collapse() -> Result<()> {
		// Both rectangles have left edges inside [64, 96); they collapse to
		// one boundary at 64.
		let rectangles = vec![Rectangle::new(0, 70, 40, 100, 100), Rectangle::new(1, 90, 200, 60, 60)];
		let layout = layout_from_object_rectangles(&rectangles, 960, 544)?;

		// x-edges: 70→64, 170→160, 90→64, 150→128.
		assert_eq!(layout.widths_of_columns(), &[64, 64, 32, 800]);
		// y-edges: 40→32, 140→128, 200→192, 260→256.
		assert_eq!(layout.heights_of_rows(), &[32, 96, 64, 64, 288]);
		Ok(())
	}

	#[test]
	fn edges_outside_the_frame_are_clipped() -> Result<()> {
		let rectangles = vec![Rectangle::new(0, 900, 500, 200, 200)];
		let layout = layout_from_object_rectangles(&rectangles, 960, 544)?;

		// The right and bottom edges fall outside the frame and are dropped.
		assert_eq!(layout.widths_of_columns(), &[896, 64]);
		assert_eq!(layout.heights_of_rows(), &[480, 64]);
		Ok(())
	}
}
