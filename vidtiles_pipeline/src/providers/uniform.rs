//! A provider with one uniform rows-by-columns layout.

use super::TileLayoutProvider;
use anyhow::Result;
use std::sync::Arc;
use vidtiles_core::{TileLayout, VideoConfiguration};

/// Splits every frame into an `R × C` grid.
///
/// Strip sizes follow the coded dimensions so every tile lands on the codec
/// block grid, clamped so the cumulative size never exceeds the display
/// dimension.
pub struct UniformLayoutProvider {
	layout: Arc<TileLayout>,
}

impl UniformLayoutProvider {
	pub fn new(rows: u32, columns: u32, configuration: &VideoConfiguration) -> Result<UniformLayoutProvider> {
		let layout = TileLayout::new(
			columns,
			rows,
			strip_dimensions(configuration.coded_width, configuration.display_width, columns),
			strip_dimensions(configuration.coded_height, configuration.display_height, rows),
		)?;
		Ok(UniformLayoutProvider {
			layout: Arc::new(layout),
		})
	}
}

impl TileLayoutProvider for UniformLayoutProvider {
	fn layout_for_frame(&self, _frame: u32) -> Result<Arc<TileLayout>> {
		Ok(self.layout.clone())
	}
}

/// The size of strip `i` of `count` is `((i+1)*coded)/count - (i*coded)/count`,
/// clamped so the strips never extend past the display dimension.
fn strip_dimensions(coded: u32, display: u32, count: u32) -> Vec<u32> {
	let mut dimensions = Vec::with_capacity(count as usize);
	let mut total = 0;
	for i in 0..count {
		let mut proposed = (i + 1) * coded / count - i * coded / count;
		if total + proposed > display {
			proposed = display - total;
		}
		dimensions.push(proposed);
		total += proposed;
	}
	dimensions
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn strips_follow_coded_and_clamp_to_display() -> Result<()> {
		let configuration = VideoConfiguration::with_alignment(950, 540, 30, 32);
		let provider = UniformLayoutProvider::new(2, 2, &configuration)?;
		let layout = provider.layout_for_frame(0)?;

		// Coded 960 splits evenly; the second strip is clamped to display.
		assert_eq!(layout.widths_of_columns(), &[480, 470]);
		assert_eq!(layout.heights_of_rows(), &[272, 268]);
		assert_eq!(layout.total_width(), 950);
		assert_eq!(layout.total_height(), 540);
		Ok(())
	}

	#[test]
	fn uneven_split_distributes_remainder() -> Result<()> {
		let configuration = VideoConfiguration {
			display_width: 100,
			display_height: 90,
			coded_width: 100,
			coded_height: 90,
			gop_length: 30,
		};
		let provider = UniformLayoutProvider::new(3, 3, &configuration)?;
		let layout = provider.layout_for_frame(0)?;

		assert_eq!(layout.widths_of_columns(), &[33, 33, 34]);
		assert_eq!(layout.heights_of_rows(), &[30, 30, 30]);
		Ok(())
	}
}
