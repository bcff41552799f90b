//! A provider with one static whole-frame layout.

use super::TileLayoutProvider;
use anyhow::Result;
use std::sync::Arc;
use vidtiles_core::TileLayout;

/// Stores every frame as a single tile covering the whole frame.
pub struct SingleLayoutProvider {
	layout: Arc<TileLayout>,
}

impl SingleLayoutProvider {
	#[must_use]
	pub fn new(width: u32, height: u32) -> SingleLayoutProvider {
		SingleLayoutProvider {
			layout: Arc::new(TileLayout::new_single(width, height)),
		}
	}
}

impl TileLayoutProvider for SingleLayoutProvider {
	fn layout_for_frame(&self, _frame: u32) -> Result<Arc<TileLayout>> {
		Ok(self.layout.clone())
	}
}
