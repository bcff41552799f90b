//! A provider backed by the catalog's committed versions.

use super::TileLayoutProvider;
use anyhow::Result;
use std::sync::Arc;
use vidtiles_catalog::TileLocationProvider;
use vidtiles_core::TileLayout;

/// Reports the layout each frame is currently stored under, as the cost
/// estimator and regret accumulator need when scoring the status quo.
pub struct CatalogLayoutProvider {
	location: Arc<TileLocationProvider>,
}

impl CatalogLayoutProvider {
	#[must_use]
	pub fn new(location: Arc<TileLocationProvider>) -> CatalogLayoutProvider {
		CatalogLayoutProvider { location }
	}
}

impl TileLayoutProvider for CatalogLayoutProvider {
	fn layout_for_frame(&self, frame: u32) -> Result<Arc<TileLayout>> {
		self.location.layout_for_frame(frame)
	}
}
