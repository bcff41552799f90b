//! A provider replaying an explicit per-GOP layout plan.

use super::TileLayoutProvider;
use anyhow::Result;
use std::{collections::BTreeMap, sync::Arc};
use vidtiles_core::{TileLayout, gop_for_frame};

/// Serves layouts from an explicit `gop → layout` map, as produced by the
/// regret accumulator for a re-tiling pass.
///
/// A frame whose GOP is absent from the map yields the empty-layout
/// sentinel; re-tiling only ever scans mapped GOPs, so the sentinel marks a
/// caller bug without aborting storage of unrelated GOPs.
pub struct ConglomerationLayoutProvider {
	layouts: BTreeMap<u32, Arc<TileLayout>>,
	gop_length: u32,
	empty: Arc<TileLayout>,
}

impl ConglomerationLayoutProvider {
	#[must_use]
	pub fn new(layouts: BTreeMap<u32, Arc<TileLayout>>, gop_length: u32) -> ConglomerationLayoutProvider {
		ConglomerationLayoutProvider {
			layouts,
			gop_length,
			empty: Arc::new(TileLayout::new_empty()),
		}
	}

	/// The GOPs this plan covers, ascending.
	pub fn gops(&self) -> impl Iterator<Item = u32> + '_ {
		self.layouts.keys().copied()
	}
}

impl TileLayoutProvider for ConglomerationLayoutProvider {
	fn layout_for_frame(&self, frame: u32) -> Result<Arc<TileLayout>> {
		let gop = gop_for_frame(frame, self.gop_length);
		Ok(self.layouts.get(&gop).unwrap_or(&self.empty).clone())
	}
}
