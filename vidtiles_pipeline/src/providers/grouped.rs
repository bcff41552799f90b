//! A provider deriving one layout per GOP from merged object clusters.

use super::{TileLayoutProvider, layout_from_object_rectangles};
use crate::SemanticDataManager;
use anyhow::Result;
use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc};
use vidtiles_core::{RectangleMerger, TileLayout, gop_for_frame};

/// Like [`super::FineGrainedLayoutProvider`], but fuses intersecting object
/// boxes into clusters before deriving tile edges.
///
/// Produces fewer, larger tiles that still cover every object: queries read
/// fewer tile streams per frame, at the price of more pixels per tile.
pub struct GroupedLayoutProvider {
	gop_length: u32,
	semantic: Arc<SemanticDataManager>,
	width: u32,
	height: u32,
	layouts: Mutex<HashMap<u32, Arc<TileLayout>>>,
}

impl GroupedLayoutProvider {
	#[must_use]
	pub fn new(gop_length: u32, semantic: Arc<SemanticDataManager>, width: u32, height: u32) -> GroupedLayoutProvider {
		GroupedLayoutProvider {
			gop_length,
			semantic,
			width,
			height,
			layouts: Mutex::new(HashMap::new()),
		}
	}
}

impl TileLayoutProvider for GroupedLayoutProvider {
	fn layout_for_frame(&self, frame: u32) -> Result<Arc<TileLayout>> {
		let gop = gop_for_frame(frame, self.gop_length);
		if let Some(layout) = self.layouts.lock().get(&gop) {
			return Ok(layout.clone());
		}

		let rectangles = self.semantic.rectangles_for_gop(gop, self.gop_length)?;
		let clusters = RectangleMerger::new(rectangles).into_rectangles();
		let layout = Arc::new(layout_from_object_rectangles(&clusters, self.width, self.height)?);
		self.layouts.lock().insert(gop, layout.clone());
		Ok(layout)
	}
}
