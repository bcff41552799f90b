//! A provider deriving one layout per GOP from raw object edges.

use super::{TileLayoutProvider, layout_from_object_rectangles};
use crate::SemanticDataManager;
use anyhow::Result;
use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc};
use vidtiles_core::{TileLayout, gop_for_frame};

/// Partitions each GOP along the aligned edges of every object box the
/// semantic index reports in it.
///
/// Produces many small tiles: queries read few excess pixels, at the price
/// of more tile streams per frame.
pub struct FineGrainedLayoutProvider {
	gop_length: u32,
	semantic: Arc<SemanticDataManager>,
	width: u32,
	height: u32,
	layouts: Mutex<HashMap<u32, Arc<TileLayout>>>,
}

impl FineGrainedLayoutProvider {
	#[must_use]
	pub fn new(gop_length: u32, semantic: Arc<SemanticDataManager>, width: u32, height: u32) -> FineGrainedLayoutProvider {
		FineGrainedLayoutProvider {
			gop_length,
			semantic,
			width,
			height,
			layouts: Mutex::new(HashMap::new()),
		}
	}
}

impl TileLayoutProvider for FineGrainedLayoutProvider {
	fn layout_for_frame(&self, frame: u32) -> Result<Arc<TileLayout>> {
		let gop = gop_for_frame(frame, self.gop_length);
		if let Some(layout) = self.layouts.lock().get(&gop) {
			return Ok(layout.clone());
		}

		let rectangles = self.semantic.rectangles_for_gop(gop, self.gop_length)?;
		let layout = Arc::new(layout_from_object_rectangles(&rectangles, self.width, self.height)?);
		self.layouts.lock().insert(gop, layout.clone());
		Ok(layout)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::mock::MockSemanticIndex;
	use vidtiles_core::{MetadataPredicate, ObjectBox};

	fn manager_with_boxes(boxes: Vec<ObjectBox>) -> Result<Arc<SemanticDataManager>> {
		let mut index = MockSemanticIndex::new();
		for object in boxes {
			index = index.with_box(object);
		}
		Ok(Arc::new(SemanticDataManager::new(
			Arc::new(index),
			"labels",
			MetadataPredicate::AnyObject,
			None,
		)?))
	}

	#[test]
	fn one_layout_per_gop() -> Result<()> {
		let semantic = manager_with_boxes(vec![
			ObjectBox::new(5, "car", 100, 100, 100, 100),
			ObjectBox::new(40, "car", 600, 300, 100, 100),
		])?;
		let provider = FineGrainedLayoutProvider::new(30, semantic, 960, 544);

		let gop0 = provider.layout_for_frame(5)?;
		// x-edges 100→96, 200→192; y-edges identical.
		assert_eq!(gop0.widths_of_columns(), &[96, 96, 768]);
		assert_eq!(gop0.heights_of_rows(), &[96, 96, 352]);

		let gop1 = provider.layout_for_frame(40)?;
		// x-edges 600→576, 700→672; y-edges 300→288, 400→384.
		assert_eq!(gop1.widths_of_columns(), &[576, 96, 288]);
		assert_eq!(gop1.heights_of_rows(), &[288, 96, 160]);

		// Frames of the same GOP share the cached layout.
		assert!(Arc::ptr_eq(&provider.layout_for_frame(20)?, &gop0));
		Ok(())
	}

	#[test]
	fn object_free_gop_is_one_tile() -> Result<()> {
		let semantic = manager_with_boxes(vec![ObjectBox::new(40, "car", 0, 0, 64, 64)])?;
		let provider = FineGrainedLayoutProvider::new(30, semantic, 960, 544);

		assert_eq!(*provider.layout_for_frame(0)?, TileLayout::new_single(960, 544));
		Ok(())
	}
}
