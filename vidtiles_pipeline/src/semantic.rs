//! The `SemanticDataManager`: a caching adapter between one query's
//! predicate and the external semantic index.

use crate::SemanticIndex;
use anyhow::Result;
use lru::LruCache;
use parking_lot::Mutex;
use std::{collections::HashSet, num::NonZeroUsize, sync::Arc};
use vidtiles_core::{FrameRange, MetadataPredicate, Rectangle, gop_frame_range};

/// How many frames' rectangle lists are kept per manager instance.
const RECTANGLE_CACHE_CAPACITY: usize = 4096;

/// Caches index results for one `(metadata identifier, predicate, temporal
/// range)` triple.
///
/// The caches are per-instance: a manager is created per query (or per
/// candidate layout) and thrown away with it.
pub struct SemanticDataManager {
	index: Arc<dyn SemanticIndex>,
	metadata_identifier: String,
	predicate: MetadataPredicate,
	temporal_range: Option<FrameRange>,
	ordered_frames: Mutex<Option<Arc<Vec<u32>>>>,
	rectangle_cache: Mutex<LruCache<u32, Arc<Vec<Rectangle>>>>,
}

impl SemanticDataManager {
	/// Creates a manager, rejecting malformed predicates before any index
	/// work starts.
	pub fn new(
		index: Arc<dyn SemanticIndex>,
		metadata_identifier: &str,
		predicate: MetadataPredicate,
		temporal_range: Option<FrameRange>,
	) -> Result<SemanticDataManager> {
		predicate.validate()?;
		Ok(SemanticDataManager {
			index,
			metadata_identifier: metadata_identifier.to_string(),
			predicate,
			temporal_range,
			ordered_frames: Mutex::new(None),
			rectangle_cache: Mutex::new(LruCache::new(NonZeroUsize::new(RECTANGLE_CACHE_CAPACITY).unwrap())),
		})
	}

	#[must_use]
	pub fn metadata_identifier(&self) -> &str {
		&self.metadata_identifier
	}

	#[must_use]
	pub fn predicate(&self) -> &MetadataPredicate {
		&self.predicate
	}

	/// The frames whose predicate evaluation is non-empty, ascending.
	pub fn ordered_frames(&self) -> Result<Arc<Vec<u32>>> {
		let mut cached = self.ordered_frames.lock();
		if let Some(frames) = cached.as_ref() {
			return Ok(frames.clone());
		}

		let frames = Arc::new(self.index.frames_matching(
			&self.metadata_identifier,
			&self.predicate,
			self.temporal_range,
		)?);
		*cached = Some(frames.clone());
		Ok(frames)
	}

	/// The matching frames as a set.
	pub fn frame_set(&self) -> Result<HashSet<u32>> {
		Ok(self.ordered_frames()?.iter().copied().collect())
	}

	/// The predicate-matching rectangles on `frame`, even-normalized and
	/// id-tagged by their position in the frame's box list.
	pub fn rectangles_for_frame(&self, frame: u32) -> Result<Arc<Vec<Rectangle>>> {
		if let Some(rectangles) = self.rectangle_cache.lock().get(&frame) {
			return Ok(rectangles.clone());
		}

		let rectangles: Vec<Rectangle> = self
			.index
			.rectangles_for_frame(&self.metadata_identifier, frame)?
			.iter()
			.filter(|object| self.predicate.matches_label(&object.label))
			.enumerate()
			.map(|(id, object)| object.to_rectangle(id as u32))
			.collect();

		let rectangles = Arc::new(rectangles);
		self.rectangle_cache.lock().put(frame, rectangles.clone());
		Ok(rectangles)
	}

	/// All predicate-matching rectangles across the matching frames of one
	/// GOP.
	pub fn rectangles_for_gop(&self, gop: u32, gop_length: u32) -> Result<Vec<Rectangle>> {
		let range = gop_frame_range(gop, gop_length);
		let mut rectangles = Vec::new();
		for frame in self.ordered_frames()?.iter() {
			if range.contains(*frame) {
				rectangles.extend(self.rectangles_for_frame(*frame)?.iter().copied());
			}
		}
		Ok(rectangles)
	}
}
