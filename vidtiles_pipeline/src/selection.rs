//! The selection pipeline: from a metadata predicate to an image stream.
//!
//! Execution resolves the predicate's frames, groups them into maximal runs
//! sharing one `(version, layout)` and one GOP, decodes each touched tile
//! from its keyframe to the last frame that still needs it, and merges the
//! decoded pixels back into images. Work happens one batch at a time as the
//! caller pulls, so dropping the iterator releases everything mid-query.

use crate::{
	CatalogLayoutProvider, DecoderConfiguration, DecoderFactory, RegretAccumulator, SemanticDataManager,
	TileLayoutProvider, Workload, pixels_to_image, round_up_to_coded,
};
use anyhow::{Context, Result};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use image::RgbImage;
use parking_lot::Mutex;
use std::{
	collections::{BTreeSet, HashMap, VecDeque},
	path::PathBuf,
	sync::Arc,
};
use vidtiles_catalog::TileLocationProvider;
use vidtiles_core::{PixelBuffer, TileLayout, gop_for_frame, keyframe_for_frame};

/// What a selection emits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectStrategy {
	/// Merge the touched tiles of each frame onto a full-frame canvas.
	Objects,
	/// Emit each touched tile's pixels independently.
	Tiles,
	/// Emit whole frames: every tile is decoded and merged.
	Frames,
}

/// One tile stream to decode for a batch.
struct TileDecodeJob {
	tile: u32,
	path: PathBuf,
	/// Absolute frames to decode, keyframe first.
	decode_frames: Vec<u32>,
}

/// The frames of one `(version, GOP)` run and the tile decodes they need.
struct FrameBatch {
	layout: Arc<TileLayout>,
	frames: Vec<u32>,
	jobs: Vec<TileDecodeJob>,
	/// Tiles contributing to each requested frame.
	frame_tiles: HashMap<u32, Vec<u32>>,
}

/// Plans and executes one selection query against a catalog entry.
pub struct SelectionPipeline {
	location: Arc<TileLocationProvider>,
	semantic: Arc<SemanticDataManager>,
	decoder_factory: Arc<dyn DecoderFactory>,
	strategy: SelectStrategy,
	gop_length: u32,
	regret: Option<Arc<Mutex<RegretAccumulator>>>,
}

impl SelectionPipeline {
	#[must_use]
	pub fn new(
		location: Arc<TileLocationProvider>,
		semantic: Arc<SemanticDataManager>,
		decoder_factory: Arc<dyn DecoderFactory>,
		strategy: SelectStrategy,
		gop_length: u32,
	) -> SelectionPipeline {
		SelectionPipeline {
			location,
			semantic,
			decoder_factory,
			strategy,
			gop_length,
			regret: None,
		}
	}

	/// Tees the executed workload into a regret accumulator once the image
	/// stream is fully consumed.
	#[must_use]
	pub fn with_regret(mut self, accumulator: Arc<Mutex<RegretAccumulator>>) -> SelectionPipeline {
		self.regret = Some(accumulator);
		self
	}

	/// Resolves the predicate and plans the batches; decoding happens as the
	/// returned iterator is pulled.
	pub fn execute(self) -> Result<ImageIterator> {
		let frames = self.semantic.ordered_frames()?;
		log::debug!(
			"selection over {:?}: {} frames, {:?}",
			self.location.entry().name(),
			frames.len(),
			self.strategy
		);

		let mut batches = VecDeque::new();
		let mut index = 0;
		while index < frames.len() {
			let version = self.location.version_for_frame(frames[index])?.version;
			let gop = gop_for_frame(frames[index], self.gop_length);

			let mut batch_frames = Vec::new();
			while index < frames.len()
				&& gop_for_frame(frames[index], self.gop_length) == gop
				&& self.location.version_for_frame(frames[index])?.version == version
			{
				batch_frames.push(frames[index]);
				index += 1;
			}
			batches.push_back(self.build_batch(&batch_frames)?);
		}

		let (largest_width, largest_height) = self.location.largest_tile_dimensions();
		let decoder_configuration = DecoderConfiguration {
			max_width: round_up_to_coded(largest_width),
			max_height: round_up_to_coded(largest_height),
			frames: None,
		};
		let display = self.location.total_dimensions().unwrap_or((largest_width, largest_height));

		let regret = self.regret.map(|accumulator| RegretTee {
			accumulator,
			semantic: self.semantic.clone(),
			current_layout: Arc::new(CatalogLayoutProvider::new(self.location.clone())) as Arc<dyn TileLayoutProvider>,
			submitted: false,
		});

		Ok(ImageIterator {
			batches,
			pending: VecDeque::new(),
			decoder_factory: self.decoder_factory,
			strategy: self.strategy,
			decoder_configuration,
			display,
			regret,
		})
	}

	/// Plans one batch: which tiles each frame needs, and how deep into the
	/// GOP each tile stream must be decoded.
	fn build_batch(&self, batch_frames: &[u32]) -> Result<FrameBatch> {
		let version = self.location.version_for_frame(batch_frames[0])?;
		let layout = version.layout.clone();

		// Tile streams start at the version's first frame, which is the
		// keyframe grid origin for anything committed mid-stream.
		let decode_start = keyframe_for_frame(batch_frames[0], self.gop_length).max(version.frames.first);

		let mut frame_tiles: HashMap<u32, Vec<u32>> = HashMap::new();
		let mut max_frame_for_tile: HashMap<u32, u32> = HashMap::new();
		for frame in batch_frames {
			let tiles: Vec<u32> = match self.strategy {
				SelectStrategy::Frames => (0..layout.number_of_tiles()).collect(),
				SelectStrategy::Objects | SelectStrategy::Tiles => {
					let rectangles = self.semantic.rectangles_for_frame(*frame)?;
					let mut touched = BTreeSet::new();
					for rectangle in rectangles.iter() {
						touched.extend(layout.tiles_for_rectangle(rectangle));
					}
					touched.into_iter().collect()
				}
			};

			for tile in &tiles {
				max_frame_for_tile
					.entry(*tile)
					.and_modify(|max| *max = (*max).max(*frame))
					.or_insert(*frame);
			}
			frame_tiles.insert(*frame, tiles);
		}

		let mut jobs = Vec::with_capacity(max_frame_for_tile.len());
		for (tile, max_frame) in max_frame_for_tile.into_iter().collect::<std::collections::BTreeMap<_, _>>() {
			jobs.push(TileDecodeJob {
				tile,
				path: self.location.location_of_tile_for_frame(batch_frames[0], tile)?,
				decode_frames: (decode_start..=max_frame).collect(),
			});
		}

		Ok(FrameBatch {
			layout,
			frames: batch_frames.to_vec(),
			jobs,
			frame_tiles,
		})
	}
}

/// The regret hand-off performed when a query's stream is exhausted.
struct RegretTee {
	accumulator: Arc<Mutex<RegretAccumulator>>,
	semantic: Arc<SemanticDataManager>,
	current_layout: Arc<dyn TileLayoutProvider>,
	submitted: bool,
}

/// Pull-driven image output of one selection query.
///
/// Each pull decodes at most one batch; dropping the iterator abandons the
/// remaining batches and their decoder sessions.
pub struct ImageIterator {
	batches: VecDeque<FrameBatch>,
	pending: VecDeque<RgbImage>,
	decoder_factory: Arc<dyn DecoderFactory>,
	strategy: SelectStrategy,
	decoder_configuration: DecoderConfiguration,
	display: (u32, u32),
	regret: Option<RegretTee>,
}

impl std::fmt::Debug for ImageIterator {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ImageIterator").finish_non_exhaustive()
	}
}

impl ImageIterator {
	/// Yields the next image, or `None` once every batch is emitted.
	///
	/// The first `None` submits the executed workload to the regret
	/// accumulator, when one is attached.
	pub async fn next_image(&mut self) -> Result<Option<RgbImage>> {
		loop {
			if let Some(image) = self.pending.pop_front() {
				return Ok(Some(image));
			}
			let Some(batch) = self.batches.pop_front() else {
				self.submit_regret()?;
				return Ok(None);
			};
			self.pending = self.decode_and_merge(batch).await?;
		}
	}

	/// Drains the remaining images.
	pub async fn collect_images(mut self) -> Result<Vec<RgbImage>> {
		let mut images = Vec::new();
		while let Some(image) = self.next_image().await? {
			images.push(image);
		}
		Ok(images)
	}

	/// Adapts the iterator into a [`futures`] stream.
	#[must_use]
	pub fn into_stream(self) -> ImageStream {
		ImageStream {
			stream: stream::try_unfold(self, |mut iterator| async move {
				Ok(iterator.next_image().await?.map(|image| (image, iterator)))
			})
			.boxed(),
		}
	}

	async fn decode_and_merge(&mut self, batch: FrameBatch) -> Result<VecDeque<RgbImage>> {
		let mut decoded: HashMap<(u32, u32), PixelBuffer> = HashMap::new();

		for job in &batch.jobs {
			let configuration = DecoderConfiguration {
				frames: Some(job.decode_frames.clone()),
				..self.decoder_configuration.clone()
			};
			let mut decoder = self
				.decoder_factory
				.open(&job.path, &configuration)
				.with_context(|| format!("failed to open decoder for tile {} at {:?}", job.tile, job.path))?;

			let mut position = 0;
			while let Some(frame) = decoder.next_frame().await? {
				// Streams without carried numbers are matched positionally
				// against the requested decode order.
				let frame_number = match frame.frame_number {
					Some(number) if number >= 0 => number as u32,
					_ => *job.decode_frames.get(position).context("decoder produced more frames than requested")?,
				};
				position += 1;

				let needed = batch
					.frame_tiles
					.get(&frame_number)
					.is_some_and(|tiles| tiles.contains(&job.tile));
				if needed {
					decoded.insert((frame_number, job.tile), frame.pixels);
				}
			}
		}

		let mut images = VecDeque::new();
		for frame in &batch.frames {
			match self.strategy {
				SelectStrategy::Objects | SelectStrategy::Frames => {
					let mut canvas = PixelBuffer::new_black(batch.layout.total_width(), batch.layout.total_height());
					for tile in &batch.frame_tiles[frame] {
						if let Some(pixels) = decoded.get(&(*frame, *tile)) {
							let rectangle = batch.layout.rectangle_for_tile(*tile);
							canvas.copy_from(pixels, rectangle.x, rectangle.y);
						}
					}
					images.push_back(pixels_to_image(&canvas, self.display.0, self.display.1));
				}
				SelectStrategy::Tiles => {
					for tile in &batch.frame_tiles[frame] {
						if let Some(pixels) = decoded.get(&(*frame, *tile)) {
							let rectangle = batch.layout.rectangle_for_tile(*tile);
							images.push_back(pixels_to_image(pixels, rectangle.width, rectangle.height));
						}
					}
				}
			}
		}
		Ok(images)
	}

	/// Regret accumulation happens strictly after the causing query's output
	/// is fully consumed.
	fn submit_regret(&mut self) -> Result<()> {
		let Some(tee) = self.regret.as_mut() else {
			return Ok(());
		};
		if tee.submitted {
			return Ok(());
		}
		tee.submitted = true;

		let workload = Workload::single(tee.semantic.clone());
		tee.accumulator.lock().add_regret_for_query(&workload, tee.current_layout.clone())
	}
}

/// A boxed stream of images, for callers that prefer `Stream` combinators
/// over explicit pulls.
pub struct ImageStream {
	pub stream: BoxStream<'static, Result<RgbImage>>,
}

impl ImageStream {
	/// Collects every image, failing on the first error.
	pub async fn try_collect(self) -> Result<Vec<RgbImage>> {
		self.stream.try_collect().await
	}
}
