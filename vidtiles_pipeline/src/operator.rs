//! The `TileOperator`: the storage state machine that turns a decoded frame
//! stream into committed, GOP-aligned tile versions.

use crate::{DecodedFrame, EncoderFactory, FrameDecoder, TileEncoderManager, TileLayoutProvider};
use anyhow::{Context, Result};
use std::{collections::HashMap, io::Write, sync::Arc};
use vidtiles_catalog::{CatalogEntry, CrackingTransaction};
use vidtiles_core::{Blob, FrameRange, TileLayout};

/// Where the operator stands in the decoded stream.
enum OperatorState {
	/// No layout yet; the first frame configures the encoders.
	Fresh,
	/// Encoding a contiguous window under one layout.
	Encoding {
		layout: Arc<TileLayout>,
		first_frame: u32,
		last_frame: u32,
	},
	/// End of stream reached, everything committed.
	Done,
}

/// Drives per-tile encoders over a decoded frame stream and commits one
/// catalog version per contiguous single-layout window.
///
/// A window ends when the provider's layout changes structurally or the
/// stream skips a frame number; both force a flush-and-commit so every
/// committed directory covers a contiguous range with exactly one layout.
pub struct TileOperator {
	decoder: Box<dyn FrameDecoder>,
	provider: Arc<dyn TileLayoutProvider>,
	entry: CatalogEntry,
	encoders: TileEncoderManager,
	state: OperatorState,
	/// Accumulated encoded bytes per tile of the current window.
	encoded_data: HashMap<u32, Blob>,
	/// Frame number handed to the next frame that does not carry one.
	fallback_frame_number: u32,
}

impl TileOperator {
	#[must_use]
	pub fn new(
		decoder: Box<dyn FrameDecoder>,
		provider: Arc<dyn TileLayoutProvider>,
		entry: CatalogEntry,
		encoder_factory: Arc<dyn EncoderFactory>,
	) -> TileOperator {
		TileOperator {
			decoder,
			provider,
			entry,
			encoders: TileEncoderManager::new(encoder_factory),
			state: OperatorState::Fresh,
			encoded_data: HashMap::new(),
			fallback_frame_number: 0,
		}
	}

	#[must_use]
	pub fn is_complete(&self) -> bool {
		matches!(self.state, OperatorState::Done)
	}

	/// Consumes the whole decoded stream, committing every window.
	pub async fn run(&mut self) -> Result<()> {
		while let Some(frame) = self.decoder.next_frame().await? {
			self.process_frame(&frame)?;
		}
		self.finish()
	}

	fn process_frame(&mut self, frame: &DecodedFrame) -> Result<()> {
		let frame_number = self.resolve_frame_number(frame);
		let layout = self.provider.layout_for_frame(frame_number)?;

		let boundary = match &self.state {
			OperatorState::Fresh => true,
			OperatorState::Encoding {
				layout: current,
				last_frame,
				..
			} => *layout != **current || frame_number != last_frame + 1,
			OperatorState::Done => true,
		};
		if boundary {
			self.flush_and_commit()?;
			self.reconfigure(layout, frame_number)?;
		}

		self.encode_frame_to_tiles(frame, frame_number)?;
		Ok(())
	}

	/// Commits whatever window is buffered and moves to `Done`.
	pub fn finish(&mut self) -> Result<()> {
		self.flush_and_commit()?;
		self.state = OperatorState::Done;
		Ok(())
	}

	/// Frames carry their own number when the container provides one; the
	/// monotonic fallback covers streams that do not.
	fn resolve_frame_number(&mut self, frame: &DecodedFrame) -> u32 {
		match frame.frame_number {
			Some(number) if number >= 0 => number as u32,
			_ => self.fallback_frame_number,
		}
	}

	fn reconfigure(&mut self, layout: Arc<TileLayout>, first_frame: u32) -> Result<()> {
		log::debug!(
			"reconfiguring encoders of {:?} for {} tiles at frame {first_frame}",
			self.entry.name(),
			layout.number_of_tiles()
		);

		for tile in 0..layout.number_of_tiles() {
			let rectangle = layout.rectangle_for_tile(tile);
			self
				.encoders
				.create_encoder_with_configuration(tile, rectangle.width, rectangle.height)?;
		}

		self.state = OperatorState::Encoding {
			layout,
			first_frame,
			last_frame: first_frame,
		};
		Ok(())
	}

	fn encode_frame_to_tiles(&mut self, frame: &DecodedFrame, frame_number: u32) -> Result<()> {
		let OperatorState::Encoding { layout, last_frame, .. } = &mut self.state else {
			unreachable!("encode_frame_to_tiles outside an encoding window");
		};
		let layout = layout.clone();
		*last_frame = frame_number;
		self.fallback_frame_number = frame_number + 1;

		for tile in 0..layout.number_of_tiles() {
			let rectangle = layout.rectangle_for_tile(tile);
			self
				.encoders
				.encode_frame_for_identifier(tile, &frame.pixels, rectangle.y, rectangle.x, false)
				.with_context(|| format!("failed to encode frame {frame_number} into tile {tile}"))?;

			let produced = self.encoders.encoded_frames_for_identifier(tile)?;
			if !produced.is_empty() {
				self.encoded_data.entry(tile).or_default().append(&produced);
			}
		}
		Ok(())
	}

	/// Flushes the encoders and commits the buffered window, if any.
	fn flush_and_commit(&mut self) -> Result<()> {
		let OperatorState::Encoding {
			layout,
			first_frame,
			last_frame,
		} = &self.state
		else {
			return Ok(());
		};
		let (layout, frames) = (layout.clone(), FrameRange::new(*first_frame, *last_frame)?);

		if layout.is_empty_sentinel() {
			self.encoders.destroy_all();
			self.encoded_data.clear();
			return Ok(());
		}

		for tile in self.encoders.tiles() {
			let flushed = self.encoders.flush_encoder_for_identifier(tile)?;
			if !flushed.is_empty() {
				self.encoded_data.entry(tile).or_default().append(&flushed);
			}
		}

		let mut transaction = CrackingTransaction::begin(&self.entry, &layout, frames)?;
		for tile in 0..layout.number_of_tiles() {
			let mut writer = transaction.writer(tile)?;
			if let Some(bytes) = self.encoded_data.get(&tile) {
				writer.write_all(bytes.as_slice())?;
			}
			writer.flush()?;
		}
		transaction.commit()?;

		self.encoders.destroy_all();
		self.encoded_data.clear();
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::mock::{MockEncoderFactory, MockFrameDecoder, solid_pixels};
	use crate::providers::{ConglomerationLayoutProvider, SingleLayoutProvider};
	use assert_fs::TempDir;
	use std::collections::BTreeMap;
	use std::fs;
	use vidtiles_catalog::TileLocationProvider;
	use vidtiles_core::Codec;

	fn frames(numbers: impl IntoIterator<Item = u32>) -> Vec<DecodedFrame> {
		numbers
			.into_iter()
			.map(|number| DecodedFrame {
				frame_number: Some(number as i32),
				pixels: solid_pixels(960, 544, (number % 251) as u8),
			})
			.collect()
	}

	fn unnumbered_frames(count: u32) -> Vec<DecodedFrame> {
		(0..count)
			.map(|number| DecodedFrame {
				frame_number: None,
				pixels: solid_pixels(960, 544, (number % 251) as u8),
			})
			.collect()
	}

	#[tokio::test]
	async fn single_layout_stream_commits_one_version() -> Result<()> {
		let root = TempDir::new()?;
		let entry = CatalogEntry::create(root.path(), "traffic", "m", Codec::Hevc)?;

		let mut operator = TileOperator::new(
			Box::new(MockFrameDecoder::from_frames(frames(0..30))),
			Arc::new(SingleLayoutProvider::new(960, 544)),
			entry.clone(),
			Arc::new(MockEncoderFactory::new()),
		);
		operator.run().await?;
		assert!(operator.is_complete());

		assert_eq!(entry.read_tile_version()?, 1);
		let provider = TileLocationProvider::open(&entry)?;
		assert_eq!(provider.version_for_frame(0)?.frames, FrameRange::new(0, 29)?);

		// 30 encodes and one flush, all at crop (0,0).
		let bytes = fs::read(provider.location_of_tile_for_frame(0, 0)?)?;
		assert_eq!(bytes, format!("{}flush;", "e(0,0,-);".repeat(30)).as_bytes());
		Ok(())
	}

	#[tokio::test]
	async fn layout_change_starts_a_new_version() -> Result<()> {
		let root = TempDir::new()?;
		let entry = CatalogEntry::create(root.path(), "traffic", "m", Codec::Hevc)?;

		let two_tiles = Arc::new(TileLayout::new(2, 1, vec![480, 480], vec![544])?);
		let four_tiles = Arc::new(TileLayout::new(2, 2, vec![480, 480], vec![272, 272])?);
		let provider = ConglomerationLayoutProvider::new(
			BTreeMap::from([(0, two_tiles.clone()), (1, four_tiles.clone())]),
			30,
		);

		let mut operator = TileOperator::new(
			Box::new(MockFrameDecoder::from_frames(frames(0..31))),
			Arc::new(provider),
			entry.clone(),
			Arc::new(MockEncoderFactory::new()),
		);
		operator.run().await?;

		assert_eq!(entry.read_tile_version()?, 2);
		let provider = TileLocationProvider::open(&entry)?;

		let first = provider.version_for_frame(0)?;
		assert_eq!(first.version, 1);
		assert_eq!(first.frames, FrameRange::new(0, 29)?);
		assert_eq!(*first.layout, *two_tiles);

		let second = provider.version_for_frame(30)?;
		assert_eq!(second.version, 2);
		assert_eq!(second.frames, FrameRange::new(30, 30)?);
		assert_eq!(*second.layout, *four_tiles);

		// The second version holds one encode per tile plus the flush.
		let bytes = fs::read(provider.location_of_tile_for_frame(30, 3)?)?;
		assert_eq!(bytes, b"e(480,272,-);flush;");
		Ok(())
	}

	#[tokio::test]
	async fn frame_gap_forces_a_boundary_despite_equal_layout() -> Result<()> {
		let root = TempDir::new()?;
		let entry = CatalogEntry::create(root.path(), "traffic", "m", Codec::Hevc)?;

		let mut stream = frames(0..5);
		stream.extend(frames(10..13));
		let mut operator = TileOperator::new(
			Box::new(MockFrameDecoder::from_frames(stream)),
			Arc::new(SingleLayoutProvider::new(960, 544)),
			entry.clone(),
			Arc::new(MockEncoderFactory::new()),
		);
		operator.run().await?;

		let provider = TileLocationProvider::open(&entry)?;
		assert_eq!(provider.version_for_frame(4)?.frames, FrameRange::new(0, 4)?);
		assert_eq!(provider.version_for_frame(10)?.frames, FrameRange::new(10, 12)?);
		assert_eq!(entry.read_tile_version()?, 2);
		Ok(())
	}

	#[tokio::test]
	async fn unnumbered_frames_use_the_monotonic_counter() -> Result<()> {
		let root = TempDir::new()?;
		let entry = CatalogEntry::create(root.path(), "traffic", "m", Codec::Hevc)?;

		let mut operator = TileOperator::new(
			Box::new(MockFrameDecoder::from_frames(unnumbered_frames(8))),
			Arc::new(SingleLayoutProvider::new(960, 544)),
			entry.clone(),
			Arc::new(MockEncoderFactory::new()),
		);
		operator.run().await?;

		let provider = TileLocationProvider::open(&entry)?;
		assert_eq!(provider.version_for_frame(7)?.frames, FrameRange::new(0, 7)?);
		Ok(())
	}

	#[tokio::test]
	async fn empty_stream_commits_nothing() -> Result<()> {
		let root = TempDir::new()?;
		let entry = CatalogEntry::create(root.path(), "traffic", "m", Codec::Hevc)?;

		let mut operator = TileOperator::new(
			Box::new(MockFrameDecoder::from_frames(Vec::new())),
			Arc::new(SingleLayoutProvider::new(960, 544)),
			entry.clone(),
			Arc::new(MockEncoderFactory::new()),
		);
		operator.run().await?;

		assert!(operator.is_complete());
		assert_eq!(entry.read_tile_version()?, 0);
		Ok(())
	}

	#[tokio::test]
	async fn encoder_failure_aborts_without_committing() -> Result<()> {
		let root = TempDir::new()?;
		let entry = CatalogEntry::create(root.path(), "traffic", "m", Codec::Hevc)?;

		let mut operator = TileOperator::new(
			Box::new(MockFrameDecoder::from_frames(frames(0..3))),
			Arc::new(SingleLayoutProvider::new(960, 544)),
			entry.clone(),
			Arc::new(MockEncoderFactory::failing()),
		);
		assert!(operator.run().await.is_err());
		assert_eq!(entry.read_tile_version()?, 0);
		Ok(())
	}
}
