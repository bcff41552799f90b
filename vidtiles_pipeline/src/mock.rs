//! In-memory collaborators for tests: a semantic index, an encoder whose
//! "bitstream" records its inputs, and a decoder serving registered frames.

use crate::{DecodedFrame, DecoderConfiguration, DecoderFactory, EncoderFactory, EncoderSession, FrameDecoder, SemanticIndex};
use anyhow::{Result, bail};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::{
	collections::{HashMap, VecDeque},
	path::{Path, PathBuf},
	sync::atomic::{AtomicUsize, Ordering},
};
use vidtiles_core::{Blob, FrameRange, MetadataPredicate, ObjectBox, PixelBuffer, VidtilesError};

/// A semantic index over a fixed list of object boxes.
#[derive(Default)]
pub struct MockSemanticIndex {
	boxes: Vec<ObjectBox>,
	rectangle_lookups: AtomicUsize,
}

impl MockSemanticIndex {
	#[must_use]
	pub fn new() -> MockSemanticIndex {
		MockSemanticIndex::default()
	}

	/// Adds one object box.
	#[must_use]
	pub fn with_box(mut self, object: ObjectBox) -> MockSemanticIndex {
		self.boxes.push(object);
		self
	}

	/// How many per-frame rectangle lookups reached the index.
	#[must_use]
	pub fn rectangle_lookups(&self) -> usize {
		self.rectangle_lookups.load(Ordering::Relaxed)
	}
}

impl SemanticIndex for MockSemanticIndex {
	fn rectangles_for_frame(&self, _metadata_identifier: &str, frame: u32) -> Result<Vec<ObjectBox>> {
		self.rectangle_lookups.fetch_add(1, Ordering::Relaxed);
		Ok(self.boxes.iter().filter(|object| object.frame == frame).cloned().collect())
	}

	fn frames_matching(
		&self,
		_metadata_identifier: &str,
		predicate: &MetadataPredicate,
		range: Option<FrameRange>,
	) -> Result<Vec<u32>> {
		let mut frames: Vec<u32> = self
			.boxes
			.iter()
			.filter(|object| predicate.matches_label(&object.label))
			.map(|object| object.frame)
			.filter(|frame| range.is_none_or(|range| range.contains(*frame)))
			.collect();
		frames.sort_unstable();
		frames.dedup();
		Ok(frames)
	}
}

/// An encoder session whose output is a textual record of its inputs, one
/// `e(<left>,<top>,<key>);` token per submitted frame and a trailing
/// `flush;` token when flushed.
pub struct MockEncoderSession {
	width: u32,
	height: u32,
	pending: Vec<u8>,
}

impl EncoderSession for MockEncoderSession {
	fn encode(&mut self, pixels: &PixelBuffer, top: u32, left: u32, force_keyframe: bool) -> Result<()> {
		if left + self.width > pixels.width() || top + self.height > pixels.height() {
			bail!(
				"crop {}x{} at ({left},{top}) exceeds source {}x{}",
				self.width,
				self.height,
				pixels.width(),
				pixels.height()
			);
		}
		let key = if force_keyframe { 'k' } else { '-' };
		self.pending.extend_from_slice(format!("e({left},{top},{key});").as_bytes());
		Ok(())
	}

	fn drain(&mut self) -> Result<Blob> {
		Ok(Blob::from(std::mem::take(&mut self.pending)))
	}

	fn flush(&mut self) -> Result<Blob> {
		self.pending.extend_from_slice(b"flush;");
		self.drain()
	}
}

/// Creates [`MockEncoderSession`]s; can be told to fail initialization.
#[derive(Default)]
pub struct MockEncoderFactory {
	fail_session_init: bool,
	sessions_created: AtomicUsize,
}

impl MockEncoderFactory {
	#[must_use]
	pub fn new() -> MockEncoderFactory {
		MockEncoderFactory::default()
	}

	/// Makes every subsequent `create_session` fail, as a dead hardware
	/// encoder would.
	#[must_use]
	pub fn failing() -> MockEncoderFactory {
		MockEncoderFactory {
			fail_session_init: true,
			sessions_created: AtomicUsize::new(0),
		}
	}

	#[must_use]
	pub fn sessions_created(&self) -> usize {
		self.sessions_created.load(Ordering::Relaxed)
	}
}

impl EncoderFactory for MockEncoderFactory {
	fn create_session(&self, width: u32, height: u32) -> Result<Box<dyn EncoderSession>> {
		if self.fail_session_init {
			bail!(VidtilesError::EncoderUnavailable("mock encoder is down".to_string()));
		}
		self.sessions_created.fetch_add(1, Ordering::Relaxed);
		Ok(Box::new(MockEncoderSession {
			width,
			height,
			pending: Vec::new(),
		}))
	}
}

/// A decoder factory serving frames registered per path.
#[derive(Default)]
pub struct MockDecoderFactory {
	streams: Mutex<HashMap<PathBuf, Vec<(u32, PixelBuffer)>>>,
	opened: Mutex<Vec<PathBuf>>,
}

impl MockDecoderFactory {
	#[must_use]
	pub fn new() -> MockDecoderFactory {
		MockDecoderFactory::default()
	}

	/// Registers the decoded frames a path will serve, as
	/// `(absolute frame number, pixels)` pairs.
	pub fn register(&self, path: &Path, frames: Vec<(u32, PixelBuffer)>) {
		self.streams.lock().insert(path.to_path_buf(), frames);
	}

	/// Every path opened so far, in order.
	#[must_use]
	pub fn opened_paths(&self) -> Vec<PathBuf> {
		self.opened.lock().clone()
	}
}

impl DecoderFactory for MockDecoderFactory {
	fn open(&self, path: &Path, configuration: &DecoderConfiguration) -> Result<Box<dyn FrameDecoder>> {
		let streams = self.streams.lock();
		let Some(frames) = streams.get(path) else {
			bail!("no mock stream registered for {path:?}");
		};
		if configuration.max_width > 0 {
			for (_, pixels) in frames {
				if pixels.width() > configuration.max_width || pixels.height() > configuration.max_height {
					bail!(VidtilesError::DecoderReconfigureFailed(format!(
						"stream {path:?} is {}x{}, session allows {}x{}",
						pixels.width(),
						pixels.height(),
						configuration.max_width,
						configuration.max_height
					)));
				}
			}
		}
		self.opened.lock().push(path.to_path_buf());

		let wanted = configuration.frames.clone();
		let frames: VecDeque<DecodedFrame> = frames
			.iter()
			.filter(|(number, _)| wanted.as_ref().is_none_or(|wanted| wanted.contains(number)))
			.map(|(number, pixels)| DecodedFrame {
				frame_number: Some(*number as i32),
				pixels: pixels.clone(),
			})
			.collect();

		Ok(Box::new(MockFrameDecoder { frames }))
	}
}

/// Serves pre-registered decoded frames in order.
pub struct MockFrameDecoder {
	frames: VecDeque<DecodedFrame>,
}

impl MockFrameDecoder {
	/// A decoder over explicit frames, for driving the tile operator
	/// directly.
	#[must_use]
	pub fn from_frames(frames: Vec<DecodedFrame>) -> MockFrameDecoder {
		MockFrameDecoder {
			frames: frames.into_iter().collect(),
		}
	}
}

#[async_trait]
impl FrameDecoder for MockFrameDecoder {
	async fn next_frame(&mut self) -> Result<Option<DecodedFrame>> {
		Ok(self.frames.pop_front())
	}
}

/// A `width × height` buffer filled with a value derived from `seed`, so
/// merged pixels can be traced back to their source frame and tile.
#[must_use]
pub fn solid_pixels(width: u32, height: u32, seed: u8) -> PixelBuffer {
	let mut pixels = PixelBuffer::new_black(width, height);
	pixels.fill([seed, seed, seed, 255]);
	pixels
}
