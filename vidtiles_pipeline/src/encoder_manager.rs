//! The `TileEncoderManager`: one encoder session per tile of the layout
//! currently being written.

use crate::{EncoderFactory, EncoderSession};
use anyhow::{Context, Result, bail};
use std::{collections::HashMap, sync::Arc};
use vidtiles_core::{Blob, PixelBuffer, VidtilesError};

/// Owns the per-tile encoder sessions of the current layout.
///
/// Sessions persist across frames while the layout holds and are destroyed
/// when it changes; the transaction that persists their output only ever
/// holds byte buffers.
pub struct TileEncoderManager {
	factory: Arc<dyn EncoderFactory>,
	sessions: HashMap<u32, Box<dyn EncoderSession>>,
}

impl TileEncoderManager {
	#[must_use]
	pub fn new(factory: Arc<dyn EncoderFactory>) -> TileEncoderManager {
		TileEncoderManager {
			factory,
			sessions: HashMap::new(),
		}
	}

	/// Initializes a session for `tile` with the given crop dimensions.
	///
	/// # Errors
	/// Fails with [`VidtilesError::EncoderUnavailable`] when the hardware
	/// wrapper cannot open a session.
	pub fn create_encoder_with_configuration(&mut self, tile: u32, width: u32, height: u32) -> Result<()> {
		let session = self
			.factory
			.create_session(width, height)
			.with_context(|| VidtilesError::EncoderUnavailable(format!("failed to open session for tile {tile}")))?;
		self.sessions.insert(tile, session);
		Ok(())
	}

	/// Submits the crop of `pixels` at `(left, top)` to tile `tile`'s session.
	pub fn encode_frame_for_identifier(
		&mut self,
		tile: u32,
		pixels: &PixelBuffer,
		top: u32,
		left: u32,
		force_keyframe: bool,
	) -> Result<()> {
		self.session(tile)?.encode(pixels, top, left, force_keyframe)
	}

	/// Drains bytes tile `tile`'s session has already produced.
	pub fn encoded_frames_for_identifier(&mut self, tile: u32) -> Result<Blob> {
		self.session(tile)?.drain()
	}

	/// Flushes tile `tile`'s session and returns all remaining bytes.
	pub fn flush_encoder_for_identifier(&mut self, tile: u32) -> Result<Blob> {
		self.session(tile)?.flush()
	}

	/// Destroys every session, releasing the hardware resources.
	pub fn destroy_all(&mut self) {
		self.sessions.clear();
	}

	/// The tiles with a live session, ascending.
	#[must_use]
	pub fn tiles(&self) -> Vec<u32> {
		let mut tiles: Vec<u32> = self.sessions.keys().copied().collect();
		tiles.sort_unstable();
		tiles
	}

	fn session(&mut self, tile: u32) -> Result<&mut Box<dyn EncoderSession>> {
		match self.sessions.get_mut(&tile) {
			Some(session) => Ok(session),
			None => bail!("no encoder session for tile {tile}"),
		}
	}
}
