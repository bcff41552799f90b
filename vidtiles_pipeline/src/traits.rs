//! Contracts of the external collaborators: the hardware decoder and encoder
//! wrappers and the semantic index database.
//!
//! The engine consumes decoded frames, produces encoded tile bytes, and asks
//! the index for per-frame object boxes; it implements none of those
//! primitives itself.

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use vidtiles_core::{Blob, FrameRange, MetadataPredicate, ObjectBox, PixelBuffer};

/// One decoded frame as delivered by the external decoder.
#[derive(Debug)]
pub struct DecodedFrame {
	/// Absolute frame number, when the container carries one.
	pub frame_number: Option<i32>,
	pub pixels: PixelBuffer,
}

/// Parameters a decoder session is opened with.
///
/// `max_width`/`max_height` bound every reconfiguration the session will be
/// asked to perform; they must be rounded up to the coded multiple before
/// they reach the wrapper. `frames` restricts decoding to the given absolute
/// frame numbers (the wrapper still starts at the governing keyframe);
/// `None` decodes the whole stream.
#[derive(Clone, Debug, Default)]
pub struct DecoderConfiguration {
	pub max_width: u32,
	pub max_height: u32,
	pub frames: Option<Vec<u32>>,
}

/// A pull-based decoder session over one encoded stream.
#[async_trait]
pub trait FrameDecoder: Send {
	/// Yields the next decoded frame, or `None` at end of stream.
	async fn next_frame(&mut self) -> Result<Option<DecodedFrame>>;
}

impl std::fmt::Debug for dyn FrameDecoder {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("dyn FrameDecoder").finish_non_exhaustive()
	}
}

/// Opens decoder sessions; the NVDEC/container wrapper lives behind this.
///
/// A reconfiguration the wrapper cannot satisfy surfaces
/// [`vidtiles_core::VidtilesError::DecoderReconfigureFailed`].
pub trait DecoderFactory: Send + Sync {
	fn open(&self, path: &Path, configuration: &DecoderConfiguration) -> Result<Box<dyn FrameDecoder>>;
}

/// One hardware encoder session, scoped to a single tile's dimensions.
///
/// Sessions are owned by the [`crate::TileEncoderManager`]; dropping a
/// session releases the hardware resource.
pub trait EncoderSession: Send {
	/// Submits the crop of `pixels` at `(left, top)` for encoding.
	fn encode(&mut self, pixels: &PixelBuffer, top: u32, left: u32, force_keyframe: bool) -> Result<()>;

	/// Drains bytes the encoder has already produced.
	fn drain(&mut self) -> Result<Blob>;

	/// Flushes pending NALs and returns all remaining bytes.
	fn flush(&mut self) -> Result<Blob>;
}

/// Opens encoder sessions; init failure surfaces
/// [`vidtiles_core::VidtilesError::EncoderUnavailable`].
pub trait EncoderFactory: Send + Sync {
	fn create_session(&self, width: u32, height: u32) -> Result<Box<dyn EncoderSession>>;
}

/// The external semantic-index database.
pub trait SemanticIndex: Send + Sync {
	/// All object boxes on `frame` of the given metadata source.
	fn rectangles_for_frame(&self, metadata_identifier: &str, frame: u32) -> Result<Vec<ObjectBox>>;

	/// Frames matching `predicate`, ascending, optionally clipped to a
	/// temporal range.
	fn frames_matching(
		&self,
		metadata_identifier: &str,
		predicate: &MetadataPredicate,
		range: Option<FrameRange>,
	) -> Result<Vec<u32>>;
}
