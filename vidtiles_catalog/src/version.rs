//! Committed version directories and their descriptor files.

use anyhow::{Context, Result, bail};
use std::{
	fs,
	path::{Path, PathBuf},
	sync::Arc,
};
use vidtiles_core::{Blob, Codec, FrameRange, TileLayout, VidtilesError};

/// Name of the serialized layout descriptor inside a version directory.
pub const LAYOUT_FILE: &str = "layout";
/// Name of the frame-range descriptor inside a version directory.
pub const FRAME_RANGE_FILE: &str = "frame-range";

/// One committed layout version: a directory holding a layout descriptor, a
/// frame-range descriptor, and one encoded file per tile.
#[derive(Clone, Debug)]
pub struct VersionDirectory {
	pub version: u32,
	pub path: PathBuf,
	pub layout: Arc<TileLayout>,
	pub frames: FrameRange,
	pub codec: Codec,
}

impl VersionDirectory {
	/// Opens a committed version directory, validating its descriptors and
	/// tile files.
	///
	/// # Errors
	/// Fails with [`VidtilesError::CorruptCatalog`] on a missing or invalid
	/// descriptor, a tile count that does not match the layout, or mixed
	/// codecs.
	pub fn open(path: &Path, version: u32) -> Result<VersionDirectory> {
		log::trace!("open version directory {path:?}");

		let layout_path = path.join(LAYOUT_FILE);
		if !layout_path.is_file() {
			bail!(VidtilesError::CorruptCatalog(format!("{path:?} has no layout descriptor")));
		}
		let layout = TileLayout::from_blob(&Blob::from(fs::read(&layout_path)?))
			.with_context(|| format!("failed to parse layout descriptor in {path:?}"))?;

		let range_path = path.join(FRAME_RANGE_FILE);
		if !range_path.is_file() {
			bail!(VidtilesError::CorruptCatalog(format!(
				"{path:?} has no frame-range descriptor"
			)));
		}
		let frames = parse_frame_range(&fs::read_to_string(&range_path)?)
			.with_context(|| format!("failed to parse frame-range descriptor in {path:?}"))?;

		let codec = detect_codec(path, layout.number_of_tiles())?;

		Ok(VersionDirectory {
			version,
			path: path.to_path_buf(),
			layout: Arc::new(layout),
			frames,
			codec,
		})
	}

	/// Returns `true` if the directory carries both descriptor files.
	#[must_use]
	pub fn has_descriptors(path: &Path) -> bool {
		path.join(LAYOUT_FILE).is_file() && path.join(FRAME_RANGE_FILE).is_file()
	}

	/// Writes both descriptor files for a version under construction.
	pub fn write_descriptors(path: &Path, layout: &TileLayout, frames: FrameRange) -> Result<()> {
		fs::write(path.join(LAYOUT_FILE), layout.to_blob()?.as_slice())?;
		fs::write(path.join(FRAME_RANGE_FILE), format_frame_range(frames))?;
		Ok(())
	}

	/// The path of one tile's encoded file.
	#[must_use]
	pub fn tile_path(&self, tile: u32) -> PathBuf {
		self.path.join(format!("{tile}{}", self.codec.extension()))
	}
}

/// Parses the `"<firstFrame> <lastFrame>\n"` descriptor.
pub fn parse_frame_range(text: &str) -> Result<FrameRange> {
	let mut parts = text.split_whitespace();
	let first = parts
		.next()
		.context("frame-range descriptor is empty")?
		.parse::<u32>()
		.context("first frame is not an unsigned integer")?;
	let last = parts
		.next()
		.context("frame-range descriptor has no last frame")?
		.parse::<u32>()
		.context("last frame is not an unsigned integer")?;
	if parts.next().is_some() {
		bail!("frame-range descriptor has trailing content");
	}
	FrameRange::new(first, last)
}

/// Formats the `"<firstFrame> <lastFrame>\n"` descriptor.
#[must_use]
pub fn format_frame_range(frames: FrameRange) -> String {
	format!("{} {}\n", frames.first, frames.last)
}

/// Detects the tile codec from the tile files in `path` and validates that
/// exactly `expected_tiles` tile files exist.
fn detect_codec(path: &Path, expected_tiles: u32) -> Result<Codec> {
	let mut codec: Option<Codec> = None;
	let mut tile_count = 0u32;

	for entry in fs::read_dir(path)? {
		let entry = entry?;
		let mut filename = entry.file_name().to_string_lossy().into_owned();
		let Some(file_codec) = Codec::from_filename(&mut filename) else {
			continue;
		};
		if filename.parse::<u32>().is_err() {
			continue;
		}

		tile_count += 1;
		match codec {
			None => codec = Some(file_codec),
			Some(existing) if existing != file_codec => {
				bail!(VidtilesError::CorruptCatalog(format!(
					"{path:?} mixes {existing:?} and {file_codec:?} tile files"
				)));
			}
			Some(_) => {}
		}
	}

	if tile_count != expected_tiles {
		bail!(VidtilesError::CorruptCatalog(format!(
			"{path:?} holds {tile_count} tile files, layout expects {expected_tiles}"
		)));
	}
	codec.ok_or_else(|| VidtilesError::CorruptCatalog(format!("{path:?} has no tile files")).into())
}
