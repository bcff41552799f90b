//! The `Codec` enum: the bitstream formats tile files are stored in.

use anyhow::{Result, bail};
use std::fmt::Debug;

/// Video codec of a stored tile stream.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
	H264,
	Hevc,
}

impl Codec {
	/// The file extension used for tile files of this codec, with leading dot.
	#[must_use]
	pub fn extension(&self) -> &str {
		match self {
			Codec::H264 => ".h264",
			Codec::Hevc => ".hevc",
		}
	}

	/// Detects the codec from a tile filename and strips its extension.
	///
	/// Returns `None` and leaves `filename` untouched when no known
	/// extension matches.
	pub fn from_filename(filename: &mut String) -> Option<Codec> {
		for codec in [Codec::H264, Codec::Hevc] {
			if filename.ends_with(codec.extension()) {
				filename.truncate(filename.len() - codec.extension().len());
				return Some(codec);
			}
		}
		None
	}

	/// Parses a codec name.
	pub fn parse_str(value: &str) -> Result<Codec> {
		match value.to_lowercase().trim() {
			"h264" | "avc" => Ok(Codec::H264),
			"hevc" | "h265" => Ok(Codec::Hevc),
			_ => bail!("unknown codec: {value}"),
		}
	}
}

impl Debug for Codec {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Codec::H264 => write!(f, "H264"),
			Codec::Hevc => write!(f, "HEVC"),
		}
	}
}
