//! The error taxonomy surfaced to callers.
//!
//! General failures travel as `anyhow::Error` with context, the way the rest
//! of the workspace reports them. The variants here are the classified
//! failures a caller may want to react to; they are raised with
//! `bail!(VidtilesError::…)` and recovered with `downcast_ref`.

use thiserror::Error;

/// Classified failures of the tile engine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VidtilesError {
	/// The on-disk catalog is inconsistent: a missing or mis-sized layout,
	/// a gap in versions, or a tile file that should exist but does not.
	#[error("corrupt catalog: {0}")]
	CorruptCatalog(String),

	/// A serialized descriptor carries an unsupported format version.
	#[error("unsupported layout format version {found}, expected {expected}")]
	SerializationMismatch { found: u64, expected: u64 },

	/// An encoder session could not be initialized.
	#[error("encoder unavailable: {0}")]
	EncoderUnavailable(String),

	/// The decoder rejected a reconfiguration at a layout boundary.
	#[error("decoder reconfiguration failed: {0}")]
	DecoderReconfigureFailed(String),

	/// The queried frame is outside every committed version's range.
	#[error("no version covers frame {frame}")]
	NoSuchFrame { frame: u32 },

	/// The metadata selection is malformed and was rejected before any work.
	#[error("invalid predicate: {0}")]
	InvalidPredicate(String),
}

#[cfg(test)]
mod tests {
	use super::*;
	use anyhow::{Result, bail};

	fn fail_with_missing_frame() -> Result<()> {
		bail!(VidtilesError::NoSuchFrame { frame: 99 })
	}

	#[test]
	fn variants_survive_anyhow_downcast() {
		let error = fail_with_missing_frame().unwrap_err();
		assert_eq!(
			error.downcast_ref::<VidtilesError>(),
			Some(&VidtilesError::NoSuchFrame { frame: 99 })
		);
		assert_eq!(error.to_string(), "no version covers frame 99");
	}
}
