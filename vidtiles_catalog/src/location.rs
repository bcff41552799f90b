//! Frame-to-tile location lookup over an entry's committed versions.

use crate::{CatalogEntry, VersionDirectory};
use anyhow::{Result, bail};
use itertools::Itertools;
use std::{fs, path::PathBuf, sync::Arc};
use vidtiles_core::{TileLayout, VidtilesError};

/// Resolves frames to the committed version, layout, and tile paths that
/// currently cover them.
///
/// The provider scans the entry directory once at open. A newer version
/// shadows an older one for its frame range, so lookups walk versions from
/// newest to oldest. The index is per-instance; a query that must observe a
/// commit made after open re-opens the provider.
pub struct TileLocationProvider {
	entry: CatalogEntry,
	/// Committed versions, newest first.
	versions: Vec<VersionDirectory>,
}

impl TileLocationProvider {
	/// Scans the entry's committed version directories.
	///
	/// A subdirectory counts as committed iff its name is
	/// `<entry>-<version>` with `version ≤ tile-version` and both descriptor
	/// files exist. Anything else — foreign files, orphans from aborted
	/// transactions, a staging directory mid-write — is skipped.
	pub fn open(entry: &CatalogEntry) -> Result<TileLocationProvider> {
		log::trace!("scanning catalog entry {:?}", entry.name());

		let tile_version = entry.read_tile_version()?;
		let prefix = format!("{}-", entry.name());
		let mut versions = Vec::new();

		for dir_entry in fs::read_dir(entry.path())? {
			let dir_entry = dir_entry?;
			if !dir_entry.path().is_dir() {
				continue;
			}
			let name = dir_entry.file_name().to_string_lossy().into_owned();
			let Some(version_text) = name.strip_prefix(&prefix) else {
				continue;
			};
			let Ok(version) = version_text.parse::<u32>() else {
				continue;
			};
			if version > tile_version || !VersionDirectory::has_descriptors(&dir_entry.path()) {
				// Orphan of a crashed or in-flight transaction.
				continue;
			}
			versions.push(VersionDirectory::open(&dir_entry.path(), version)?);
		}

		let versions = versions
			.into_iter()
			.sorted_unstable_by_key(|version| std::cmp::Reverse(version.version))
			.collect();

		Ok(TileLocationProvider {
			entry: entry.clone(),
			versions,
		})
	}

	#[must_use]
	pub fn entry(&self) -> &CatalogEntry {
		&self.entry
	}

	/// All committed versions, newest first.
	#[must_use]
	pub fn versions(&self) -> &[VersionDirectory] {
		&self.versions
	}

	/// The newest committed version covering `frame`.
	///
	/// # Errors
	/// Fails with [`VidtilesError::NoSuchFrame`] when no version covers the
	/// frame.
	pub fn version_for_frame(&self, frame: u32) -> Result<&VersionDirectory> {
		for version in &self.versions {
			if version.frames.contains(frame) {
				return Ok(version);
			}
		}
		bail!(VidtilesError::NoSuchFrame { frame })
	}

	/// The layout governing `frame`.
	pub fn layout_for_frame(&self, frame: u32) -> Result<Arc<TileLayout>> {
		Ok(self.version_for_frame(frame)?.layout.clone())
	}

	/// The on-disk path of tile `tile` for `frame`.
	///
	/// # Errors
	/// Fails with [`VidtilesError::NoSuchFrame`] when no version covers the
	/// frame, and [`VidtilesError::CorruptCatalog`] when the version exists
	/// but the tile file is missing.
	pub fn location_of_tile_for_frame(&self, frame: u32, tile: u32) -> Result<PathBuf> {
		let version = self.version_for_frame(frame)?;
		let path = version.tile_path(tile);
		if !path.is_file() {
			bail!(VidtilesError::CorruptCatalog(format!(
				"tile file {path:?} is missing for frame {frame}"
			)));
		}
		Ok(path)
	}

	/// The largest tile width and height across every committed version.
	///
	/// The selection pipeline sizes decoder reconfiguration from this.
	#[must_use]
	pub fn largest_tile_dimensions(&self) -> (u32, u32) {
		let mut largest = (0u32, 0u32);
		for version in &self.versions {
			for tile in 0..version.layout.number_of_tiles() {
				let rectangle = version.layout.rectangle_for_tile(tile);
				largest.0 = largest.0.max(rectangle.width);
				largest.1 = largest.1.max(rectangle.height);
			}
		}
		largest
	}

	/// Total frame dimensions of the newest committed version.
	pub fn total_dimensions(&self) -> Result<(u32, u32)> {
		let newest = self
			.versions
			.first()
			.ok_or_else(|| VidtilesError::CorruptCatalog(format!("entry {:?} has no committed versions", self.entry.name())))?;
		Ok((newest.layout.total_width(), newest.layout.total_height()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::CrackingTransaction;
	use assert_fs::TempDir;
	use std::io::Write;
	use vidtiles_core::{Codec, FrameRange};

	fn commit_version(entry: &CatalogEntry, layout: &TileLayout, frames: FrameRange) -> Result<u32> {
		let mut transaction = CrackingTransaction::begin(entry, layout, frames)?;
		for tile in 0..layout.number_of_tiles() {
			write!(transaction.writer(tile)?, "tile {tile} bytes")?;
		}
		transaction.commit()
	}

	#[test]
	fn newest_version_shadows_older_for_its_range() -> Result<()> {
		let root = TempDir::new()?;
		let entry = CatalogEntry::create(root.path(), "traffic", "m", Codec::Hevc)?;
		let coarse = TileLayout::new_single(960, 544);
		let fine = TileLayout::new(2, 1, vec![480, 480], vec![544])?;

		commit_version(&entry, &coarse, FrameRange::new(0, 59)?)?;
		commit_version(&entry, &fine, FrameRange::new(30, 59)?)?;

		let provider = TileLocationProvider::open(&entry)?;
		assert_eq!(provider.versions().len(), 2);

		assert_eq!(*provider.layout_for_frame(10)?, coarse);
		assert_eq!(provider.version_for_frame(10)?.version, 1);

		assert_eq!(*provider.layout_for_frame(45)?, fine);
		assert_eq!(provider.version_for_frame(45)?.version, 2);
		Ok(())
	}

	#[test]
	fn uncovered_frame_is_no_such_frame() -> Result<()> {
		let root = TempDir::new()?;
		let entry = CatalogEntry::create(root.path(), "traffic", "m", Codec::Hevc)?;
		commit_version(&entry, &TileLayout::new_single(960, 544), FrameRange::new(0, 29)?)?;

		let provider = TileLocationProvider::open(&entry)?;
		let error = provider.layout_for_frame(30).unwrap_err();
		assert_eq!(
			error.downcast_ref::<VidtilesError>(),
			Some(&VidtilesError::NoSuchFrame { frame: 30 })
		);
		Ok(())
	}

	#[test]
	fn orphan_directories_are_ignored() -> Result<()> {
		let root = TempDir::new()?;
		let entry = CatalogEntry::create(root.path(), "traffic", "m", Codec::Hevc)?;
		commit_version(&entry, &TileLayout::new_single(960, 544), FrameRange::new(0, 29)?)?;

		// A crash mid-transaction leaves a directory above tile-version.
		fs::create_dir(entry.version_path(7))?;
		fs::write(entry.version_path(7).join("0.hevc"), b"partial")?;

		let provider = TileLocationProvider::open(&entry)?;
		assert_eq!(provider.versions().len(), 1);
		assert_eq!(provider.version_for_frame(0)?.version, 1);
		Ok(())
	}

	#[test]
	fn missing_tile_file_is_corrupt_catalog() -> Result<()> {
		let root = TempDir::new()?;
		let entry = CatalogEntry::create(root.path(), "traffic", "m", Codec::Hevc)?;
		let layout = TileLayout::new(2, 1, vec![480, 480], vec![544])?;
		commit_version(&entry, &layout, FrameRange::new(0, 29)?)?;

		let provider = TileLocationProvider::open(&entry)?;
		fs::remove_file(provider.location_of_tile_for_frame(0, 1)?)?;

		let error = provider.location_of_tile_for_frame(0, 1).unwrap_err();
		assert!(matches!(
			error.downcast_ref::<VidtilesError>(),
			Some(VidtilesError::CorruptCatalog(_))
		));
		Ok(())
	}

	#[test]
	fn largest_tile_dimensions_span_versions() -> Result<()> {
		let root = TempDir::new()?;
		let entry = CatalogEntry::create(root.path(), "traffic", "m", Codec::Hevc)?;
		commit_version(&entry, &TileLayout::new_single(960, 544), FrameRange::new(0, 29)?)?;
		commit_version(
			&entry,
			&TileLayout::new(2, 2, vec![480, 480], vec![272, 272])?,
			FrameRange::new(30, 59)?,
		)?;

		let provider = TileLocationProvider::open(&entry)?;
		assert_eq!(provider.largest_tile_dimensions(), (960, 544));
		assert_eq!(provider.total_dimensions()?, (960, 544));
		Ok(())
	}
}
