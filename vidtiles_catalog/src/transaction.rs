//! The cracking transaction: atomic creation of one new layout version.

use crate::{CatalogEntry, VersionDirectory};
use anyhow::{Context, Result, ensure};
use parking_lot::{RawMutex, lock_api::ArcMutexGuard};
use std::{
	fs,
	io::{BufWriter, Write},
	path::PathBuf,
};
use vidtiles_core::{FrameRange, TileLayout};

/// Scoped creation of a version directory `<entry>-<newVersion>`.
///
/// The staging directory is created on `begin` and either promoted by
/// [`commit`](Self::commit) — descriptors written, directory fsynced,
/// `tile-version` bumped write-then-rename — or removed when the transaction
/// is dropped. Readers on older versions are never affected: until the
/// version bump lands, the staging directory fails the committed predicate
/// and is ignored as an orphan.
///
/// Transactions on the same entry serialize on the entry's writer lock for
/// their whole lifetime.
pub struct CrackingTransaction {
	entry: CatalogEntry,
	layout: TileLayout,
	frames: FrameRange,
	version: u32,
	path: PathBuf,
	committed: bool,
	_writer_guard: ArcMutexGuard<RawMutex, ()>,
}

impl CrackingTransaction {
	/// Opens a transaction for one GOP-aligned frame window under `layout`.
	///
	/// Acquires the entry's writer lock, picks `tile-version + 1` as the new
	/// version, and creates the staging directory.
	pub fn begin(entry: &CatalogEntry, layout: &TileLayout, frames: FrameRange) -> Result<CrackingTransaction> {
		let writer_guard = entry.writer_lock().lock_arc();

		let version = entry.read_tile_version()? + 1;
		let path = entry.version_path(version);
		ensure!(!path.exists(), "staging directory {path:?} already exists");
		fs::create_dir(&path).with_context(|| format!("failed to create staging directory {path:?}"))?;

		log::debug!(
			"cracking transaction for {:?}: version {version}, frames {frames:?}",
			entry.name()
		);

		Ok(CrackingTransaction {
			entry: entry.clone(),
			layout: layout.clone(),
			frames,
			version,
			path,
			committed: false,
			_writer_guard: writer_guard,
		})
	}

	/// The version this transaction will commit as.
	#[must_use]
	pub fn version(&self) -> u32 {
		self.version
	}

	/// Returns a buffered write sink for one tile's encoded file.
	pub fn writer(&mut self, tile: u32) -> Result<impl Write + use<>> {
		ensure!(
			tile < self.layout.number_of_tiles(),
			"tile {tile} outside layout with {} tiles",
			self.layout.number_of_tiles()
		);
		let path = self.path.join(format!("{tile}{}", self.entry.codec().extension()));
		let file = fs::File::create(&path).with_context(|| format!("failed to create tile file {path:?}"))?;
		Ok(BufWriter::new(file))
	}

	/// Commits the version: descriptors, directory fsync, version bump.
	///
	/// The `tile-version` rename is the linearization point; after this
	/// returns, location lookups for the committed range resolve to the new
	/// version.
	pub fn commit(mut self) -> Result<u32> {
		VersionDirectory::write_descriptors(&self.path, &self.layout, self.frames)?;
		fs::File::open(&self.path)?.sync_all()?;

		self.entry.bump_tile_version(self.version)?;
		self.committed = true;

		log::debug!("committed version {} of {:?}", self.version, self.entry.name());
		Ok(self.version)
	}
}

impl Drop for CrackingTransaction {
	fn drop(&mut self) {
		if !self.committed {
			if let Err(error) = fs::remove_dir_all(&self.path) {
				log::warn!("failed to remove aborted staging directory {:?}: {error}", self.path);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::TILE_VERSION_FILE;
	use assert_fs::TempDir;
	use vidtiles_core::Codec;

	fn test_entry(root: &TempDir) -> Result<CatalogEntry> {
		CatalogEntry::create(root.path(), "traffic", "traffic-labels", Codec::Hevc)
	}

	#[test]
	fn commit_bumps_version_and_writes_descriptors() -> Result<()> {
		let root = TempDir::new()?;
		let entry = test_entry(&root)?;
		let layout = TileLayout::new(2, 1, vec![480, 480], vec![544])?;

		let mut transaction = CrackingTransaction::begin(&entry, &layout, FrameRange::new(0, 29)?)?;
		assert_eq!(transaction.version(), 1);
		for tile in 0..2 {
			transaction.writer(tile)?.write_all(b"encoded tile bytes")?;
		}
		assert_eq!(transaction.commit()?, 1);

		assert_eq!(entry.read_tile_version()?, 1);
		let version = VersionDirectory::open(&entry.version_path(1), 1)?;
		assert_eq!(*version.layout, layout);
		assert_eq!(version.frames, FrameRange::new(0, 29)?);
		assert_eq!(fs::read(version.tile_path(0))?, b"encoded tile bytes");
		Ok(())
	}

	#[test]
	fn drop_without_commit_rolls_back() -> Result<()> {
		let root = TempDir::new()?;
		let entry = test_entry(&root)?;
		let layout = TileLayout::new_single(960, 544);

		{
			let mut transaction = CrackingTransaction::begin(&entry, &layout, FrameRange::new(0, 29)?)?;
			transaction.writer(0)?.write_all(b"half-written")?;
			// Dropped before commit.
		}

		assert_eq!(entry.read_tile_version()?, 0);
		assert!(!entry.version_path(1).exists());
		Ok(())
	}

	#[test]
	fn versions_increase_across_transactions() -> Result<()> {
		let root = TempDir::new()?;
		let entry = test_entry(&root)?;
		let layout = TileLayout::new_single(960, 544);

		for (index, range) in [(1u32, FrameRange::new(0, 29)?), (2, FrameRange::new(30, 59)?)] {
			let mut transaction = CrackingTransaction::begin(&entry, &layout, range)?;
			transaction.writer(0)?.write_all(b"bytes")?;
			assert_eq!(transaction.commit()?, index);
		}

		assert_eq!(entry.read_tile_version()?, 2);
		Ok(())
	}

	#[test]
	fn writer_rejects_out_of_range_tile() -> Result<()> {
		let root = TempDir::new()?;
		let entry = test_entry(&root)?;
		let layout = TileLayout::new_single(960, 544);

		let mut transaction = CrackingTransaction::begin(&entry, &layout, FrameRange::new(0, 0)?)?;
		assert!(transaction.writer(1).is_err());
		Ok(())
	}

	#[test]
	fn aborted_transaction_leaves_tile_version_untouched() -> Result<()> {
		let root = TempDir::new()?;
		let entry = test_entry(&root)?;
		let layout = TileLayout::new_single(960, 544);

		let mut transaction = CrackingTransaction::begin(&entry, &layout, FrameRange::new(0, 29)?)?;
		transaction.writer(0)?.write_all(b"bytes")?;
		transaction.commit()?;

		{
			let _aborted = CrackingTransaction::begin(&entry, &layout, FrameRange::new(30, 59)?)?;
		}

		let text = fs::read_to_string(entry.path().join(TILE_VERSION_FILE))?;
		assert_eq!(text.trim(), "1");
		Ok(())
	}
}
