//! Catalog entries: one named, versioned collection of tiled videos on disk
//! for one logical source video.

use anyhow::{Context, Result, ensure};
use lazy_static::lazy_static;
use parking_lot::Mutex;
use std::{
	collections::HashMap,
	fs,
	path::{Path, PathBuf},
	sync::Arc,
};
use vidtiles_core::Codec;

/// Name of the file holding the highest committed version.
pub const TILE_VERSION_FILE: &str = "tile-version";

lazy_static! {
	/// One writer lock per entry path. Transactions against the same entry
	/// serialize on it; cross-host synchronization is out of scope.
	static ref WRITER_LOCKS: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>> = Mutex::new(HashMap::new());
}

/// A named catalog entry rooted at `<root>/<name>`.
#[derive(Clone, Debug)]
pub struct CatalogEntry {
	name: String,
	metadata_identifier: String,
	path: PathBuf,
	codec: Codec,
}

impl CatalogEntry {
	/// Creates a new entry directory with `tile-version` initialized to 0.
	///
	/// Version 0 is reserved for the original, untiled ingest; the first
	/// cracking transaction commits version 1.
	///
	/// # Errors
	/// Fails if the entry directory already exists.
	pub fn create(root: &Path, name: &str, metadata_identifier: &str, codec: Codec) -> Result<CatalogEntry> {
		let path = root.join(name);
		ensure!(!path.exists(), "catalog entry {name:?} already exists at {path:?}");
		fs::create_dir_all(&path).with_context(|| format!("failed to create entry directory {path:?}"))?;

		let entry = CatalogEntry {
			name: name.to_string(),
			metadata_identifier: metadata_identifier.to_string(),
			path,
			codec,
		};
		entry.write_tile_version(0)?;

		log::debug!("created catalog entry {name:?}");
		Ok(entry)
	}

	/// Opens an existing entry directory.
	pub fn open(root: &Path, name: &str, metadata_identifier: &str, codec: Codec) -> Result<CatalogEntry> {
		let path = root.join(name);
		ensure!(path.is_dir(), "catalog entry {name:?} does not exist at {path:?}");

		let entry = CatalogEntry {
			name: name.to_string(),
			metadata_identifier: metadata_identifier.to_string(),
			path,
			codec,
		};
		// Validate the version file early so a broken entry fails at open.
		entry.read_tile_version()?;
		Ok(entry)
	}

	#[must_use]
	pub fn name(&self) -> &str {
		&self.name
	}

	#[must_use]
	pub fn metadata_identifier(&self) -> &str {
		&self.metadata_identifier
	}

	#[must_use]
	pub fn path(&self) -> &Path {
		&self.path
	}

	#[must_use]
	pub fn codec(&self) -> Codec {
		self.codec
	}

	/// The directory a given version lives in: `<path>/<name>-<version>`.
	#[must_use]
	pub fn version_path(&self, version: u32) -> PathBuf {
		self.path.join(format!("{}-{}", self.name, version))
	}

	/// Reads the highest committed version from the `tile-version` file.
	pub fn read_tile_version(&self) -> Result<u32> {
		let path = self.path.join(TILE_VERSION_FILE);
		let text = fs::read_to_string(&path).with_context(|| format!("failed to read {path:?}"))?;
		text
			.trim()
			.parse::<u32>()
			.with_context(|| format!("{path:?} holds {text:?}, expected an unsigned integer"))
	}

	/// Bumps `tile-version` to `version`, write-then-rename.
	///
	/// This is the linearization point of a cracking transaction: once the
	/// rename lands, readers resolve frames in the new version's range to it.
	pub fn bump_tile_version(&self, version: u32) -> Result<()> {
		let current = self.read_tile_version()?;
		ensure!(
			version > current,
			"tile-version must increase: current {current}, proposed {version}"
		);
		self.write_tile_version(version)
	}

	fn write_tile_version(&self, version: u32) -> Result<()> {
		let target = self.path.join(TILE_VERSION_FILE);
		let staging = self.path.join(format!("{TILE_VERSION_FILE}.tmp"));

		fs::write(&staging, format!("{version}\n")).with_context(|| format!("failed to write {staging:?}"))?;
		fs::File::open(&staging)?.sync_all()?;
		fs::rename(&staging, &target).with_context(|| format!("failed to rename {staging:?} to {target:?}"))?;
		fs::File::open(&self.path)?.sync_all()?;
		Ok(())
	}

	/// The in-process writer lock for this entry.
	#[must_use]
	pub fn writer_lock(&self) -> Arc<Mutex<()>> {
		WRITER_LOCKS
			.lock()
			.entry(self.path.clone())
			.or_insert_with(|| Arc::new(Mutex::new(())))
			.clone()
	}
}
