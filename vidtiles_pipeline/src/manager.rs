//! The `VideoManager`: the lifecycle facade over storing, querying, and
//! regret-driven re-tiling of catalog entries.

use crate::{
	ConglomerationLayoutProvider, DecoderConfiguration, DecoderFactory, EncoderFactory, FineGrainedLayoutProvider,
	ImageIterator, RegretAccumulator, RegretCandidate, SelectStrategy, SelectionPipeline, SemanticDataManager,
	SemanticIndex, SingleLayoutProvider, TileLayoutProvider, TileOperator, UniformLayoutProvider, round_up_to_coded,
};
use anyhow::{Context, Result, bail};
use parking_lot::Mutex;
use std::{
	collections::HashMap,
	fs,
	path::{Path, PathBuf},
	sync::Arc,
};
use vidtiles_catalog::{CatalogEntry, TileLocationProvider};
use vidtiles_core::{Codec, FrameRange, MetadataPredicate, VideoConfiguration, gop_frame_range};

/// What the manager remembers about a stored video: where the original
/// ingest lives and how it is shaped. Re-tiling decodes from the original.
struct StoredVideo {
	source: PathBuf,
	configuration: VideoConfiguration,
}

/// Stores videos into the catalog, runs selection queries over them, and
/// re-tiles entries whose regret crosses its threshold.
pub struct VideoManager {
	root: PathBuf,
	codec: Codec,
	decoder_factory: Arc<dyn DecoderFactory>,
	encoder_factory: Arc<dyn EncoderFactory>,
	semantic_index: Arc<dyn SemanticIndex>,
	videos: Mutex<HashMap<String, StoredVideo>>,
	accumulators: Mutex<HashMap<String, Arc<Mutex<RegretAccumulator>>>>,
}

impl VideoManager {
	/// Creates a manager over a catalog root, creating the root directory if
	/// necessary.
	pub fn new(
		root: &Path,
		codec: Codec,
		decoder_factory: Arc<dyn DecoderFactory>,
		encoder_factory: Arc<dyn EncoderFactory>,
		semantic_index: Arc<dyn SemanticIndex>,
	) -> Result<VideoManager> {
		if !root.exists() {
			fs::create_dir_all(root).with_context(|| format!("failed to create catalog root {root:?}"))?;
		}
		Ok(VideoManager {
			root: root.to_path_buf(),
			codec,
			decoder_factory,
			encoder_factory,
			semantic_index,
			videos: Mutex::new(HashMap::new()),
			accumulators: Mutex::new(HashMap::new()),
		})
	}

	/// Stores a video untiled: one whole-frame tile per GOP window.
	pub async fn store(
		&self,
		source: &Path,
		name: &str,
		metadata_identifier: &str,
		configuration: VideoConfiguration,
	) -> Result<()> {
		let provider = Arc::new(SingleLayoutProvider::new(
			configuration.display_width,
			configuration.display_height,
		));
		self.store_tiled(source, name, metadata_identifier, provider, configuration).await
	}

	/// Stores a video under a uniform rows-by-columns layout.
	pub async fn store_with_uniform_layout(
		&self,
		source: &Path,
		name: &str,
		metadata_identifier: &str,
		configuration: VideoConfiguration,
		rows: u32,
		columns: u32,
	) -> Result<()> {
		let provider = Arc::new(UniformLayoutProvider::new(rows, columns, &configuration)?);
		self.store_tiled(source, name, metadata_identifier, provider, configuration).await
	}

	/// Stores a video under per-GOP layouts hugging the objects matching
	/// `predicate`.
	pub async fn store_with_nonuniform_layout(
		&self,
		source: &Path,
		name: &str,
		metadata_identifier: &str,
		configuration: VideoConfiguration,
		predicate: MetadataPredicate,
	) -> Result<()> {
		let semantic = Arc::new(SemanticDataManager::new(
			self.semantic_index.clone(),
			metadata_identifier,
			predicate,
			None,
		)?);
		let provider = Arc::new(FineGrainedLayoutProvider::new(
			configuration.gop_length,
			semantic,
			configuration.display_width,
			configuration.display_height,
		));
		self.store_tiled(source, name, metadata_identifier, provider, configuration).await
	}

	async fn store_tiled(
		&self,
		source: &Path,
		name: &str,
		metadata_identifier: &str,
		provider: Arc<dyn TileLayoutProvider>,
		configuration: VideoConfiguration,
	) -> Result<()> {
		log::debug!("storing {source:?} as {name:?}");

		let entry = CatalogEntry::create(&self.root, name, metadata_identifier, self.codec)?;
		let decoder = self.decoder_factory.open(
			source,
			&DecoderConfiguration {
				max_width: round_up_to_coded(configuration.coded_width),
				max_height: round_up_to_coded(configuration.coded_height),
				frames: None,
			},
		)?;

		TileOperator::new(decoder, provider, entry, self.encoder_factory.clone()).run().await?;

		self.videos.lock().insert(
			name.to_string(),
			StoredVideo {
				source: source.to_path_buf(),
				configuration,
			},
		);
		Ok(())
	}

	/// Runs a selection query; the returned iterator yields the images.
	///
	/// Queries only run against videos stored through this manager, which
	/// knows their GOP length and original source.
	pub fn select(
		&self,
		name: &str,
		metadata_identifier: &str,
		predicate: MetadataPredicate,
		temporal_range: Option<FrameRange>,
		strategy: SelectStrategy,
	) -> Result<ImageIterator> {
		let gop_length = self.configuration_for(name)?.gop_length;

		let entry = CatalogEntry::open(&self.root, name, metadata_identifier, self.codec)?;
		let location = Arc::new(TileLocationProvider::open(&entry)?);
		let semantic = Arc::new(SemanticDataManager::new(
			self.semantic_index.clone(),
			metadata_identifier,
			predicate,
			temporal_range,
		)?);

		let mut pipeline = SelectionPipeline::new(location, semantic, self.decoder_factory.clone(), strategy, gop_length);
		if let Some(accumulator) = self.accumulators.lock().get(name) {
			pipeline = pipeline.with_regret(accumulator.clone());
		}
		pipeline.execute()
	}

	/// Starts regret tracking for an entry with user-supplied candidate
	/// layouts; queries issued afterwards feed the accumulator.
	pub fn activate_regret_based_retiling(
		&self,
		name: &str,
		candidates: Vec<RegretCandidate>,
		threshold: f64,
	) -> Result<()> {
		let configuration = self.configuration_for(name)?;
		let accumulator = RegretAccumulator::new(
			candidates,
			configuration.display_width,
			configuration.display_height,
			configuration.gop_length,
			threshold,
		);
		self
			.accumulators
			.lock()
			.insert(name.to_string(), Arc::new(Mutex::new(accumulator)));
		Ok(())
	}

	/// Stops regret tracking for an entry, dropping its ledgers.
	pub fn deactivate_regret_based_retiling(&self, name: &str) {
		self.accumulators.lock().remove(name);
	}

	/// The accumulator of an entry with regret tracking active.
	#[must_use]
	pub fn regret_accumulator(&self, name: &str) -> Option<Arc<Mutex<RegretAccumulator>>> {
		self.accumulators.lock().get(name).cloned()
	}

	/// Re-tiles every GOP whose regret crossed the threshold, then resets
	/// their ledgers. Returns `false` when nothing crossed.
	pub async fn retile_if_regretful(&self, name: &str) -> Result<bool> {
		let Some(accumulator) = self.regret_accumulator(name) else {
			return Ok(false);
		};
		let layouts = accumulator.lock().new_gop_layouts()?;
		if layouts.is_empty() {
			return Ok(false);
		}

		let (source, configuration) = {
			let videos = self.videos.lock();
			let video = videos
				.get(name)
				.with_context(|| format!("video {name:?} was not stored through this manager"))?;
			(video.source.clone(), video.configuration)
		};
		let gop_length = configuration.gop_length;

		log::debug!("re-tiling {} GOPs of {name:?}", layouts.len());

		// Re-tile whole GOPs: every frame of each prescribed GOP is decoded
		// from the original ingest, ascending.
		let gops: Vec<u32> = layouts.keys().copied().collect();
		let frames: Vec<u32> = gops
			.iter()
			.flat_map(|gop| gop_frame_range(*gop, gop_length).iter())
			.collect();

		let provider = Arc::new(ConglomerationLayoutProvider::new(layouts, gop_length));
		let entry = CatalogEntry::open(&self.root, name, "", self.codec)?;
		let decoder = self.decoder_factory.open(
			&source,
			&DecoderConfiguration {
				max_width: round_up_to_coded(configuration.coded_width),
				max_height: round_up_to_coded(configuration.coded_height),
				frames: Some(frames),
			},
		)?;

		TileOperator::new(decoder, provider, entry, self.encoder_factory.clone()).run().await?;

		let mut accumulator = accumulator.lock();
		for gop in gops {
			accumulator.reset_regret_for_gop(gop);
		}
		Ok(true)
	}

	fn configuration_for(&self, name: &str) -> Result<VideoConfiguration> {
		let videos = self.videos.lock();
		match videos.get(name) {
			Some(video) => Ok(video.configuration),
			None => bail!("video {name:?} was not stored through this manager"),
		}
	}
}
