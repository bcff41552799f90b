//! Workloads and the cost model scoring a layout against them.
//!
//! Inter-frame-coded tiles can only be decoded from their GOP's keyframe, so
//! the cost of touching a tile at frame `f` is the whole prefix
//! `[keyframe, f]` of that tile's stream. Per GOP, only the *latest* frame
//! at which a tile is still touched matters.

use crate::{SemanticDataManager, TileLayoutProvider};
use anyhow::Result;
use std::{collections::HashMap, sync::Arc};
use vidtiles_core::{CostElements, gop_for_frame, keyframe_for_frame};

/// One selection in a workload, weighted by how often it runs.
pub struct WorkloadQuery {
	pub semantic: Arc<SemanticDataManager>,
	pub multiplier: u32,
}

/// A list of weighted selections against one catalog entry.
pub struct Workload {
	queries: Vec<WorkloadQuery>,
}

impl Workload {
	#[must_use]
	pub fn new(queries: Vec<WorkloadQuery>) -> Workload {
		Workload { queries }
	}

	/// A workload of one query executed once.
	#[must_use]
	pub fn single(semantic: Arc<SemanticDataManager>) -> Workload {
		Workload {
			queries: vec![WorkloadQuery { semantic, multiplier: 1 }],
		}
	}

	#[must_use]
	pub fn queries(&self) -> &[WorkloadQuery] {
		&self.queries
	}
}

/// Estimates the pixels decoded and tiles read by a workload under the
/// layouts a provider prescribes.
pub struct WorkloadCostEstimator {
	provider: Arc<dyn TileLayoutProvider>,
	gop_length: u32,
}

impl WorkloadCostEstimator {
	#[must_use]
	pub fn new(provider: Arc<dyn TileLayoutProvider>, gop_length: u32) -> WorkloadCostEstimator {
		WorkloadCostEstimator { provider, gop_length }
	}

	/// Estimates one query's cost; when `cost_by_gop` is given, also records
	/// the unscaled per-GOP contributions.
	pub fn estimate_cost_for_query(
		&self,
		query: &WorkloadQuery,
		mut cost_by_gop: Option<&mut HashMap<u32, CostElements>>,
	) -> Result<CostElements> {
		let frames = query.semantic.ordered_frames()?;
		let mut total = CostElements::default();

		let mut index = 0;
		while index < frames.len() {
			let (gop, cost, next_index) = self.estimate_cost_for_next_gop(&frames, index, &query.semantic)?;
			total += cost;
			if let Some(by_gop) = cost_by_gop.as_deref_mut() {
				by_gop.insert(gop, cost);
			}
			index = next_index;
		}

		Ok(total.scaled(u64::from(query.multiplier)))
	}

	/// Estimates a whole workload's cost.
	pub fn estimate_cost_for_workload(&self, workload: &Workload) -> Result<CostElements> {
		let mut total = CostElements::default();
		for query in workload.queries() {
			total += self.estimate_cost_for_query(query, None)?;
		}
		Ok(total)
	}

	/// Consumes the run of `frames[index..]` falling into one GOP and scores
	/// it: each tile still touched at frame `f` costs the prefix
	/// `[keyframe, f]` of its stream.
	fn estimate_cost_for_next_gop(
		&self,
		frames: &[u32],
		mut index: usize,
		semantic: &SemanticDataManager,
	) -> Result<(u32, CostElements, usize)> {
		let first_frame = frames[index];
		let gop = gop_for_frame(first_frame, self.gop_length);
		let keyframe = keyframe_for_frame(first_frame, self.gop_length);
		let layout = self.provider.layout_for_frame(first_frame)?;

		let number_of_tiles = layout.number_of_tiles();
		let mut max_frame_touching_tile: Vec<Option<u32>> = vec![None; number_of_tiles as usize];

		while index < frames.len() && gop_for_frame(frames[index], self.gop_length) == gop {
			let frame = frames[index];
			let rectangles = semantic.rectangles_for_frame(frame)?;
			for tile in 0..number_of_tiles {
				let tile_rectangle = layout.rectangle_for_tile(tile);
				if rectangles.iter().any(|rectangle| tile_rectangle.intersects(rectangle)) {
					max_frame_touching_tile[tile as usize] = Some(frame);
				}
			}
			index += 1;
		}

		let mut cost = CostElements::default();
		for tile in 0..number_of_tiles {
			let Some(max_frame) = max_frame_touching_tile[tile as usize] else {
				continue;
			};
			let frames_decoded = u64::from(max_frame - keyframe + 1);
			cost.num_tiles += frames_decoded;
			cost.num_pixels += layout.rectangle_for_tile(tile).area() * frames_decoded;
		}

		Ok((gop, cost, index))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::mock::MockSemanticIndex;
	use crate::providers::{ConglomerationLayoutProvider, SingleLayoutProvider};
	use std::collections::BTreeMap;
	use vidtiles_core::{MetadataPredicate, ObjectBox, TileLayout};

	fn manager(boxes: Vec<ObjectBox>) -> Result<Arc<SemanticDataManager>> {
		let mut index = MockSemanticIndex::new();
		for object in boxes {
			index = index.with_box(object);
		}
		Ok(Arc::new(SemanticDataManager::new(
			Arc::new(index),
			"labels",
			MetadataPredicate::AnyObject,
			None,
		)?))
	}

	#[test]
	fn single_tile_cost_runs_from_the_keyframe() -> Result<()> {
		// One object on frame 10; the whole frame is one 960x544 tile.
		let semantic = manager(vec![ObjectBox::new(10, "car", 0, 0, 100, 100)])?;
		let estimator = WorkloadCostEstimator::new(Arc::new(SingleLayoutProvider::new(960, 544)), 30);

		let mut by_gop = HashMap::new();
		let cost = estimator.estimate_cost_for_query(
			&WorkloadQuery { semantic, multiplier: 1 },
			Some(&mut by_gop),
		)?;

		// Frames 0..=10 of the single tile.
		assert_eq!(cost, CostElements::new(960 * 544 * 11, 11));
		assert_eq!(by_gop.get(&0), Some(&cost));
		Ok(())
	}

	#[test]
	fn untouched_tiles_cost_nothing() -> Result<()> {
		// The object stays inside the left tile of a two-tile layout.
		let semantic = manager(vec![
			ObjectBox::new(0, "car", 0, 0, 100, 100),
			ObjectBox::new(4, "car", 100, 100, 100, 100),
		])?;
		let layout = Arc::new(TileLayout::new(2, 1, vec![480, 480], vec![544])?);
		let provider = ConglomerationLayoutProvider::new(BTreeMap::from([(0, layout)]), 30);
		let estimator = WorkloadCostEstimator::new(Arc::new(provider), 30);

		let cost = estimator.estimate_cost_for_query(&WorkloadQuery { semantic, multiplier: 1 }, None)?;

		// Left tile decoded for frames 0..=4; right tile never touched.
		assert_eq!(cost, CostElements::new(480 * 544 * 5, 5));
		Ok(())
	}

	#[test]
	fn per_gop_costs_are_independent() -> Result<()> {
		let semantic = manager(vec![
			ObjectBox::new(5, "car", 0, 0, 100, 100),
			ObjectBox::new(35, "car", 0, 0, 100, 100),
		])?;
		let estimator = WorkloadCostEstimator::new(Arc::new(SingleLayoutProvider::new(960, 544)), 30);

		let mut by_gop = HashMap::new();
		estimator.estimate_cost_for_query(&WorkloadQuery { semantic, multiplier: 1 }, Some(&mut by_gop))?;

		// GOP 0 decodes frames 0..=5, GOP 1 decodes frames 30..=35.
		assert_eq!(by_gop.get(&0), Some(&CostElements::new(960 * 544 * 6, 6)));
		assert_eq!(by_gop.get(&1), Some(&CostElements::new(960 * 544 * 6, 6)));
		Ok(())
	}

	#[test]
	fn multiplier_scales_the_query_cost() -> Result<()> {
		let semantic = manager(vec![ObjectBox::new(0, "car", 0, 0, 100, 100)])?;
		let estimator = WorkloadCostEstimator::new(Arc::new(SingleLayoutProvider::new(960, 544)), 30);

		let cost = estimator.estimate_cost_for_query(
			&WorkloadQuery {
				semantic: semantic.clone(),
				multiplier: 4,
			},
			None,
		)?;
		assert_eq!(cost, CostElements::new(960 * 544 * 4, 4));
		Ok(())
	}

	#[test]
	fn adding_a_query_never_decreases_workload_cost() -> Result<()> {
		let first = manager(vec![ObjectBox::new(3, "car", 0, 0, 100, 100)])?;
		let second = manager(vec![ObjectBox::new(7, "car", 500, 0, 100, 100)])?;
		let estimator = WorkloadCostEstimator::new(Arc::new(SingleLayoutProvider::new(960, 544)), 30);

		let smaller = estimator.estimate_cost_for_workload(&Workload::single(first.clone()))?;
		let larger = estimator.estimate_cost_for_workload(&Workload::new(vec![
			WorkloadQuery {
				semantic: first,
				multiplier: 1,
			},
			WorkloadQuery {
				semantic: second,
				multiplier: 1,
			},
		]))?;

		assert!(larger.num_pixels >= smaller.num_pixels);
		assert!(larger.num_tiles >= smaller.num_tiles);
		Ok(())
	}

	#[test]
	fn empty_selection_costs_nothing() -> Result<()> {
		let semantic = manager(Vec::new())?;
		let estimator = WorkloadCostEstimator::new(Arc::new(SingleLayoutProvider::new(960, 544)), 30);
		let cost = estimator.estimate_cost_for_query(&WorkloadQuery { semantic, multiplier: 1 }, None)?;
		assert_eq!(cost, CostElements::default());
		Ok(())
	}
}
