//! The `RegretAccumulator`: per-GOP bookkeeping of how many pixels each
//! candidate layout would have saved, and the re-tile decision it drives.

use crate::{TileLayoutProvider, WorkloadCostEstimator, WorkloadQuery, Workload};
use anyhow::Result;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use vidtiles_core::{TileLayout, gop_frame_range};

/// One user-supplied candidate layout policy, e.g. "cluster-by-car".
pub struct RegretCandidate {
	pub identifier: String,
	pub provider: Arc<dyn TileLayoutProvider>,
}

impl RegretCandidate {
	#[must_use]
	pub fn new(identifier: &str, provider: Arc<dyn TileLayoutProvider>) -> RegretCandidate {
		RegretCandidate {
			identifier: identifier.to_string(),
			provider,
		}
	}
}

/// Accumulates, per GOP and candidate, the pixels the current layout wasted
/// against that candidate, and decides when a GOP is worth re-tiling.
///
/// A candidate's ledger grows by `cost(current) − cost(candidate)` pixels
/// (clipped at zero) each time a query runs. Once a ledger reaches
/// `threshold × pixels-per-GOP`, the GOP should be re-tiled to that
/// candidate's layout.
pub struct RegretAccumulator {
	candidates: Vec<RegretCandidate>,
	gop_length: u32,
	gop_size_in_pixels: u64,
	threshold: f64,
	gop_to_regret: HashMap<u32, HashMap<String, i64>>,
}

impl RegretAccumulator {
	#[must_use]
	pub fn new(
		candidates: Vec<RegretCandidate>,
		width: u32,
		height: u32,
		gop_length: u32,
		threshold: f64,
	) -> RegretAccumulator {
		RegretAccumulator {
			candidates,
			gop_length,
			gop_size_in_pixels: u64::from(width) * u64::from(height) * u64::from(gop_length),
			threshold,
			gop_to_regret: HashMap::new(),
		}
	}

	/// The candidate identifiers, in their supplied order.
	#[must_use]
	pub fn layout_identifiers(&self) -> Vec<&str> {
		self.candidates.iter().map(|candidate| candidate.identifier.as_str()).collect()
	}

	/// Adds raw regret pixels to one candidate's ledger for one GOP.
	pub fn add_regret_to_gop(&mut self, gop: u32, regret: i64, identifier: &str) {
		*self
			.gop_to_regret
			.entry(gop)
			.or_default()
			.entry(identifier.to_string())
			.or_insert(0) += regret;
	}

	/// Scores an executed query against every candidate and banks the
	/// positive per-GOP differences.
	pub fn add_regret_for_query(&mut self, workload: &Workload, current: Arc<dyn TileLayoutProvider>) -> Result<()> {
		for query in workload.queries() {
			self.add_regret_for_single_query(query, current.clone())?;
		}
		Ok(())
	}

	fn add_regret_for_single_query(&mut self, query: &WorkloadQuery, current: Arc<dyn TileLayoutProvider>) -> Result<()> {
		let mut current_by_gop = HashMap::new();
		WorkloadCostEstimator::new(current, self.gop_length).estimate_cost_for_query(query, Some(&mut current_by_gop))?;

		for candidate in &self.candidates {
			let mut candidate_by_gop = HashMap::new();
			WorkloadCostEstimator::new(candidate.provider.clone(), self.gop_length)
				.estimate_cost_for_query(query, Some(&mut candidate_by_gop))?;

			for (gop, current_cost) in &current_by_gop {
				let candidate_cost = candidate_by_gop.get(gop).copied().unwrap_or_default();
				let difference = current_cost.num_pixels as i64 - candidate_cost.num_pixels as i64;
				if difference > 0 {
					log::trace!(
						"gop {gop}: {} pixels of regret towards {:?}",
						difference,
						candidate.identifier
					);
					*self
						.gop_to_regret
						.entry(*gop)
						.or_default()
						.entry(candidate.identifier.clone())
						.or_insert(0) += difference;
				}
			}
		}
		Ok(())
	}

	/// Decides whether `gop` should be re-tiled, and to which candidate.
	///
	/// The winning candidate's ledger must reach `threshold × pixels-per-GOP`;
	/// ties break towards larger regret, then lexicographically smaller
	/// identifier.
	#[must_use]
	pub fn should_retile_gop(&self, gop: u32) -> Option<&str> {
		let ledgers = self.gop_to_regret.get(&gop)?;

		let mut best: Option<(&str, i64)> = None;
		for candidate in &self.candidates {
			let regret = ledgers.get(&candidate.identifier).copied().unwrap_or(0);
			let better = match best {
				None => true,
				Some((best_id, best_regret)) => {
					regret > best_regret || (regret == best_regret && candidate.identifier.as_str() < best_id)
				}
			};
			if better {
				best = Some((candidate.identifier.as_str(), regret));
			}
		}

		let (identifier, regret) = best?;
		if regret as f64 >= self.threshold * self.gop_size_in_pixels as f64 {
			Some(identifier)
		} else {
			None
		}
	}

	/// Zeroes every candidate's ledger for `gop`; called right after a
	/// re-tile of that GOP commits.
	pub fn reset_regret_for_gop(&mut self, gop: u32) {
		if let Some(ledgers) = self.gop_to_regret.get_mut(&gop) {
			for regret in ledgers.values_mut() {
				*regret = 0;
			}
		}
	}

	/// The provider of one candidate, by identifier.
	#[must_use]
	pub fn provider_for_identifier(&self, identifier: &str) -> Option<Arc<dyn TileLayoutProvider>> {
		self
			.candidates
			.iter()
			.find(|candidate| candidate.identifier == identifier)
			.map(|candidate| candidate.provider.clone())
	}

	/// The per-GOP layout plan for every GOP past its threshold, ready to
	/// feed a conglomeration provider.
	pub fn new_gop_layouts(&self) -> Result<BTreeMap<u32, Arc<TileLayout>>> {
		let mut layouts = BTreeMap::new();
		for gop in self.gop_to_regret.keys() {
			let Some(identifier) = self.should_retile_gop(*gop) else {
				continue;
			};
			let provider = self
				.provider_for_identifier(identifier)
				.expect("winning identifier is always a candidate");
			let first_frame = gop_frame_range(*gop, self.gop_length).first;
			layouts.insert(*gop, provider.layout_for_frame(first_frame)?);
		}
		Ok(layouts)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::SemanticDataManager;
	use crate::mock::MockSemanticIndex;
	use crate::providers::{GroupedLayoutProvider, SingleLayoutProvider};
	use vidtiles_core::{MetadataPredicate, ObjectBox};

	fn accumulator_with_labels(labels: &[&str]) -> RegretAccumulator {
		let candidates = labels
			.iter()
			.map(|label| RegretCandidate::new(label, Arc::new(SingleLayoutProvider::new(1920, 1080)) as Arc<dyn TileLayoutProvider>))
			.collect();
		RegretAccumulator::new(candidates, 1920, 1080, 30, 0.5)
	}

	#[test]
	fn threshold_crossing_picks_the_heavier_candidate() {
		let mut accumulator = accumulator_with_labels(&["car", "pedestrian"]);

		assert_eq!(accumulator.should_retile_gop(0), None);
		assert_eq!(accumulator.should_retile_gop(10), None);

		// GOP pixels: 1920 * 1080 * 30 = 62,208,000; half of that is the
		// 0.5 threshold boundary.
		let half_gop = 31_104_000i64;

		accumulator.add_regret_to_gop(0, half_gop - 1, "car");
		assert_eq!(accumulator.should_retile_gop(0), None);

		accumulator.add_regret_to_gop(0, half_gop - 1, "pedestrian");
		assert_eq!(accumulator.should_retile_gop(0), None);

		accumulator.add_regret_to_gop(0, 10, "car");
		assert_eq!(accumulator.should_retile_gop(0), Some("car"));
		assert_eq!(accumulator.should_retile_gop(10), None);
	}

	#[test]
	fn exact_ties_break_lexicographically() {
		let mut accumulator = accumulator_with_labels(&["pedestrian", "car"]);
		accumulator.add_regret_to_gop(0, 31_104_000, "pedestrian");
		accumulator.add_regret_to_gop(0, 31_104_000, "car");

		assert_eq!(accumulator.should_retile_gop(0), Some("car"));
	}

	#[test]
	fn reset_zeroes_the_gop_ledger() {
		let mut accumulator = accumulator_with_labels(&["car"]);
		accumulator.add_regret_to_gop(0, 40_000_000, "car");
		assert_eq!(accumulator.should_retile_gop(0), Some("car"));

		accumulator.reset_regret_for_gop(0);
		assert_eq!(accumulator.should_retile_gop(0), None);
		assert_eq!(accumulator.layout_identifiers(), vec!["car"]);
	}

	#[test]
	fn cheaper_candidate_eventually_triggers_a_retile() -> Result<()> {
		// One small object in the top-left corner; the current layout decodes
		// the whole 960x544 frame, the grouped candidate only a corner tile.
		let index = Arc::new(MockSemanticIndex::new().with_box(ObjectBox::new(29, "car", 0, 0, 64, 64)));
		let semantic = Arc::new(SemanticDataManager::new(
			index,
			"labels",
			MetadataPredicate::label("car"),
			None,
		)?);

		let current: Arc<dyn TileLayoutProvider> = Arc::new(SingleLayoutProvider::new(960, 544));
		let candidate: Arc<dyn TileLayoutProvider> =
			Arc::new(GroupedLayoutProvider::new(30, semantic.clone(), 960, 544));

		let mut accumulator = RegretAccumulator::new(
			vec![RegretCandidate::new("cluster-by-car", candidate)],
			960,
			544,
			30,
			0.5,
		);

		let workload = Workload::single(semantic);
		let mut triggered = None;
		for _ in 0..40 {
			accumulator.add_regret_for_query(&workload, current.clone())?;
			if let Some(identifier) = accumulator.should_retile_gop(0) {
				triggered = Some(identifier.to_string());
				break;
			}
		}
		assert_eq!(triggered.as_deref(), Some("cluster-by-car"));

		let layouts = accumulator.new_gop_layouts()?;
		assert!(layouts.contains_key(&0));
		assert!(layouts[&0].number_of_tiles() > 1);
		Ok(())
	}
}
