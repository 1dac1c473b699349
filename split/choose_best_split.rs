#[cfg(feature = "timing")]
use crate::timing::Timing;
use crate::{
	constraint::{SplitGain, ValueConstraint},
	entry::SplitEntry,
	param::{Monotonicity, TrainParam},
	stats::GradStats,
};
use rayon::prelude::*;

/**
A `FeatureHistogram` holds the sum of gradients and hessians for the examples in a node whose value for a feature falls in each bin. Bin `i` holds values in `[cuts[i], cuts[i + 1])`, so there is one more cut than there are bins. Examples with a missing value are not in any bin. Their stats are the node's total minus the sum over the bins.
*/
#[derive(Clone, Debug)]
pub struct FeatureHistogram {
	bins: Vec<GradStats>,
	cuts: Vec<f32>,
}

impl FeatureHistogram {
	/// # Panics
	///
	/// Panics if `cuts` does not have exactly one more entry than `bins`.
	pub fn new(bins: Vec<GradStats>, cuts: Vec<f32>) -> FeatureHistogram {
		assert_eq!(
			cuts.len(),
			bins.len() + 1,
			"a histogram with {} bins needs {} cuts",
			bins.len(),
			bins.len() + 1,
		);
		FeatureHistogram { bins, cuts }
	}

	pub fn bins(&self) -> &[GradStats] {
		&self.bins
	}

	/// Bin `i` holds values in `[cuts[i], cuts[i + 1])`.
	pub fn cuts(&self) -> &[f32] {
		&self.cuts
	}
}

pub struct ChooseBestSplitOptions<'a> {
	/// (n_features)
	pub histograms: &'a [FeatureHistogram],
	/// The sum of gradients and hessians for all examples in the node, including those with missing values.
	pub sum: GradStats,
	pub depth: usize,
	pub constraint: ValueConstraint,
	/// The features split on by this node's ancestors. These restrict the features this node may split on when there are interaction constraints.
	pub used_features: &'a [usize],
	#[cfg(feature = "timing")]
	pub timing: &'a Timing,
	pub train_param: &'a TrainParam,
}

pub enum ChooseBestSplitOutput {
	Success(ChooseBestSplitSuccess),
	Failure(ChooseBestSplitFailure),
}

#[derive(Debug)]
pub struct ChooseBestSplitSuccess {
	pub split: SplitEntry,
	pub left_constraint: ValueConstraint,
	pub right_constraint: ValueConstraint,
}

#[derive(Debug)]
pub struct ChooseBestSplitFailure {
	pub sum: GradStats,
	/// The weight of the leaf this node becomes, before it is scaled by the learning rate.
	pub weight: f64,
}

const MIN_FEATURES_TO_PARALLELIZE: usize = 16;

/// The sum of hessians of the missing values may dip below zero by this fraction of the node's sum of hessians.
const MISSING_HESSIAN_TOLERANCE: f64 = 1e-9;

/// Find the split with the highest loss change across all features, if a valid one exists.
pub fn choose_best_split(options: ChooseBestSplitOptions) -> ChooseBestSplitOutput {
	let ChooseBestSplitOptions {
		histograms,
		sum,
		depth,
		constraint,
		used_features,
		train_param,
		..
	} = options;
	#[cfg(feature = "timing")]
	let timing = options.timing;
	#[cfg(feature = "timing")]
	let start = std::time::Instant::now();
	assert!(
		sum.sum_hess >= 0.0,
		"node sum of hessians must be non-negative, got {:?}",
		sum,
	);

	// A node that cannot produce two children with enough hessian becomes a leaf without searching.
	if train_param.cannot_split(sum.sum_hess, depth) {
		#[cfg(feature = "timing")]
		timing.n_nodes_not_split.inc(1);
		return ChooseBestSplitOutput::Failure(ChooseBestSplitFailure {
			sum,
			weight: constraint.calc_weight(train_param, &sum),
		});
	}

	let split = choose_best_split_for_features(
		histograms,
		sum,
		&constraint,
		used_features,
		#[cfg(feature = "timing")]
		timing,
		train_param,
		histograms.len() >= MIN_FEATURES_TO_PARALLELIZE,
	);
	#[cfg(feature = "timing")]
	timing.choose_best_split.inc(start.elapsed());

	// The empty record has a loss change of zero, so a positive loss change means some candidate was accepted.
	let loss_chg = f64::from(split.loss_chg);
	if split.loss_chg <= 0.0 || train_param.need_prune(loss_chg, depth) {
		log::trace!(
			"no split at depth {}: best loss change {} on feature {}",
			depth,
			split.loss_chg,
			split.split_index(),
		);
		#[cfg(feature = "timing")]
		timing.n_nodes_not_split.inc(1);
		return ChooseBestSplitOutput::Failure(ChooseBestSplitFailure {
			sum,
			weight: constraint.calc_weight(train_param, &sum),
		});
	}
	let (left_constraint, right_constraint) = constraint.set_child(
		train_param,
		split.split_index(),
		&split.left_sum,
		&split.right_sum,
	);
	log::trace!(
		"split at depth {} on feature {} at {} with loss change {}, missing values go {:?}",
		depth,
		split.split_index(),
		split.split_value,
		split.loss_chg,
		split.default_direction(),
	);
	#[cfg(feature = "timing")]
	timing.n_nodes_split.inc(1);
	ChooseBestSplitOutput::Success(ChooseBestSplitSuccess {
		split,
		left_constraint,
		right_constraint,
	})
}

/// Choose the best split for each feature and merge the results. Each feature is scanned by a single thread, and the per feature records are merged with `SplitEntry::reduce`, so the result does not depend on `parallel`.
#[allow(clippy::too_many_arguments)]
fn choose_best_split_for_features(
	histograms: &[FeatureHistogram],
	sum: GradStats,
	constraint: &ValueConstraint,
	used_features: &[usize],
	#[cfg(feature = "timing")] timing: &Timing,
	train_param: &TrainParam,
	parallel: bool,
) -> SplitEntry {
	let node_gain = constraint.calc_gain(train_param, &sum);
	let interaction_constraints = train_param.interaction_constraints();
	let choose = |(feature_index, histogram): (usize, &FeatureHistogram)| {
		if !interaction_constraints.is_allowed(used_features, feature_index) {
			return SplitEntry::default();
		}
		choose_best_split_for_feature(
			feature_index,
			histogram,
			sum,
			node_gain,
			constraint,
			#[cfg(feature = "timing")]
			timing,
			train_param,
		)
	};
	let merge = |mut best: SplitEntry, candidate: SplitEntry| {
		SplitEntry::reduce(&mut best, &candidate);
		best
	};
	if parallel {
		histograms
			.par_iter()
			.enumerate()
			.map(choose)
			.reduce(SplitEntry::default, merge)
	} else {
		histograms
			.iter()
			.enumerate()
			.map(choose)
			.fold(SplitEntry::default(), merge)
	}
}

/// Choose the best split for a feature by scanning its bins from small to big values, which sends missing values right, and from big to small values, which sends them left.
fn choose_best_split_for_feature(
	feature_index: usize,
	histogram: &FeatureHistogram,
	sum: GradStats,
	node_gain: f64,
	constraint: &ValueConstraint,
	#[cfg(feature = "timing")] timing: &Timing,
	train_param: &TrainParam,
) -> SplitEntry {
	#[cfg(feature = "timing")]
	let start = std::time::Instant::now();
	let FeatureHistogram { bins, cuts } = histogram;
	if let Some((bin_index, bin)) = bins
		.iter()
		.enumerate()
		.find(|(_, bin)| !(bin.sum_hess >= 0.0))
	{
		panic!(
			"bin {} of feature {} has a negative sum of hessians: {:?}",
			bin_index, feature_index, bin,
		);
	}
	let mut best = SplitEntry::default();
	let n_bins = bins.len();
	if n_bins == 0 {
		return best;
	}
	let present: GradStats = bins.iter().sum();
	// The missing bucket is derived by subtraction, so allow for rounding.
	let missing = sum - present;
	assert!(
		missing.sum_hess >= -MISSING_HESSIAN_TOLERANCE * sum.sum_hess.max(1.0),
		"missing values of feature {} have a negative sum of hessians: node {:?}, bins {:?}",
		feature_index,
		sum,
		present,
	);
	let col_density = if sum.sum_hess > 0.0 {
		(present.sum_hess / sum.sum_hess) as f32
	} else {
		1.0
	};
	// A feature with a single bin can only separate missing from present values.
	let is_indicator = n_bins == 1;
	let candidate = Candidate {
		feature_index,
		monotonicity: train_param.monotone_constraint(feature_index),
		sum,
		node_gain,
		constraint,
		train_param,
	};
	let forward = train_param.need_forward_search(col_density, is_indicator);
	let backward = train_param.need_backward_search(col_density, is_indicator);
	if forward {
		let mut left = GradStats::default();
		for (bin, split_value) in bins.iter().zip(&cuts[1..]) {
			left.add_stats(bin);
			candidate.evaluate(&mut best, left, *split_value, false);
		}
	}
	if backward {
		let mut right = GradStats::default();
		for (bin, split_value) in bins.iter().zip(&cuts[..n_bins]).rev() {
			right.add_stats(bin);
			candidate.evaluate(&mut best, sum - right, *split_value, true);
		}
	}
	#[cfg(feature = "timing")]
	{
		timing
			.n_candidates
			.inc((usize::from(forward) + usize::from(backward)) * n_bins);
		timing.choose_best_split_for_feature.inc(start.elapsed());
	}
	best
}

/// The parts of a candidate split that are the same for every threshold on a feature.
struct Candidate<'a> {
	feature_index: usize,
	monotonicity: Monotonicity,
	sum: GradStats,
	node_gain: f64,
	constraint: &'a ValueConstraint,
	train_param: &'a TrainParam,
}

impl<'a> Candidate<'a> {
	/// Compute the loss change for sending `left` to the left child and the rest of the node to the right child, and record it in `best` if it is better.
	#[inline]
	fn evaluate(&self, best: &mut SplitEntry, left: GradStats, split_value: f32, default_left: bool) {
		let right = self.sum - left;
		let min_child_weight = f64::from(self.train_param.min_child_weight());
		if left.sum_hess < min_child_weight || right.sum_hess < min_child_weight {
			return;
		}
		let split_gain =
			self.constraint
				.calc_split_gain(self.train_param, self.monotonicity, &left, &right);
		if let SplitGain::Feasible(gain) = split_gain {
			best.update(
				(gain - self.node_gain) as f32,
				self.feature_index,
				split_value,
				default_left,
				left,
				right,
			);
		}
	}
}
