/*!
This module defines `TrainParam`, the validated and immutable set of hyperparameters consumed by every other module in this crate.
*/

use crate::config::TrainParamConfig;
use thiserror::Error;

/// This error is returned when a configuration cannot be turned into a `TrainParam`.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("{field} must be finite, got {value}")]
	NotFinite { field: &'static str, value: f64 },
	#[error("{field} must be in {domain}, got {value}")]
	OutOfRange {
		field: &'static str,
		value: f64,
		domain: &'static str,
	},
	#[error("monotone constraint for feature {feature} must be -1, 0 or 1, got {value}")]
	InvalidMonotoneConstraint { feature: usize, value: i32 },
	#[error("interaction constraint group {group} is empty")]
	EmptyInteractionGroup { group: usize },
	#[error("interaction constraint group {group} contains feature {feature} more than once")]
	DuplicateInteractionFeature { group: usize, feature: usize },
	#[error("sketch_ratio / sketch_eps must be in [1, 4294967295], got {sketch_ratio} / {sketch_eps}")]
	SketchSizeOutOfRange { sketch_ratio: f32, sketch_eps: f32 },
	#[error("invalid configuration: {0}")]
	Json(#[from] serde_json::Error),
}

/// The order in which nodes are expanded when growing a tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Deserialize)]
pub enum GrowPolicy {
	/// Split the nodes closest to the root first.
	#[serde(rename = "depthwise")]
	DepthWise,
	/// Split the nodes with the highest loss change first.
	#[serde(rename = "lossguide")]
	LossGuide,
}

/// Which child examples with a missing value for the split feature are sent to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Deserialize)]
pub enum DefaultDirection {
	/// Try both directions and keep whichever produces the better split.
	#[serde(rename = "learn")]
	Learn,
	#[serde(rename = "left")]
	Left,
	#[serde(rename = "right")]
	Right,
}

/// The required relationship between a feature and the model output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Monotonicity {
	/// The output must be non-increasing in the feature.
	Decreasing,
	None,
	/// The output must be non-decreasing in the feature.
	Increasing,
}

impl Monotonicity {
	pub fn from_sign(sign: i32) -> Option<Monotonicity> {
		match sign {
			-1 => Some(Monotonicity::Decreasing),
			0 => Some(Monotonicity::None),
			1 => Some(Monotonicity::Increasing),
			_ => None,
		}
	}

	pub fn sign(self) -> i32 {
		match self {
			Monotonicity::Decreasing => -1,
			Monotonicity::None => 0,
			Monotonicity::Increasing => 1,
		}
	}
}

/**
Interaction constraints restrict which features may appear together on the path from the root to a leaf. Each group is a set of features that are allowed to interact with each other.
*/
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InteractionConstraints {
	groups: Vec<Vec<usize>>,
}

impl InteractionConstraints {
	pub fn new(groups: Vec<Vec<usize>>) -> Result<InteractionConstraints, ConfigError> {
		for (group_index, group) in groups.iter().enumerate() {
			if group.is_empty() {
				return Err(ConfigError::EmptyInteractionGroup { group: group_index });
			}
			let mut sorted = group.clone();
			sorted.sort_unstable();
			if let Some(window) = sorted.windows(2).find(|window| window[0] == window[1]) {
				return Err(ConfigError::DuplicateInteractionFeature {
					group: group_index,
					feature: window[0],
				});
			}
		}
		Ok(InteractionConstraints { groups })
	}

	pub fn groups(&self) -> &[Vec<usize>] {
		&self.groups
	}

	pub fn is_empty(&self) -> bool {
		self.groups.is_empty()
	}

	/// Determine whether `feature` may be split on at a node whose ancestors split on `used_features`. Any feature may be used at the root. Below the root, the feature must share a group with every feature already used.
	pub fn is_allowed(&self, used_features: &[usize], feature: usize) -> bool {
		if self.groups.is_empty() || used_features.is_empty() {
			return true;
		}
		self.groups.iter().any(|group| {
			group.contains(&feature) && used_features.iter().all(|used| group.contains(used))
		})
	}
}

/**
`TrainParam` holds the hyperparameters for growing a tree. It can only be built with [`TrainParam::new`], which validates every field against its domain, so code holding a `TrainParam` never has to check it again. There are no setters.
*/
#[derive(Clone, Debug, PartialEq)]
pub struct TrainParam {
	learning_rate: f32,
	min_split_loss: f32,
	max_depth: usize,
	max_leaves: usize,
	max_bin: usize,
	grow_policy: GrowPolicy,
	min_child_weight: f32,
	reg_lambda: f32,
	reg_alpha: f32,
	default_direction: DefaultDirection,
	max_delta_step: f32,
	subsample: f32,
	colsample_bynode: f32,
	colsample_bylevel: f32,
	colsample_bytree: f32,
	opt_dense_col: f32,
	sketch_eps: f32,
	sketch_ratio: f32,
	size_leaf_vector: usize,
	monotone_constraints: Vec<Monotonicity>,
	interaction_constraints: InteractionConstraints,
	sparse_threshold: f64,
	enable_feature_grouping: usize,
	max_conflict_rate: f64,
	max_search_group: usize,
}

impl Default for TrainParam {
	fn default() -> TrainParam {
		TrainParam {
			learning_rate: 0.3,
			min_split_loss: 0.0,
			max_depth: 6,
			max_leaves: 0,
			max_bin: 256,
			grow_policy: GrowPolicy::DepthWise,
			min_child_weight: 1.0,
			reg_lambda: 1.0,
			reg_alpha: 0.0,
			default_direction: DefaultDirection::Learn,
			max_delta_step: 0.0,
			subsample: 1.0,
			colsample_bynode: 1.0,
			colsample_bylevel: 1.0,
			colsample_bytree: 1.0,
			opt_dense_col: 1.0,
			sketch_eps: 0.03,
			sketch_ratio: 2.0,
			size_leaf_vector: 0,
			monotone_constraints: Vec::new(),
			interaction_constraints: InteractionConstraints::default(),
			sparse_threshold: 0.2,
			enable_feature_grouping: 0,
			max_conflict_rate: 0.0,
			max_search_group: 100,
		}
	}
}

impl TrainParam {
	/// Validate `config` and fill in defaults for any fields it leaves out.
	pub fn new(config: TrainParamConfig) -> Result<TrainParam, ConfigError> {
		let default = TrainParam::default();
		let max_bin = config.max_bin.unwrap_or(default.max_bin);
		if max_bin < 2 {
			return Err(ConfigError::OutOfRange {
				field: "max_bin",
				value: max_bin as f64,
				domain: "[2, inf)",
			});
		}
		let monotone_constraints = config
			.monotone_constraints
			.unwrap_or_default()
			.into_iter()
			.enumerate()
			.map(|(feature, value)| {
				Monotonicity::from_sign(value)
					.ok_or(ConfigError::InvalidMonotoneConstraint { feature, value })
			})
			.collect::<Result<Vec<_>, _>>()?;
		let interaction_constraints =
			InteractionConstraints::new(config.interaction_constraints.unwrap_or_default())?;
		let sketch_eps = unit_interval("sketch_eps", config.sketch_eps, default.sketch_eps)?;
		let sketch_ratio = non_negative("sketch_ratio", config.sketch_ratio, default.sketch_ratio)?;
		// The quantile sketch needs room for at least one entry, and its size must fit in a u32.
		let size = sketch_size(sketch_ratio, sketch_eps);
		if !(size >= 1.0 && size <= f64::from(u32::MAX)) {
			return Err(ConfigError::SketchSizeOutOfRange {
				sketch_ratio,
				sketch_eps,
			});
		}
		let param = TrainParam {
			learning_rate: non_negative("learning_rate", config.learning_rate, default.learning_rate)?,
			min_split_loss: non_negative(
				"min_split_loss",
				config.min_split_loss,
				default.min_split_loss,
			)?,
			max_depth: config.max_depth.unwrap_or(default.max_depth),
			max_leaves: config.max_leaves.unwrap_or(default.max_leaves),
			max_bin,
			grow_policy: config.grow_policy.unwrap_or(default.grow_policy),
			min_child_weight: non_negative(
				"min_child_weight",
				config.min_child_weight,
				default.min_child_weight,
			)?,
			reg_lambda: non_negative("reg_lambda", config.reg_lambda, default.reg_lambda)?,
			reg_alpha: non_negative("reg_alpha", config.reg_alpha, default.reg_alpha)?,
			default_direction: config
				.default_direction
				.unwrap_or(default.default_direction),
			max_delta_step: non_negative(
				"max_delta_step",
				config.max_delta_step,
				default.max_delta_step,
			)?,
			subsample: unit_interval("subsample", config.subsample, default.subsample)?,
			colsample_bynode: unit_interval(
				"colsample_bynode",
				config.colsample_bynode,
				default.colsample_bynode,
			)?,
			colsample_bylevel: unit_interval(
				"colsample_bylevel",
				config.colsample_bylevel,
				default.colsample_bylevel,
			)?,
			colsample_bytree: unit_interval(
				"colsample_bytree",
				config.colsample_bytree,
				default.colsample_bytree,
			)?,
			opt_dense_col: unit_interval("opt_dense_col", config.opt_dense_col, default.opt_dense_col)?,
			sketch_eps,
			sketch_ratio,
			size_leaf_vector: config.size_leaf_vector.unwrap_or(default.size_leaf_vector),
			monotone_constraints,
			interaction_constraints,
			sparse_threshold: unit_interval(
				"sparse_threshold",
				config.sparse_threshold,
				default.sparse_threshold,
			)?,
			enable_feature_grouping: config
				.enable_feature_grouping
				.unwrap_or(default.enable_feature_grouping),
			max_conflict_rate: unit_interval(
				"max_conflict_rate",
				config.max_conflict_rate,
				default.max_conflict_rate,
			)?,
			max_search_group: config.max_search_group.unwrap_or(default.max_search_group),
		};
		log::debug!(
			"train param: reg_lambda = {}, reg_alpha = {}, max_delta_step = {}, min_child_weight = {}, {} monotone constraints, {} interaction groups",
			param.reg_lambda,
			param.reg_alpha,
			param.max_delta_step,
			param.min_child_weight,
			param.monotone_constraints.len(),
			param.interaction_constraints.groups().len(),
		);
		Ok(param)
	}

	pub fn from_json(json: &str) -> Result<TrainParam, ConfigError> {
		TrainParam::new(TrainParamConfig::from_json(json)?)
	}

	/// Determine whether missing values should be scanned from small to big values for a column, which means they go right. Dense columns skip this search unless the default direction is forced right.
	pub fn need_forward_search(&self, col_density: f32, is_indicator: bool) -> bool {
		self.default_direction == DefaultDirection::Right
			|| (self.default_direction == DefaultDirection::Learn
				&& col_density < self.opt_dense_col
				&& !is_indicator)
	}

	/// Determine whether missing values should be scanned from big to small values for a column, which means they go left.
	pub fn need_backward_search(&self, _col_density: f32, _is_indicator: bool) -> bool {
		self.default_direction != DefaultDirection::Right
	}

	/// A split whose loss change falls below `min_split_loss` must be discarded even if it is the best one found.
	pub fn need_prune(&self, loss_chg: f64, _depth: usize) -> bool {
		loss_chg < f64::from(self.min_split_loss)
	}

	/// A node whose sum of hessians is below twice `min_child_weight` can never produce two valid children.
	pub fn cannot_split(&self, sum_hess: f64, _depth: usize) -> bool {
		sum_hess < f64::from(self.min_child_weight) * 2.0
	}

	/// The maximum number of entries in a quantile sketch. `TrainParam::new` checks that this is at least 1 and fits in a `u32`.
	pub fn max_sketch_size(&self) -> u32 {
		sketch_size(self.sketch_ratio, self.sketch_eps) as u32
	}

	/// Get the monotonicity for a feature. Features past the end of the monotone constraint table are unconstrained.
	pub fn monotone_constraint(&self, feature_index: usize) -> Monotonicity {
		self.monotone_constraints
			.get(feature_index)
			.copied()
			.unwrap_or(Monotonicity::None)
	}

	pub fn monotone_constraints(&self) -> &[Monotonicity] {
		&self.monotone_constraints
	}

	pub fn interaction_constraints(&self) -> &InteractionConstraints {
		&self.interaction_constraints
	}

	pub fn learning_rate(&self) -> f32 {
		self.learning_rate
	}

	pub fn min_split_loss(&self) -> f32 {
		self.min_split_loss
	}

	/// 0 means no limit.
	pub fn max_depth(&self) -> usize {
		self.max_depth
	}

	/// 0 means no limit.
	pub fn max_leaves(&self) -> usize {
		self.max_leaves
	}

	pub fn max_bin(&self) -> usize {
		self.max_bin
	}

	pub fn grow_policy(&self) -> GrowPolicy {
		self.grow_policy
	}

	pub fn min_child_weight(&self) -> f32 {
		self.min_child_weight
	}

	pub fn reg_lambda(&self) -> f32 {
		self.reg_lambda
	}

	pub fn reg_alpha(&self) -> f32 {
		self.reg_alpha
	}

	pub fn default_direction(&self) -> DefaultDirection {
		self.default_direction
	}

	/// 0 means leaf weights are not clipped.
	pub fn max_delta_step(&self) -> f32 {
		self.max_delta_step
	}

	pub fn subsample(&self) -> f32 {
		self.subsample
	}

	pub fn colsample_bynode(&self) -> f32 {
		self.colsample_bynode
	}

	pub fn colsample_bylevel(&self) -> f32 {
		self.colsample_bylevel
	}

	pub fn colsample_bytree(&self) -> f32 {
		self.colsample_bytree
	}

	pub fn opt_dense_col(&self) -> f32 {
		self.opt_dense_col
	}

	pub fn sketch_eps(&self) -> f32 {
		self.sketch_eps
	}

	pub fn sketch_ratio(&self) -> f32 {
		self.sketch_ratio
	}

	pub fn size_leaf_vector(&self) -> usize {
		self.size_leaf_vector
	}

	pub fn sparse_threshold(&self) -> f64 {
		self.sparse_threshold
	}

	pub fn enable_feature_grouping(&self) -> usize {
		self.enable_feature_grouping
	}

	pub fn max_conflict_rate(&self) -> f64 {
		self.max_conflict_rate
	}

	pub fn max_search_group(&self) -> usize {
		self.max_search_group
	}
}

fn sketch_size(sketch_ratio: f32, sketch_eps: f32) -> f64 {
	f64::from(sketch_ratio) / f64::from(sketch_eps)
}

fn finite<T>(field: &'static str, value: T) -> Result<T, ConfigError>
where
	T: num_traits::Float + Into<f64>,
{
	if value.is_finite() {
		Ok(value)
	} else {
		Err(ConfigError::NotFinite {
			field,
			value: value.into(),
		})
	}
}

fn non_negative<T>(field: &'static str, value: Option<T>, default: T) -> Result<T, ConfigError>
where
	T: num_traits::Float + Into<f64>,
{
	let value = finite(field, value.unwrap_or(default))?;
	if value < T::zero() {
		return Err(ConfigError::OutOfRange {
			field,
			value: value.into(),
			domain: "[0, inf)",
		});
	}
	Ok(value)
}

fn unit_interval<T>(field: &'static str, value: Option<T>, default: T) -> Result<T, ConfigError>
where
	T: num_traits::Float + Into<f64>,
{
	let value = finite(field, value.unwrap_or(default))?;
	if value < T::zero() || value > T::one() {
		return Err(ConfigError::OutOfRange {
			field,
			value: value.into(),
			domain: "[0, 1]",
		});
	}
	Ok(value)
}

#[cfg(test)]
mod test {
	use super::*;

	fn param(config: TrainParamConfig) -> TrainParam {
		TrainParam::new(config).unwrap()
	}

	#[test]
	fn test_defaults() {
		let param = param(TrainParamConfig::default());
		assert_eq!(param, TrainParam::default());
		assert_eq!(param.max_sketch_size(), 66);
		assert_eq!(param.monotone_constraint(3), Monotonicity::None);
	}

	#[test]
	fn test_search_directions() {
		let learn = param(TrainParamConfig {
			opt_dense_col: Some(0.5),
			..Default::default()
		});
		assert!(learn.need_forward_search(0.2, false));
		// Dense columns skip the forward search.
		assert!(!learn.need_forward_search(0.9, false));
		assert!(!learn.need_forward_search(0.2, true));
		assert!(learn.need_backward_search(0.2, false));
		let right = param(TrainParamConfig {
			default_direction: Some(DefaultDirection::Right),
			..Default::default()
		});
		assert!(right.need_forward_search(1.0, true));
		assert!(!right.need_backward_search(1.0, true));
		let left = param(TrainParamConfig {
			default_direction: Some(DefaultDirection::Left),
			..Default::default()
		});
		assert!(!left.need_forward_search(0.0, false));
		assert!(left.need_backward_search(0.0, false));
	}

	#[test]
	fn test_prune_and_cannot_split() {
		let param = param(TrainParamConfig {
			min_split_loss: Some(0.5),
			min_child_weight: Some(2.0),
			..Default::default()
		});
		assert!(param.need_prune(0.25, 3));
		assert!(!param.need_prune(0.5, 3));
		assert!(param.cannot_split(3.9, 0));
		assert!(!param.cannot_split(4.0, 0));
	}

	#[test]
	fn test_monotone_constraints() {
		let param = param(TrainParamConfig {
			monotone_constraints: Some(vec![1, 0, -1]),
			..Default::default()
		});
		assert_eq!(param.monotone_constraint(0), Monotonicity::Increasing);
		assert_eq!(param.monotone_constraint(1), Monotonicity::None);
		assert_eq!(param.monotone_constraint(2), Monotonicity::Decreasing);
		assert_eq!(param.monotone_constraint(2).sign(), -1);
	}

	#[test]
	fn test_interaction_constraints() {
		let constraints = InteractionConstraints::new(vec![vec![0, 1], vec![1, 2, 3]]).unwrap();
		assert!(constraints.is_allowed(&[], 4));
		assert!(constraints.is_allowed(&[0], 1));
		assert!(!constraints.is_allowed(&[0], 2));
		assert!(constraints.is_allowed(&[1], 3));
		assert!(constraints.is_allowed(&[2, 1], 3));
		assert!(!constraints.is_allowed(&[0, 1], 3));
		assert!(InteractionConstraints::default().is_allowed(&[0, 5], 9));
	}

	#[test]
	fn test_errors() {
		let error = |config: TrainParamConfig| TrainParam::new(config).unwrap_err().to_string();
		insta::assert_snapshot!(error(TrainParamConfig {
			reg_lambda: Some(-1.0),
			..Default::default()
		}), @"reg_lambda must be in [0, inf), got -1");
		insta::assert_snapshot!(error(TrainParamConfig {
			subsample: Some(1.5),
			..Default::default()
		}), @"subsample must be in [0, 1], got 1.5");
		insta::assert_snapshot!(error(TrainParamConfig {
			max_delta_step: Some(f32::NAN),
			..Default::default()
		}), @"max_delta_step must be finite, got NaN");
		insta::assert_snapshot!(error(TrainParamConfig {
			max_bin: Some(1),
			..Default::default()
		}), @"max_bin must be in [2, inf), got 1");
		insta::assert_snapshot!(error(TrainParamConfig {
			monotone_constraints: Some(vec![0, 2]),
			..Default::default()
		}), @"monotone constraint for feature 1 must be -1, 0 or 1, got 2");
		insta::assert_snapshot!(error(TrainParamConfig {
			sketch_eps: Some(0.0),
			..Default::default()
		}), @"sketch_ratio / sketch_eps must be in [1, 4294967295], got 2 / 0");
		insta::assert_snapshot!(error(TrainParamConfig {
			interaction_constraints: Some(vec![vec![0, 1], vec![]]),
			..Default::default()
		}), @"interaction constraint group 1 is empty");
		insta::assert_snapshot!(error(TrainParamConfig {
			interaction_constraints: Some(vec![vec![3, 1, 3]]),
			..Default::default()
		}), @"interaction constraint group 0 contains feature 3 more than once");
	}

	#[test]
	fn test_sketch_size_bounds() {
		// The ratio is finite but too big for a u32.
		let error = TrainParam::new(TrainParamConfig {
			sketch_eps: Some(1e-10),
			..Default::default()
		})
		.unwrap_err();
		assert!(matches!(error, ConfigError::SketchSizeOutOfRange { .. }));
		// A subnormal epsilon.
		let error = TrainParam::new(TrainParamConfig {
			sketch_eps: Some(1e-45),
			sketch_ratio: Some(1e30),
			..Default::default()
		})
		.unwrap_err();
		assert!(matches!(error, ConfigError::SketchSizeOutOfRange { .. }));
		let error = TrainParam::new(TrainParamConfig {
			sketch_ratio: Some(0.01),
			..Default::default()
		})
		.unwrap_err();
		assert!(matches!(error, ConfigError::SketchSizeOutOfRange { .. }));
		let largest = param(TrainParamConfig {
			sketch_eps: Some(1e-6),
			sketch_ratio: Some(1000.0),
			..Default::default()
		});
		assert!(largest.max_sketch_size() > 900_000_000);
	}

	#[test]
	fn test_from_json() {
		let param = TrainParam::from_json(
			r#"{ "eta": 0.1, "lambda": 0, "max_delta_step": 0.7, "monotone_constraints": [0, 1] }"#,
		)
		.unwrap();
		assert_eq!(param.learning_rate(), 0.1);
		assert_eq!(param.reg_lambda(), 0.0);
		assert_eq!(param.max_delta_step(), 0.7);
		assert_eq!(param.monotone_constraint(1), Monotonicity::Increasing);
	}
}
