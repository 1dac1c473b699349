/*!
This module defines the `TrainParamConfig` struct, which is deserialized from a configuration file and turned into a validated [`TrainParam`](crate::TrainParam) with [`TrainParam::new`](crate::TrainParam::new). Every field is optional. Missing fields take their default value.
*/

use crate::param::{ConfigError, DefaultDirection, GrowPolicy};

#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize)]
pub struct TrainParamConfig {
	#[serde(alias = "eta")]
	pub learning_rate: Option<f32>,
	#[serde(alias = "gamma")]
	pub min_split_loss: Option<f32>,
	pub max_depth: Option<usize>,
	pub max_leaves: Option<usize>,
	pub max_bin: Option<usize>,
	pub grow_policy: Option<GrowPolicy>,
	pub min_child_weight: Option<f32>,
	#[serde(alias = "lambda")]
	pub reg_lambda: Option<f32>,
	#[serde(alias = "alpha")]
	pub reg_alpha: Option<f32>,
	pub default_direction: Option<DefaultDirection>,
	pub max_delta_step: Option<f32>,
	pub subsample: Option<f32>,
	pub colsample_bynode: Option<f32>,
	pub colsample_bylevel: Option<f32>,
	pub colsample_bytree: Option<f32>,
	pub opt_dense_col: Option<f32>,
	pub sketch_eps: Option<f32>,
	pub sketch_ratio: Option<f32>,
	pub size_leaf_vector: Option<usize>,
	pub monotone_constraints: Option<Vec<i32>>,
	pub interaction_constraints: Option<Vec<Vec<usize>>>,
	pub sparse_threshold: Option<f64>,
	pub enable_feature_grouping: Option<usize>,
	pub max_conflict_rate: Option<f64>,
	pub max_search_group: Option<usize>,
}

impl TrainParamConfig {
	pub fn from_json(json: &str) -> Result<TrainParamConfig, ConfigError> {
		let config = serde_json::from_str(json)?;
		Ok(config)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_aliases() {
		let config = TrainParamConfig::from_json(
			r#"{ "eta": 0.1, "gamma": 0.5, "lambda": 2, "alpha": 0.25 }"#,
		)
		.unwrap();
		assert_eq!(config.learning_rate, Some(0.1));
		assert_eq!(config.min_split_loss, Some(0.5));
		assert_eq!(config.reg_lambda, Some(2.0));
		assert_eq!(config.reg_alpha, Some(0.25));
		assert_eq!(config.max_depth, None);
	}

	#[test]
	fn test_enums_and_tables() {
		let config = TrainParamConfig::from_json(
			r#"{
				"grow_policy": "lossguide",
				"default_direction": "right",
				"monotone_constraints": [1, 0, -1],
				"interaction_constraints": [[0, 1], [2, 3, 4]]
			}"#,
		)
		.unwrap();
		assert_eq!(config.grow_policy, Some(GrowPolicy::LossGuide));
		assert_eq!(config.default_direction, Some(DefaultDirection::Right));
		assert_eq!(config.monotone_constraints, Some(vec![1, 0, -1]));
		assert_eq!(
			config.interaction_constraints,
			Some(vec![vec![0, 1], vec![2, 3, 4]])
		);
	}

	#[test]
	fn test_invalid_json() {
		let error = TrainParamConfig::from_json(r#"{ "grow_policy": "breadthwise" }"#).unwrap_err();
		assert!(matches!(error, ConfigError::Json(_)));
	}
}
