/*!
This crate implements the split gain machinery at the core of gradient boosted tree training in the style of [XGBoost](github.com/dmlc/xgboost): the training parameters and their validation, the regularized leaf weight and gain formulas, accumulation of gradient statistics, monotonic and interaction constraints, the record of the best split found for a node, and a histogram based search for that split.

Split search is designed to be reduced. Results from threads and from workers are merged with the same order independent operations, [`GradStats::reduce`] and [`SplitEntry::reduce`], and [`WireRecord`] gives both records a fixed byte layout so a distributed all-reduce can ship them between workers.
*/

#![allow(clippy::tabs_in_doc_comments)]

mod choose_best_split;
mod codec;
mod config;
mod constraint;
mod entry;
mod gain;
mod param;
mod stats;
#[cfg(feature = "timing")]
mod timing;

pub use self::choose_best_split::{
	choose_best_split, ChooseBestSplitFailure, ChooseBestSplitOptions, ChooseBestSplitOutput,
	ChooseBestSplitSuccess, FeatureHistogram,
};
pub use self::codec::{decode_all, encode_all, reduce_encoded, DecodeError, WireRecord};
pub use self::config::TrainParamConfig;
pub use self::constraint::{SplitGain, ValueConstraint};
pub use self::entry::{SplitDirection, SplitEntry};
pub use self::gain::{
	calc_gain, calc_gain_given_weight, calc_gain_on_test, calc_gain_stats, calc_weight,
	calc_weight_stats, threshold_l1, GainParam, Regularization,
};
pub use self::param::{
	ConfigError, DefaultDirection, GrowPolicy, InteractionConstraints, Monotonicity, TrainParam,
};
pub use self::stats::{GradStats, GradientPair, GradientSum};
#[cfg(feature = "timing")]
pub use self::timing::{Timing, TimingCount, TimingDuration};
