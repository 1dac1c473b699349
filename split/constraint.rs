/*!
This module implements monotonic constraints. Every node carries a `ValueConstraint`, the interval its leaf weight must stay within. When a node is split on a feature with a monotonic constraint, the midpoint of the two children's weights becomes a bound on each child, so no descendant on either side can cross it.
*/

use crate::{
	gain::{calc_gain_given_weight, calc_weight_stats, GainParam},
	param::{Monotonicity, TrainParam},
	stats::GradStats,
};

/// The gain of a candidate split, or `Infeasible` if taking the split would violate a monotonic constraint.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SplitGain {
	Feasible(f64),
	Infeasible,
}

impl SplitGain {
	pub fn feasible(self) -> Option<f64> {
		match self {
			SplitGain::Feasible(gain) => Some(gain),
			SplitGain::Infeasible => None,
		}
	}

	pub fn is_feasible(self) -> bool {
		matches!(self, SplitGain::Feasible(_))
	}
}

/// The interval of admissible leaf weights for a node. The root is unbounded.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ValueConstraint {
	pub lower_bound: f64,
	pub upper_bound: f64,
}

impl Default for ValueConstraint {
	fn default() -> ValueConstraint {
		ValueConstraint {
			lower_bound: f64::NEG_INFINITY,
			upper_bound: f64::INFINITY,
		}
	}
}

impl ValueConstraint {
	/// Compute the leaf weight for `stats`, clamped to this constraint's interval.
	pub fn calc_weight<P>(&self, param: &P, stats: &GradStats) -> f64
	where
		P: GainParam + ?Sized,
	{
		let w = calc_weight_stats(param, stats);
		if w < self.lower_bound {
			self.lower_bound
		} else if w > self.upper_bound {
			self.upper_bound
		} else {
			w
		}
	}

	/// Compute the gain for `stats` at the constrained leaf weight.
	pub fn calc_gain<P>(&self, param: &P, stats: &GradStats) -> f64
	where
		P: GainParam + ?Sized,
	{
		calc_gain_given_weight(
			param,
			stats.sum_grad,
			stats.sum_hess,
			self.calc_weight(param, stats),
		)
	}

	/// Compute the sum of the constrained gains of the two children of a candidate split. The split is infeasible if the children's weights are ordered against the feature's monotonicity.
	pub fn calc_split_gain<P>(
		&self,
		param: &P,
		monotonicity: Monotonicity,
		left: &GradStats,
		right: &GradStats,
	) -> SplitGain
	where
		P: GainParam + ?Sized,
	{
		let left_weight = self.calc_weight(param, left);
		let right_weight = self.calc_weight(param, right);
		let gain = calc_gain_given_weight(param, left.sum_grad, left.sum_hess, left_weight)
			+ calc_gain_given_weight(param, right.sum_grad, right.sum_hess, right_weight);
		let feasible = match monotonicity {
			Monotonicity::None => true,
			Monotonicity::Increasing => left_weight <= right_weight,
			Monotonicity::Decreasing => left_weight >= right_weight,
		};
		if feasible {
			SplitGain::Feasible(gain)
		} else {
			SplitGain::Infeasible
		}
	}

	/**
	Derive the constraints for the left and right children of a split on `split_index`. Both children start with this node's interval. If the feature is monotonic, the midpoint of the children's weights bounds the child that must stay below it from above and the other child from below.

	# Panics

	Panics if the midpoint is NaN. This means the stats are corrupt, and continuing would silently grow a wrong tree.
	*/
	pub fn set_child(
		&self,
		param: &TrainParam,
		split_index: usize,
		left: &GradStats,
		right: &GradStats,
	) -> (ValueConstraint, ValueConstraint) {
		let mut left_constraint = *self;
		let mut right_constraint = *self;
		let monotonicity = param.monotone_constraint(split_index);
		if monotonicity == Monotonicity::None {
			return (left_constraint, right_constraint);
		}
		let left_weight = self.calc_weight(param, left);
		let right_weight = self.calc_weight(param, right);
		let mid = (left_weight + right_weight) / 2.0;
		assert!(
			!mid.is_nan(),
			"monotonic constraint midpoint is NaN for feature {}: left {:?}, right {:?}",
			split_index,
			left,
			right,
		);
		match monotonicity {
			Monotonicity::Increasing => {
				left_constraint.upper_bound = mid;
				right_constraint.lower_bound = mid;
			}
			Monotonicity::Decreasing => {
				left_constraint.lower_bound = mid;
				right_constraint.upper_bound = mid;
			}
			Monotonicity::None => unreachable!(),
		}
		(left_constraint, right_constraint)
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::config::TrainParamConfig;
	use approx::assert_abs_diff_eq;
	use proptest::prelude::*;

	fn param() -> TrainParam {
		TrainParam::new(TrainParamConfig {
			min_child_weight: Some(0.0),
			reg_lambda: Some(1.0),
			monotone_constraints: Some(vec![1, -1, 0]),
			..Default::default()
		})
		.unwrap()
	}

	#[test]
	fn test_clamped_weight() {
		let param = param();
		let constraint = ValueConstraint {
			lower_bound: -0.1,
			upper_bound: 0.2,
		};
		// The unconstrained weight is 4 / 11.
		let stats = GradStats::new(-4.0, 10.0);
		assert_eq!(constraint.calc_weight(&param, &stats), 0.2);
		let expected = -(2.0 * -4.0 * 0.2 + 11.0 * 0.2 * 0.2);
		assert_abs_diff_eq!(constraint.calc_gain(&param, &stats), expected, epsilon = 1e-12);
		// The root is unbounded, so its gain is the closed form.
		assert_abs_diff_eq!(
			ValueConstraint::default().calc_gain(&param, &stats),
			16.0 / 11.0,
			epsilon = 1e-12
		);
	}

	#[test]
	fn test_monotonicity_veto() {
		let param = param();
		let root = ValueConstraint::default();
		// The left child wants a large positive weight and the right child a large negative one.
		let left = GradStats::new(-100.0, 1.0);
		let right = GradStats::new(100.0, 1.0);
		let unconstrained = root.calc_split_gain(&param, Monotonicity::None, &left, &right);
		assert_abs_diff_eq!(unconstrained.feasible().unwrap(), 10000.0, epsilon = 1e-9);
		assert_eq!(
			root.calc_split_gain(&param, Monotonicity::Increasing, &left, &right),
			SplitGain::Infeasible
		);
		assert!(root
			.calc_split_gain(&param, Monotonicity::Decreasing, &left, &right)
			.is_feasible());
		assert!(root
			.calc_split_gain(&param, Monotonicity::Increasing, &right, &left)
			.is_feasible());
	}

	#[test]
	fn test_set_child() {
		let param = param();
		let root = ValueConstraint::default();
		let left = GradStats::new(2.0, 1.0);
		let right = GradStats::new(-4.0, 1.0);
		// The weights are -1 and 2, so the midpoint is 0.5.
		let (increasing_left, increasing_right) = root.set_child(&param, 0, &left, &right);
		assert_eq!(increasing_left.lower_bound, f64::NEG_INFINITY);
		assert_eq!(increasing_left.upper_bound, 0.5);
		assert_eq!(increasing_right.lower_bound, 0.5);
		assert_eq!(increasing_right.upper_bound, f64::INFINITY);
		let (decreasing_left, decreasing_right) = root.set_child(&param, 1, &left, &right);
		assert_eq!(decreasing_left.lower_bound, 0.5);
		assert_eq!(decreasing_right.upper_bound, 0.5);
		let (left_constraint, right_constraint) = root.set_child(&param, 2, &left, &right);
		assert_eq!(left_constraint, root);
		assert_eq!(right_constraint, root);
		// Features past the end of the table are unconstrained.
		assert_eq!(root.set_child(&param, 10, &left, &right), (root, root));
	}

	#[test]
	#[should_panic(expected = "midpoint is NaN")]
	fn test_set_child_nan() {
		let param = param();
		let left = GradStats::new(f64::NAN, 1.0);
		let right = GradStats::new(1.0, 1.0);
		ValueConstraint::default().set_child(&param, 0, &left, &right);
	}

	proptest! {
		#[test]
		fn test_children_never_widen(
			lower in -10f64..0.0,
			width in 0f64..20.0,
			feature in 0usize..3,
			left_grad in -100f64..100.0,
			left_hess in 0.5f64..50.0,
			right_grad in -100f64..100.0,
			right_hess in 0.5f64..50.0,
		) {
			let param = param();
			let parent = ValueConstraint {
				lower_bound: lower,
				upper_bound: lower + width,
			};
			let left = GradStats::new(left_grad, left_hess);
			let right = GradStats::new(right_grad, right_hess);
			let (left_constraint, right_constraint) = parent.set_child(&param, feature, &left, &right);
			for child in [left_constraint, right_constraint].iter() {
				prop_assert!(child.lower_bound >= parent.lower_bound);
				prop_assert!(child.upper_bound <= parent.upper_bound);
				prop_assert!(child.lower_bound <= child.upper_bound);
			}
		}
	}
}
