/*!
This module implements the regularized leaf weight and gain calculus. For a set of examples with sum of gradients `G` and sum of hessians `H`, the second order approximation of the loss after adding `w` to their predictions is `G * w + (H + lambda) * w^2 / 2`, plus `alpha * |w|` when L1 regularization is enabled. The leaf weight minimizes this, and the gain is twice the loss reduction it achieves.
*/

use crate::{param::TrainParam, stats::GradientSum};

/// The regularization settings the gain calculus needs, widened to `f64`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Regularization {
	pub min_child_weight: f64,
	pub reg_lambda: f64,
	pub reg_alpha: f64,
	/// 0 means leaf weights are not clipped.
	pub max_delta_step: f64,
}

/// Anything that can provide `Regularization` settings can parameterize the gain calculus.
pub trait GainParam {
	fn regularization(&self) -> Regularization;
}

impl GainParam for Regularization {
	#[inline]
	fn regularization(&self) -> Regularization {
		*self
	}
}

impl GainParam for TrainParam {
	#[inline]
	fn regularization(&self) -> Regularization {
		Regularization {
			min_child_weight: f64::from(self.min_child_weight()),
			reg_lambda: f64::from(self.reg_lambda()),
			reg_alpha: f64::from(self.reg_alpha()),
			max_delta_step: f64::from(self.max_delta_step()),
		}
	}
}

/// The proximal step for L1 regularization. Values within `alpha` of zero become zero and everything else moves `alpha` closer to zero.
#[inline]
pub fn threshold_l1(w: f64, alpha: f64) -> f64 {
	if w > alpha {
		w - alpha
	} else if w < -alpha {
		w + alpha
	} else {
		0.0
	}
}

/// Compute the gain of moving the predictions for a set of examples by `w`.
#[inline]
pub fn calc_gain_given_weight<P>(param: &P, sum_grad: f64, sum_hess: f64, w: f64) -> f64
where
	P: GainParam + ?Sized,
{
	let reg_lambda = param.regularization().reg_lambda;
	-(2.0 * sum_grad * w + (sum_hess + reg_lambda) * w * w)
}

/// Compute the optimal leaf weight for a set of examples. The weight is 0 if their sum of hessians is below `min_child_weight`.
#[inline]
pub fn calc_weight<P>(param: &P, sum_grad: f64, sum_hess: f64) -> f64
where
	P: GainParam + ?Sized,
{
	let Regularization {
		min_child_weight,
		reg_lambda,
		reg_alpha,
		max_delta_step,
	} = param.regularization();
	if sum_hess < min_child_weight || sum_hess <= 0.0 {
		return 0.0;
	}
	let dw = if reg_alpha == 0.0 {
		-sum_grad / (sum_hess + reg_lambda)
	} else {
		-threshold_l1(sum_grad, reg_alpha) / (sum_hess + reg_lambda)
	};
	if max_delta_step != 0.0 {
		dw.max(-max_delta_step).min(max_delta_step)
	} else {
		dw
	}
}

/// Compute the gain for a set of examples at their optimal leaf weight. The gain is 0 if their sum of hessians is below `min_child_weight`.
#[inline]
pub fn calc_gain<P>(param: &P, sum_grad: f64, sum_hess: f64) -> f64
where
	P: GainParam + ?Sized,
{
	let Regularization {
		min_child_weight,
		reg_lambda,
		reg_alpha,
		max_delta_step,
	} = param.regularization();
	if sum_hess < min_child_weight {
		return 0.0;
	}
	if max_delta_step == 0.0 {
		if reg_alpha == 0.0 {
			sum_grad * sum_grad / (sum_hess + reg_lambda)
		} else {
			let thresholded = threshold_l1(sum_grad, reg_alpha);
			thresholded * thresholded / (sum_hess + reg_lambda)
		}
	} else {
		// Once the weight is clipped the closed form no longer holds, so evaluate the clipped weight and add the L1 penalty back.
		let w = calc_weight(param, sum_grad, sum_hess);
		calc_gain_given_weight(param, sum_grad, sum_hess, w) + reg_alpha * w.abs()
	}
}

#[inline]
pub fn calc_weight_stats<P, S>(param: &P, stats: &S) -> f64
where
	P: GainParam + ?Sized,
	S: GradientSum + ?Sized,
{
	calc_weight(param, stats.grad(), stats.hess())
}

#[inline]
pub fn calc_gain_stats<P, S>(param: &P, stats: &S) -> f64
where
	P: GainParam + ?Sized,
	S: GradientSum + ?Sized,
{
	calc_gain(param, stats.grad(), stats.hess())
}

/**
Compute the gain on `test` stats of the leaf weight fitted to `train` stats. This can be used to estimate how well a leaf generalizes to a held out set. It is experimental and nothing else in this crate depends on it.
*/
pub fn calc_gain_on_test<P, S>(param: &P, train: &S, test: &S) -> f64
where
	P: GainParam + ?Sized,
	S: GradientSum + ?Sized,
{
	let w = calc_weight_stats(param, train);
	let reg_alpha = param.regularization().reg_alpha;
	calc_gain_given_weight(param, test.grad(), test.hess(), w) + reg_alpha * w.abs()
}
