/*!
This module defines `GradStats`, the sum of gradients and hessians for a set of training examples, and `GradientSum`, the trait the gain calculus uses to read any such statistic.
*/

use std::iter::Sum;
use std::ops::{AddAssign, Sub};

/// Anything that exposes a sum of gradients and a sum of hessians can be fed to the gain calculus.
pub trait GradientSum {
	fn grad(&self) -> f64;
	fn hess(&self) -> f64;
}

/// The gradient and hessian of the loss for a single training example.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GradientPair {
	pub grad: f32,
	pub hess: f32,
}

impl GradientPair {
	pub fn new(grad: f32, hess: f32) -> GradientPair {
		GradientPair { grad, hess }
	}
}

impl GradientSum for GradientPair {
	fn grad(&self) -> f64 {
		f64::from(self.grad)
	}
	fn hess(&self) -> f64 {
		f64::from(self.hess)
	}
}

impl GradientSum for (f64, f64) {
	fn grad(&self) -> f64 {
		self.0
	}
	fn hess(&self) -> f64 {
		self.1
	}
}

/**
`GradStats` tracks the sum of gradients and the sum of hessians for the examples in a histogram bin, a candidate child, or a whole node.

The layout is fixed at two `f64`s with 16 byte alignment and no padding, so a `Vec<GradStats>` is a contiguous array that a reduction transport can sum element by element. Combining stats is commutative and associative up to floating point rounding. Summing the same values in a different grouping, for example with a different number of threads, can change the last bits of the result, so bit for bit reproducibility across thread counts is not guaranteed.
*/
#[repr(C, align(16))]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GradStats {
	pub sum_grad: f64,
	pub sum_hess: f64,
}

const _: () = assert!(std::mem::size_of::<GradStats>() == 16);
const _: () = assert!(std::mem::align_of::<GradStats>() == 16);

impl GradStats {
	pub fn new(sum_grad: f64, sum_hess: f64) -> GradStats {
		GradStats { sum_grad, sum_hess }
	}

	/// Add the gradient and hessian of one example.
	#[inline]
	pub fn add(&mut self, grad: f64, hess: f64) {
		self.sum_grad += grad;
		self.sum_hess += hess;
	}

	#[inline]
	pub fn add_pair(&mut self, pair: GradientPair) {
		self.add(f64::from(pair.grad), f64::from(pair.hess));
	}

	#[inline]
	pub fn add_stats(&mut self, other: &GradStats) {
		self.add(other.sum_grad, other.sum_hess);
	}

	/// Merge `src` into `dst`. This is the operation a distributed all-reduce applies to each element.
	#[inline]
	pub fn reduce(dst: &mut GradStats, src: &GradStats) {
		dst.add_stats(src);
	}

	/// Set `self` to `a - b`. The histogram layer uses this to get a sibling's stats from its parent's stats without another pass over the examples.
	#[inline]
	pub fn set_subtract(&mut self, a: &GradStats, b: &GradStats) {
		self.sum_grad = a.sum_grad - b.sum_grad;
		self.sum_hess = a.sum_hess - b.sum_hess;
	}

	/// Stats are empty if no hessian has been accumulated.
	#[inline]
	pub fn is_empty(&self) -> bool {
		self.sum_hess == 0.0
	}
}

impl GradientSum for GradStats {
	fn grad(&self) -> f64 {
		self.sum_grad
	}
	fn hess(&self) -> f64 {
		self.sum_hess
	}
}

impl From<GradientPair> for GradStats {
	fn from(pair: GradientPair) -> GradStats {
		GradStats::new(f64::from(pair.grad), f64::from(pair.hess))
	}
}

impl std::ops::Add for GradStats {
	type Output = GradStats;
	fn add(mut self, other: GradStats) -> GradStats {
		self.add_stats(&other);
		self
	}
}

impl AddAssign for GradStats {
	fn add_assign(&mut self, other: GradStats) {
		self.add_stats(&other);
	}
}

impl AddAssign<GradientPair> for GradStats {
	fn add_assign(&mut self, pair: GradientPair) {
		self.add_pair(pair);
	}
}

impl Sub for GradStats {
	type Output = GradStats;
	fn sub(self, other: GradStats) -> GradStats {
		let mut output = GradStats::default();
		output.set_subtract(&self, &other);
		output
	}
}

impl Sum for GradStats {
	fn sum<I: Iterator<Item = GradStats>>(iter: I) -> GradStats {
		iter.fold(GradStats::default(), |a, b| a + b)
	}
}

impl<'a> Sum<&'a GradStats> for GradStats {
	fn sum<I: Iterator<Item = &'a GradStats>>(iter: I) -> GradStats {
		iter.fold(GradStats::default(), |a, b| a + *b)
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use approx::assert_abs_diff_eq;
	use proptest::prelude::*;

	fn stats() -> impl Strategy<Value = GradStats> {
		(-1e3f64..1e3, 0f64..1e3).prop_map(|(g, h)| GradStats::new(g, h))
	}

	#[test]
	fn test_add_and_empty() {
		let mut stats = GradStats::default();
		assert!(stats.is_empty());
		stats.add(-0.5, 0.25);
		stats.add_pair(GradientPair::new(1.5, 0.75));
		assert!(!stats.is_empty());
		assert_eq!(stats, GradStats::new(1.0, 1.0));
		// A gradient with zero hessian still counts as empty.
		let only_grad = GradStats::new(3.0, 0.0);
		assert!(only_grad.is_empty());
	}

	#[test]
	fn test_reduce_and_subtract() {
		let mut total = GradStats::new(1.0, 2.0);
		GradStats::reduce(&mut total, &GradStats::new(3.0, 4.0));
		assert_eq!(total, GradStats::new(4.0, 6.0));
		let mut right = GradStats::default();
		right.set_subtract(&total, &GradStats::new(1.0, 2.0));
		assert_eq!(right, GradStats::new(3.0, 4.0));
	}

	#[test]
	fn test_sum_of_pairs() {
		let pairs = [
			GradientPair::new(0.5, 1.0),
			GradientPair::new(-1.5, 1.0),
			GradientPair::new(2.0, 0.5),
		];
		let stats: GradStats = pairs.iter().copied().map(GradStats::from).sum();
		assert_eq!(stats, GradStats::new(1.0, 2.5));
		assert_eq!(stats.grad(), 1.0);
		assert_eq!((1.0f64, 2.5f64).hess(), stats.hess());
	}

	proptest! {
		#[test]
		fn test_add_is_associative(a in stats(), b in stats(), c in stats()) {
			let left = (a + b) + c;
			let right = a + (b + c);
			assert_abs_diff_eq!(left.sum_grad, right.sum_grad, epsilon = 1e-9);
			assert_abs_diff_eq!(left.sum_hess, right.sum_hess, epsilon = 1e-9);
		}

		#[test]
		fn test_subtract_undoes_add(a in stats(), b in stats()) {
			let mut recovered = GradStats::default();
			recovered.set_subtract(&(a + b), &b);
			assert_abs_diff_eq!(recovered.sum_grad, a.sum_grad, epsilon = 1e-9);
			assert_abs_diff_eq!(recovered.sum_hess, a.sum_hess, epsilon = 1e-9);
		}
	}
}
