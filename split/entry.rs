/*!
This module defines `SplitEntry`, the record of the best split found so far for a node.
*/

use crate::stats::GradStats;

const DEFAULT_LEFT_BIT: u32 = 1 << 31;
const SPLIT_INDEX_MASK: u32 = DEFAULT_LEFT_BIT - 1;

/// The child that examples with a missing value for the split feature are sent to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SplitDirection {
	Left,
	Right,
}

/**
A `SplitEntry` records the best split seen so far for a node: its loss change, the feature and default direction, the threshold, and the stats of both children so they can seed the children's node totals.

The feature index and default direction are packed into a single `u32`, with the direction in the top bit, so feature indexes must be less than 2^31. This keeps the record small, because split search allocates one per thread per node.

Any number of threads can search for splits independently and merge their records with [`SplitEntry::reduce`]. A candidate replaces the current record if its loss change is strictly greater, or if the loss changes are equal and its feature index is smaller. The result therefore depends only on the set of `(loss_chg, feature)` pairs, not on the order they arrive in. Two candidates on the same feature with equal loss changes keep whichever arrived first, so each feature should be scanned by a single thread.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SplitEntry {
	/// The loss change achieved by this split.
	pub loss_chg: f32,
	sindex: u32,
	/// Examples whose value for the split feature is less than this go left.
	pub split_value: f32,
	pub left_sum: GradStats,
	pub right_sum: GradStats,
}

impl SplitEntry {
	/// Build a record from its encoded parts. This is used when decoding a record received from another worker.
	pub fn from_parts(
		loss_chg: f32,
		sindex: u32,
		split_value: f32,
		left_sum: GradStats,
		right_sum: GradStats,
	) -> SplitEntry {
		SplitEntry {
			loss_chg,
			sindex,
			split_value,
			left_sum,
			right_sum,
		}
	}

	/// Get the packed feature index and default direction.
	pub fn sindex(&self) -> u32 {
		self.sindex
	}

	/// Get the index of the feature to split on.
	#[inline]
	pub fn split_index(&self) -> usize {
		(self.sindex & SPLIT_INDEX_MASK) as usize
	}

	/// Determine whether examples with a missing value go to the left child.
	#[inline]
	pub fn default_left(&self) -> bool {
		(self.sindex & DEFAULT_LEFT_BIT) != 0
	}

	pub fn default_direction(&self) -> SplitDirection {
		if self.default_left() {
			SplitDirection::Left
		} else {
			SplitDirection::Right
		}
	}

	/// Determine whether a candidate with loss change `new_loss_chg` on feature `split_index` should replace this record.
	#[inline]
	pub fn need_replace(&self, new_loss_chg: f32, split_index: usize) -> bool {
		if self.split_index() <= split_index {
			new_loss_chg > self.loss_chg
		} else {
			!(self.loss_chg > new_loss_chg)
		}
	}

	/// Replace this record with the candidate if it is better. Returns whether it was replaced.
	#[inline]
	pub fn update(
		&mut self,
		new_loss_chg: f32,
		split_index: usize,
		new_split_value: f32,
		default_left: bool,
		left_sum: GradStats,
		right_sum: GradStats,
	) -> bool {
		debug_assert!(split_index <= SPLIT_INDEX_MASK as usize);
		if !self.need_replace(new_loss_chg, split_index) {
			return false;
		}
		let mut sindex = split_index as u32;
		if default_left {
			sindex |= DEFAULT_LEFT_BIT;
		}
		self.loss_chg = new_loss_chg;
		self.sindex = sindex;
		self.split_value = new_split_value;
		self.left_sum = left_sum;
		self.right_sum = right_sum;
		true
	}

	/// Replace this record with `other` if it is better. Returns whether it was replaced.
	#[inline]
	pub fn update_from(&mut self, other: &SplitEntry) -> bool {
		if !self.need_replace(other.loss_chg, other.split_index()) {
			return false;
		}
		*self = *other;
		true
	}

	/// Merge `src` into `dst`. This is the operation a distributed all-reduce applies to each record.
	#[inline]
	pub fn reduce(dst: &mut SplitEntry, src: &SplitEntry) {
		dst.update_from(src);
	}
}
