use num_traits::ToPrimitive;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Time and work counters for split search, shared by all threads searching a tree. This is only compiled with the `timing` feature.
#[derive(Debug, Default)]
pub struct Timing {
	pub choose_best_split: TimingDuration,
	pub choose_best_split_for_feature: TimingDuration,
	pub n_candidates: TimingCount,
	pub n_nodes_split: TimingCount,
	pub n_nodes_not_split: TimingCount,
}

#[derive(Default)]
pub struct TimingDuration(AtomicU64);

#[derive(Default)]
pub struct TimingCount(AtomicU64);

impl Timing {
	pub fn new() -> Timing {
		Timing::default()
	}
}

impl TimingDuration {
	pub fn new() -> TimingDuration {
		TimingDuration(AtomicU64::new(0))
	}
	pub fn get(&self) -> Duration {
		Duration::from_nanos(self.0.load(Ordering::Relaxed))
	}
	pub fn inc(&self, value: Duration) -> u64 {
		self.0.fetch_add(
			value.as_nanos().to_u64().unwrap_or(u64::MAX),
			Ordering::Relaxed,
		)
	}
}

impl TimingCount {
	pub fn new() -> TimingCount {
		TimingCount(AtomicU64::new(0))
	}
	pub fn get(&self) -> u64 {
		self.0.load(Ordering::Relaxed)
	}
	pub fn inc(&self, value: usize) -> u64 {
		self.0
			.fetch_add(value.to_u64().unwrap_or(u64::MAX), Ordering::Relaxed)
	}
}

impl std::fmt::Debug for TimingDuration {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{:?}", self.get())
	}
}

impl std::fmt::Debug for TimingCount {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.get())
	}
}
