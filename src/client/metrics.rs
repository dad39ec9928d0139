//! Per-client call counters.

// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for one client's calls.
#[derive(Debug, Default)]
pub struct ClientMetrics {
	attempts: AtomicU64,
	retries: AtomicU64,
	recoveries: AtomicU64,
	rate_limited: AtomicU64,
	success: AtomicU64,
	failure: AtomicU64,
}
impl ClientMetrics {
	/// Returns the number of transport attempts, retries included.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of scheduled retries.
	pub fn retries(&self) -> u64 {
		self.retries.load(Ordering::Relaxed)
	}

	/// Returns the number of credential recovery cycles.
	pub fn recoveries(&self) -> u64 {
		self.recoveries.load(Ordering::Relaxed)
	}

	/// Returns the number of rate-limited responses.
	pub fn rate_limited(&self) -> u64 {
		self.rate_limited.load(Ordering::Relaxed)
	}

	/// Returns the number of logical calls that succeeded.
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Returns the number of logical calls that failed.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_retry(&self) {
		self.retries.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_recovery(&self) {
		self.recoveries.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_rate_limited(&self) {
		self.rate_limited.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self) {
		self.success.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failure.fetch_add(1, Ordering::Relaxed);
	}
}
