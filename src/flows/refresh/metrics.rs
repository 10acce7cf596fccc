// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters kept by one [`TokenRefresher`](super::TokenRefresher).
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	attempts: AtomicU64,
	successes: AtomicU64,
	failures: AtomicU64,
	reuses: AtomicU64,
}
impl RefreshMetrics {
	/// Refresh exchanges started, including those rejected before any network call.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Refreshes whose token was stored.
	pub fn successes(&self) -> u64 {
		self.successes.load(Ordering::Relaxed)
	}

	/// Refreshes that failed.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	/// Access-token lookups served from the stored token without an exchange.
	pub fn reuses(&self) -> u64 {
		self.reuses.load(Ordering::Relaxed)
	}

	/// Point-in-time copy of every counter.
	pub fn snapshot(&self) -> RefreshMetricsSnapshot {
		RefreshMetricsSnapshot {
			attempts: self.attempts(),
			successes: self.successes(),
			failures: self.failures(),
			reuses: self.reuses(),
		}
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self) {
		self.successes.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failures.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_reuse(&self) {
		self.reuses.fetch_add(1, Ordering::Relaxed);
	}
}

/// Values returned by [`RefreshMetrics::snapshot`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RefreshMetricsSnapshot {
	/// See [`RefreshMetrics::attempts`].
	pub attempts: u64,
	/// See [`RefreshMetrics::successes`].
	pub successes: u64,
	/// See [`RefreshMetrics::failures`].
	pub failures: u64,
	/// See [`RefreshMetrics::reuses`].
	pub reuses: u64,
}
