// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for limiter decisions.
#[derive(Debug, Default)]
pub struct RateLimitMetrics {
	admitted: AtomicU64,
	rejected: AtomicU64,
	store_errors: AtomicU64,
}
impl RateLimitMetrics {
	/// Returns the number of admitted requests (including fail-open admissions).
	pub fn admitted(&self) -> u64 {
		self.admitted.load(Ordering::Relaxed)
	}

	/// Returns the number of rejected requests.
	pub fn rejected(&self) -> u64 {
		self.rejected.load(Ordering::Relaxed)
	}

	/// Returns the number of decisions taken by the store-error policy.
	pub fn store_errors(&self) -> u64 {
		self.store_errors.load(Ordering::Relaxed)
	}

	pub(crate) fn record_admitted(&self) {
		self.admitted.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_rejected(&self) {
		self.rejected.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_store_error(&self) {
		self.store_errors.fetch_add(1, Ordering::Relaxed);
	}
}
