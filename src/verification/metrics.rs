// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for verification token outcomes.
#[derive(Debug, Default)]
pub struct VerificationMetrics {
	issued: AtomicU64,
	redeemed: AtomicU64,
	rejected: AtomicU64,
}
impl VerificationMetrics {
	/// Returns the number of tokens issued.
	pub fn issued(&self) -> u64 {
		self.issued.load(Ordering::Relaxed)
	}

	/// Returns the number of successful redemptions.
	pub fn redeemed(&self) -> u64 {
		self.redeemed.load(Ordering::Relaxed)
	}

	/// Returns the number of redemptions or inspections refused for token reasons.
	pub fn rejected(&self) -> u64 {
		self.rejected.load(Ordering::Relaxed)
	}

	pub(crate) fn record_issued(&self) {
		self.issued.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_redeemed(&self) {
		self.redeemed.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_rejected(&self) {
		self.rejected.fetch_add(1, Ordering::Relaxed);
	}
}
