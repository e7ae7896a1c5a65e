//! Admission decisions and retry hints emitted by the rate limiter.

// self
use crate::_prelude::*;

/// Result emitted by [`RateLimiter::try_acquire`](crate::rate_limit::RateLimiter::try_acquire).
#[derive(Clone, Debug, PartialEq)]
pub enum RateLimitDecision {
	/// The request may proceed immediately.
	Admitted {
		/// Whole tokens left after this admission; `None` when the store failed and the policy
		/// admitted the request blindly.
		remaining: Option<u64>,
	},
	/// The request must be turned away.
	Rejected(RetryDirective),
}
impl RateLimitDecision {
	/// Returns `true` when the request was admitted.
	pub fn is_admitted(&self) -> bool {
		matches!(self, Self::Admitted { .. })
	}
}

/// Advises callers when to retry after a [`RateLimitDecision::Rejected`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryDirective {
	/// Instant when it is safe to retry.
	pub earliest_retry_at: OffsetDateTime,
	/// Suggested backoff duration.
	pub recommended_backoff: Duration,
	/// Optional descriptive string.
	pub reason: Option<String>,
}
impl RetryDirective {
	/// Creates a new directive with the provided timing metadata.
	pub fn new(earliest_retry_at: OffsetDateTime, recommended_backoff: Duration) -> Self {
		Self { earliest_retry_at, recommended_backoff, reason: None }
	}

	/// Adds a human-readable reason.
	pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
		self.reason = Some(reason.into());

		self
	}

	/// Whole seconds suitable for a `Retry-After` header (rounded up, at least 1).
	pub fn retry_after_secs(&self) -> u64 {
		let secs = self.recommended_backoff.as_seconds_f64().ceil();

		if secs < 1. { 1 } else { secs as u64 }
	}
}
