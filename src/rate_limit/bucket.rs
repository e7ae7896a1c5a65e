//! Token-bucket state and the refill/acquire arithmetic shared by every bucket store.

// self
use crate::{_prelude::*, clock, config::RateLimitConfig, error::ConfigError};

/// Validated capacity + refill rate pair.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BucketPolicy {
	capacity: f64,
	refill_rate_per_second: f64,
}
impl BucketPolicy {
	/// Creates a policy after checking that at least one request can ever be admitted.
	pub fn new(capacity: f64, refill_rate_per_second: f64) -> Result<Self, ConfigError> {
		if !capacity.is_finite() || capacity < 1. {
			return Err(ConfigError::InvalidCapacity { capacity });
		}
		if !refill_rate_per_second.is_finite() || refill_rate_per_second <= 0. {
			return Err(ConfigError::InvalidRefillRate { rate: refill_rate_per_second });
		}

		Ok(Self { capacity, refill_rate_per_second })
	}

	/// Maximum burst size.
	pub fn capacity(&self) -> f64 {
		self.capacity
	}

	/// Tokens regenerated per second.
	pub fn refill_rate_per_second(&self) -> f64 {
		self.refill_rate_per_second
	}

	/// Time an idle bucket needs to go from empty to full, saturating at [`Duration::MAX`].
	pub fn full_refill_after(&self) -> Duration {
		clock::saturating_seconds(self.capacity / self.refill_rate_per_second)
	}
}
impl TryFrom<&RateLimitConfig> for BucketPolicy {
	type Error = ConfigError;

	fn try_from(config: &RateLimitConfig) -> Result<Self, Self::Error> {
		Self::new(config.capacity, config.refill_rate_per_second)
	}
}

/// Remaining allowance for one key.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
	/// Remaining allowance, `0 ≤ tokens ≤ capacity`.
	pub tokens: f64,
	/// Instant of the last refill computation.
	pub last_refill_at: OffsetDateTime,
}
impl Bucket {
	/// Creates a full bucket, as seen by the first request from a key.
	pub fn full(policy: &BucketPolicy, now: OffsetDateTime) -> Self {
		Self { tokens: policy.capacity, last_refill_at: now }
	}

	/// Credits the tokens accrued since the last refill, capped at capacity.
	///
	/// A clock that moved backwards credits nothing and leaves `last_refill_at` in place.
	pub fn refill(&mut self, policy: &BucketPolicy, now: OffsetDateTime) {
		let elapsed = (now - self.last_refill_at).as_seconds_f64().max(0.);

		self.tokens =
			(self.tokens + elapsed * policy.refill_rate_per_second).min(policy.capacity);
		self.last_refill_at = self.last_refill_at.max(now);
	}

	/// Takes one token if available.
	pub fn try_take(&mut self) -> bool {
		if self.tokens >= 1. {
			self.tokens -= 1.;

			true
		} else {
			false
		}
	}

	/// Wait until one whole token is available again.
	pub fn time_until_next_token(&self, policy: &BucketPolicy) -> Duration {
		let missing = (1. - self.tokens).max(0.);

		clock::saturating_seconds(missing / policy.refill_rate_per_second)
	}
}
