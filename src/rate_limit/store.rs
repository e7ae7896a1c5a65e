//! Persistence contracts for token buckets.
//!
//! Stores only persist `{tokens, last_refill_at}`; the refill/acquire arithmetic lives in
//! [`RateLimiter`](crate::rate_limit::RateLimiter) so every backend admits identically.
//! Writes are versioned compare-and-swap operations, which keeps each key's read-modify-write
//! atomic even when several processes share one backend.

pub mod memory;
#[cfg(feature = "redis")] pub mod redis;

pub use memory::MemoryBucketStore;
#[cfg(feature = "redis")] pub use redis::RedisBucketStore;

// self
use crate::{
	_prelude::*,
	rate_limit::Bucket,
	store::{StoreError, StoreFuture},
};

/// Storage backend contract implemented by bucket stores.
pub trait BucketStore
where
	Self: Send + Sync,
{
	/// Loads the bucket stored under `key` together with its version.
	fn load<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<VersionedBucket>>;

	/// Writes `bucket` if the stored version still equals `expected` (`None` = absent), and
	/// (re)arms the key's expiry to `ttl`.
	fn compare_and_swap<'a>(
		&'a self,
		key: &'a str,
		expected: Option<u64>,
		bucket: Bucket,
		ttl: Duration,
	) -> StoreFuture<'a, BucketCasOutcome>;
}

/// Bucket snapshot paired with the version it was read at.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VersionedBucket {
	/// Stored bucket state.
	pub bucket: Bucket,
	/// Monotonic write counter for the key.
	pub version: u64,
}

/// Result of a bucket compare-and-swap attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BucketCasOutcome {
	/// The expected version matched and the bucket was written.
	Updated,
	/// Another writer got there first; reload and retry.
	Conflict,
}

/// Adapter that turns every call into a backend failure. Useful to exercise store-error
/// policies.
#[derive(Clone, Debug, Default)]
pub struct UnavailableBucketStore {
	message: String,
}
impl UnavailableBucketStore {
	/// Creates a store whose calls fail with `message`.
	pub fn new(message: impl Into<String>) -> Self {
		Self { message: message.into() }
	}

	fn error(&self) -> StoreError {
		StoreError::Backend { message: self.message.clone() }
	}
}
impl BucketStore for UnavailableBucketStore {
	fn load<'a>(&'a self, _: &'a str) -> StoreFuture<'a, Option<VersionedBucket>> {
		Box::pin(async move { Err(self.error()) })
	}

	fn compare_and_swap<'a>(
		&'a self,
		_: &'a str,
		_: Option<u64>,
		_: Bucket,
		_: Duration,
	) -> StoreFuture<'a, BucketCasOutcome> {
		Box::pin(async move { Err(self.error()) })
	}
}
