//! Token-bucket rate limiting over pluggable bucket stores.
//!
//! [`RateLimiter::try_acquire`] refills the key's bucket by `elapsed * rate` (capped at capacity),
//! admits the request if a whole token is available, and persists the result through a versioned
//! compare-and-swap. Requests for the same key inside one process are additionally serialized
//! through per-key guards, so CAS conflicts only arise between processes sharing a store.
//! When the store fails, the configured [`StoreErrorPolicy`] decides the outcome.

pub mod bucket;
pub mod decision;
pub mod key;
pub mod store;

mod metrics;

pub use bucket::*;
pub use decision::*;
pub use key::*;
pub use metrics::RateLimitMetrics;
pub use store::*;

// self
use crate::{
	_prelude::*,
	clock::{self, Clock},
	config::{RateLimitConfig, StoreErrorPolicy},
	error::{ConfigError, TOO_MANY_REQUESTS_MESSAGE},
	obs::{self, GuardOp, OpOutcome, OpSpan},
	store::StoreError,
};

/// Upper bound on load/compare-and-swap rounds per decision.
const MAX_CAS_ATTEMPTS: usize = 8;

/// Admits or rejects actions per client key.
#[derive(Clone)]
pub struct RateLimiter {
	/// Shared counters for limiter decisions.
	pub metrics: Arc<RateLimitMetrics>,
	policy: BucketPolicy,
	key_prefix: String,
	on_store_error: StoreErrorPolicy,
	bucket_ttl: Duration,
	store: Arc<dyn BucketStore>,
	extractor: Arc<dyn KeyExtractor>,
	clock: Arc<dyn Clock>,
	key_guards: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}
impl RateLimiter {
	/// Creates a limiter for `config` backed by `store`.
	pub fn new(config: RateLimitConfig, store: Arc<dyn BucketStore>) -> Result<Self, ConfigError> {
		config.validate()?;

		let policy = BucketPolicy::try_from(&config)?;
		// An expired bucket reads as full, so it must not expire before it could have refilled.
		let bucket_ttl = config.idle_ttl().max(policy.full_refill_after());

		Ok(Self {
			metrics: Default::default(),
			policy,
			key_prefix: config.key_prefix,
			on_store_error: config.on_store_error,
			bucket_ttl,
			store,
			extractor: Arc::new(DefaultKeyExtractor),
			clock: clock::system(),
			key_guards: Default::default(),
		})
	}

	/// Creates a limiter over a [`MemoryBucketStore`] honoring `config.max_keys`, with the
	/// store and the limiter reading the same clock.
	pub fn in_memory(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
		let store = Arc::new(MemoryBucketStore::from_config(&config).with_clock(clock.clone()));

		Ok(Self::new(config, store)?.with_clock(clock))
	}

	/// Replaces the clock used for refills.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Replaces the request-to-key mapping.
	pub fn with_key_extractor(mut self, extractor: Arc<dyn KeyExtractor>) -> Self {
		self.extractor = extractor;

		self
	}

	/// Bucket capacity and refill rate in effect.
	pub fn policy(&self) -> &BucketPolicy {
		&self.policy
	}

	/// Full store key for a request: `"{prefix}:{extracted key}"`.
	pub fn key_for(&self, identity: &RequestIdentity) -> String {
		let key = self.extractor.extract(identity);
		let key = if key.is_empty() { ANONYMOUS_KEY } else { key.as_str() };

		format!("{}:{key}", self.key_prefix)
	}

	/// Derives the request's key and runs [`RateLimiter::try_acquire`] on it.
	pub async fn check(&self, identity: &RequestIdentity) -> RateLimitDecision {
		self.try_acquire(&self.key_for(identity)).await
	}

	/// Like [`RateLimiter::check`], but turns a rejection into [`Error::TooManyRequests`].
	pub async fn enforce(&self, identity: &RequestIdentity) -> Result<()> {
		match self.check(identity).await {
			RateLimitDecision::Admitted { .. } => Ok(()),
			RateLimitDecision::Rejected(directive) =>
				Err(Error::TooManyRequests { retry_after: directive.recommended_backoff }),
		}
	}

	/// Spends one token from `key`'s bucket if possible. Empty keys share the anonymous bucket.
	pub async fn try_acquire(&self, key: &str) -> RateLimitDecision {
		const OP: GuardOp = GuardOp::RateLimit;

		let key = if key.is_empty() { ANONYMOUS_KEY } else { key };
		let span = OpSpan::new(OP, "try_acquire");

		obs::record_op_outcome(OP, OpOutcome::Attempt);

		let decision = span
			.instrument(async {
				let guard = self.key_guard(key);
				let result = {
					let _serialized = guard.lock().await;

					self.acquire_with_retries(key).await
				};

				self.release_key_guard(key, guard);

				match result {
					Ok(decision) => decision,
					Err(e) => self.apply_store_error_policy(key, &e),
				}
			})
			.await;

		if decision.is_admitted() {
			self.metrics.record_admitted();
			obs::record_op_outcome(OP, OpOutcome::Success);
		} else {
			self.metrics.record_rejected();
			obs::record_op_outcome(OP, OpOutcome::Rejected);
		}

		decision
	}

	async fn acquire_with_retries(&self, key: &str) -> Result<RateLimitDecision, StoreError> {
		for _ in 0..MAX_CAS_ATTEMPTS {
			let now = self.clock.now();
			let (mut bucket, version) = match self.store.load(key).await? {
				Some(current) => (current.bucket, Some(current.version)),
				None => (Bucket::full(&self.policy, now), None),
			};

			bucket.refill(&self.policy, now);

			let admitted = bucket.try_take();

			match self.store.compare_and_swap(key, version, bucket, self.bucket_ttl).await? {
				BucketCasOutcome::Updated if admitted =>
					return Ok(RateLimitDecision::Admitted {
						remaining: Some(bucket.tokens.floor() as u64),
					}),
				BucketCasOutcome::Updated => {
					let backoff = bucket.time_until_next_token(&self.policy);

					return Ok(RateLimitDecision::Rejected(
						RetryDirective::new(clock::saturating_add(now, backoff), backoff)
							.with_reason(TOO_MANY_REQUESTS_MESSAGE),
					));
				},
				BucketCasOutcome::Conflict => continue,
			}
		}

		Err(StoreError::Contention { key: key.to_owned() })
	}

	fn apply_store_error_policy(&self, key: &str, error: &StoreError) -> RateLimitDecision {
		self.metrics.record_store_error();

		match self.on_store_error {
			StoreErrorPolicy::Admit => {
				obs::log_absorbed_store_error(GuardOp::RateLimit, key, error, "admit");

				RateLimitDecision::Admitted { remaining: None }
			},
			StoreErrorPolicy::Reject => {
				obs::log_absorbed_store_error(GuardOp::RateLimit, key, error, "reject");

				let backoff = clock::saturating_seconds(1. / self.policy.refill_rate_per_second());

				RateLimitDecision::Rejected(
					RetryDirective::new(clock::saturating_add(self.clock.now(), backoff), backoff)
						.with_reason(error.to_string()),
				)
			},
		}
	}

	fn key_guard(&self, key: &str) -> Arc<AsyncMutex<()>> {
		let mut guards = self.key_guards.lock();

		guards.entry(key.to_owned()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}

	fn release_key_guard(&self, key: &str, guard: Arc<AsyncMutex<()>>) {
		let mut guards = self.key_guards.lock();

		// Only the map and `guard` itself still point at it: nobody is waiting.
		if Arc::strong_count(&guard) == 2 {
			guards.remove(key);
		}
	}
}
impl Debug for RateLimiter {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RateLimiter")
			.field("policy", &self.policy)
			.field("key_prefix", &self.key_prefix)
			.field("on_store_error", &self.on_store_error)
			.field("bucket_ttl", &self.bucket_ttl)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::{_preludet::build_test_limiter, clock::ManualClock};

	#[tokio::test]
	async fn burst_then_steady_refill() {
		let (limiter, _, clock) = build_test_limiter(5., 0.1);

		for i in 0..5 {
			assert!(limiter.try_acquire("k").await.is_admitted(), "Call {i} should be admitted.");
		}

		assert!(!limiter.try_acquire("k").await.is_admitted());

		clock.advance(Duration::seconds(10));

		assert!(limiter.try_acquire("k").await.is_admitted());
		assert!(!limiter.try_acquire("k").await.is_admitted());
		assert_eq!(limiter.metrics.admitted(), 6);
		assert_eq!(limiter.metrics.rejected(), 2);
	}

	#[tokio::test]
	async fn rejection_carries_retry_hint() {
		let (limiter, _, clock) = build_test_limiter(1., 0.5);

		limiter.try_acquire("k").await;

		let RateLimitDecision::Rejected(directive) = limiter.try_acquire("k").await else {
			panic!("Second call must be rejected.");
		};

		assert_eq!(directive.recommended_backoff, Duration::seconds(2));
		assert_eq!(directive.earliest_retry_at, clock.now() + Duration::seconds(2));
		assert_eq!(directive.reason.as_deref(), Some("Too many requests"));
	}

	#[tokio::test]
	async fn empty_keys_share_the_anonymous_bucket() {
		let (limiter, store, _) = build_test_limiter(1., 0.1);

		assert!(limiter.try_acquire("").await.is_admitted());
		assert!(!limiter.try_acquire(ANONYMOUS_KEY).await.is_admitted());
		assert_eq!(store.len(), 1);
	}

	#[tokio::test]
	async fn key_guards_are_released() {
		let (limiter, _, _) = build_test_limiter(3., 1.);

		limiter.try_acquire("a").await;
		limiter.try_acquire("b").await;

		assert!(limiter.key_guards.lock().is_empty());
	}

	/// Reports a conflict for the first `conflicts` writes, then delegates.
	struct ConflictingStore {
		inner: MemoryBucketStore,
		conflicts: std::sync::atomic::AtomicUsize,
	}
	impl BucketStore for ConflictingStore {
		fn load<'a>(
			&'a self,
			key: &'a str,
		) -> crate::store::StoreFuture<'a, Option<VersionedBucket>> {
			self.inner.load(key)
		}

		fn compare_and_swap<'a>(
			&'a self,
			key: &'a str,
			expected: Option<u64>,
			bucket: Bucket,
			ttl: Duration,
		) -> crate::store::StoreFuture<'a, BucketCasOutcome> {
			use std::sync::atomic::Ordering;

			let conflict = self
				.conflicts
				.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
				.is_ok();

			if conflict {
				Box::pin(async { Ok(BucketCasOutcome::Conflict) })
			} else {
				self.inner.compare_and_swap(key, expected, bucket, ttl)
			}
		}
	}

	fn conflicting_limiter(conflicts: usize) -> RateLimiter {
		let store =
			ConflictingStore { inner: MemoryBucketStore::new(), conflicts: conflicts.into() };

		RateLimiter::new(RateLimitConfig::default(), Arc::new(store))
			.expect("Limiter fixture should be valid.")
	}

	#[tokio::test]
	async fn cas_conflicts_are_retried() {
		let limiter = conflicting_limiter(MAX_CAS_ATTEMPTS - 1);

		assert_eq!(limiter.try_acquire("k").await, RateLimitDecision::Admitted { remaining: Some(4) });
		assert_eq!(limiter.metrics.store_errors(), 0);
	}

	#[tokio::test]
	async fn persistent_contention_falls_back_to_the_policy() {
		let limiter = conflicting_limiter(MAX_CAS_ATTEMPTS);

		assert_eq!(limiter.try_acquire("k").await, RateLimitDecision::Admitted { remaining: None });
		assert_eq!(limiter.metrics.store_errors(), 1);
	}

	#[test]
	fn bucket_ttl_covers_a_full_refill() {
		let config = RateLimitConfig::default()
			.with_capacity(10.)
			.with_refill_rate_per_second(0.001)
			.with_idle_ttl(Duration::minutes(1));
		let limiter = RateLimiter::new(config, Arc::new(MemoryBucketStore::default()))
			.expect("Limiter fixture should be valid.");

		assert_eq!(limiter.bucket_ttl, Duration::seconds(10_000));
	}

	#[tokio::test]
	async fn vanishing_refill_rate_saturates_instead_of_panicking() {
		let (limiter, _, _) = build_test_limiter(1., 1e-300);

		assert_eq!(limiter.bucket_ttl, Duration::MAX);
		assert!(limiter.try_acquire("k").await.is_admitted());

		let RateLimitDecision::Rejected(directive) = limiter.try_acquire("k").await else {
			panic!("An empty bucket must be rejected.");
		};

		assert_eq!(directive.recommended_backoff, Duration::MAX);
		assert!(directive.retry_after_secs() >= i64::MAX as u64);

		let store =
			ConflictingStore { inner: MemoryBucketStore::new(), conflicts: MAX_CAS_ATTEMPTS.into() };
		let config = RateLimitConfig::default()
			.with_refill_rate_per_second(1e-300)
			.with_on_store_error(StoreErrorPolicy::Reject);
		let rejecting =
			RateLimiter::new(config, Arc::new(store)).expect("Limiter fixture should be valid.");

		assert!(matches!(
			rejecting.try_acquire("k").await,
			RateLimitDecision::Rejected(directive) if directive.recommended_backoff == Duration::MAX
		));
	}

	#[tokio::test]
	async fn in_memory_limiter_honors_the_key_bound() {
		let clock = Arc::new(ManualClock::new(macros::datetime!(2025-01-01 00:00 UTC)));
		let config = RateLimitConfig::default().with_capacity(1.).with_max_keys(2);
		let limiter = RateLimiter::in_memory(config, clock.clone())
			.expect("Limiter fixture should be valid.");

		for i in 0..10 {
			assert!(limiter.try_acquire(&format!("ip-{i}")).await.is_admitted());
			clock.advance(Duration::milliseconds(1));
		}

		assert!(!limiter.try_acquire("ip-9").await.is_admitted(), "Recent keys keep their state.");
		assert!(
			limiter.try_acquire("ip-0").await.is_admitted(),
			"Evicted keys start over with a full bucket."
		);
	}

	#[test]
	fn invalid_configuration_is_rejected() {
		let config = RateLimitConfig::default().with_capacity(0.);

		assert!(matches!(
			RateLimiter::new(config, Arc::new(MemoryBucketStore::default())),
			Err(ConfigError::InvalidCapacity { .. })
		));
	}
}
