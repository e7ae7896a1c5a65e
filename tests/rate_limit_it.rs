// std
use std::{
	net::{IpAddr, Ipv4Addr},
	sync::Arc,
};
// crates.io
use time::{Duration, macros};
// self
use lms_guard::{
	clock::{Clock, ManualClock},
	config::{GuardConfig, RateLimitConfig, StoreErrorPolicy},
	error::Error,
	rate_limit::{
		AddrKeyExtractor, BucketStore, MemoryBucketStore, RateLimitDecision, RateLimiter,
		RequestIdentity, UnavailableBucketStore,
	},
};

fn limiter(config: RateLimitConfig) -> (RateLimiter, Arc<ManualClock>) {
	let clock = Arc::new(ManualClock::new(macros::datetime!(2025-11-10 12:00 UTC)));
	let dyn_clock: Arc<dyn Clock> = clock.clone();
	let store: Arc<dyn BucketStore> =
		Arc::new(MemoryBucketStore::new().with_clock(dyn_clock.clone()));
	let limiter = RateLimiter::new(config, store)
		.expect("Limiter fixture should be valid.")
		.with_clock(dyn_clock);

	(limiter, clock)
}

fn addr(last: u8) -> RequestIdentity {
	RequestIdentity::from_addr(IpAddr::V4(Ipv4Addr::new(10, 0, 0, last)))
}

#[tokio::test]
async fn login_bucket_admits_five_then_one_per_ten_seconds() {
	let (limiter, clock) = limiter(RateLimitConfig::default());
	let client = addr(1);

	for i in 0..5 {
		assert!(limiter.check(&client).await.is_admitted(), "Call {i} should be admitted.");
	}

	assert!(!limiter.check(&client).await.is_admitted());

	clock.advance(Duration::seconds(9));

	assert!(!limiter.check(&client).await.is_admitted());

	clock.advance(Duration::seconds(1));

	assert!(limiter.check(&client).await.is_admitted());
	assert!(!limiter.check(&client).await.is_admitted());
	assert!(limiter.check(&addr(2)).await.is_admitted(), "Other clients keep their own bucket.");
}

#[tokio::test]
async fn enforce_maps_rejections_to_http_429() {
	let (limiter, _) = limiter(RateLimitConfig::default().with_capacity(1.));
	let client = addr(3);

	limiter.enforce(&client).await.expect("First call should pass.");

	let error = limiter.enforce(&client).await.expect_err("Second call should be limited.");

	assert!(matches!(
		error,
		Error::TooManyRequests { retry_after } if retry_after == Duration::seconds(10)
	));
	assert_eq!(error.status_code(), 429);
	assert_eq!(error.body().message, "Too many requests");
	assert!(!error.body().success);
}

#[tokio::test]
async fn subjects_take_precedence_unless_keyed_by_address() {
	let (limiter, _) = limiter(RateLimitConfig::default().with_key_prefix("signup"));
	let identity = addr(4).with_subject("student-9");

	assert_eq!(limiter.key_for(&identity), "signup:student-9");

	let limiter = limiter.with_key_extractor(Arc::new(AddrKeyExtractor));

	assert_eq!(limiter.key_for(&identity), "signup:10.0.0.4");
	assert_eq!(limiter.key_for(&RequestIdentity::default()), "signup:anon");
}

#[tokio::test]
async fn store_failures_follow_the_configured_policy() {
	let store: Arc<dyn BucketStore> = Arc::new(UnavailableBucketStore::new("connection refused"));
	let admit = RateLimiter::new(RateLimitConfig::default(), store.clone())
		.expect("Limiter fixture should be valid.");
	let reject = RateLimiter::new(
		RateLimitConfig::default().with_on_store_error(StoreErrorPolicy::Reject),
		store,
	)
	.expect("Limiter fixture should be valid.");

	assert_eq!(admit.try_acquire("k").await, RateLimitDecision::Admitted { remaining: None });
	assert_eq!(admit.metrics.store_errors(), 1);

	let RateLimitDecision::Rejected(directive) = reject.try_acquire("k").await else {
		panic!("Reject policy must turn store failures into rejections.");
	};

	assert!(
		directive.reason.as_deref().is_some_and(|reason| reason.contains("connection refused"))
	);
	assert_eq!(reject.metrics.rejected(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_acquires_never_overspend() -> color_eyre::Result<()> {
	let (limiter, _) = limiter(RateLimitConfig::default().with_capacity(5.));
	let handles = (0..32)
		.map(|_| {
			let limiter = limiter.clone();

			tokio::spawn(async move { limiter.try_acquire("burst").await.is_admitted() })
		})
		.collect::<Vec<_>>();
	let mut admitted = 0;

	for handle in handles {
		if handle.await? {
			admitted += 1;
		}
	}

	assert_eq!(admitted, 5);
	assert_eq!(limiter.metrics.admitted(), 5);
	assert_eq!(limiter.metrics.rejected(), 27);

	Ok(())
}

#[tokio::test]
async fn configured_key_bound_is_applied_to_the_memory_store() {
	let clock = Arc::new(ManualClock::new(macros::datetime!(2025-11-10 12:00 UTC)));
	let dyn_clock: Arc<dyn Clock> = clock.clone();
	let config = GuardConfig::from_json_str(r#"{"rateLimit":{"maxKeys":2}}"#)
		.expect("Config fixture should parse.")
		.rate_limit;
	let backend = Arc::new(MemoryBucketStore::from_config(&config).with_clock(dyn_clock.clone()));
	let store: Arc<dyn BucketStore> = backend.clone();
	let limiter = RateLimiter::new(config, store)
		.expect("Limiter fixture should be valid.")
		.with_clock(dyn_clock);

	for i in 0..10 {
		limiter.try_acquire(&format!("10.0.0.{i}")).await;
		clock.advance(Duration::milliseconds(1));
	}

	assert_eq!(backend.len(), 2);
}
