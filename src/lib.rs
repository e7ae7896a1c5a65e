//! Request guards for the learning platform backend: token-bucket rate limiting over pluggable
//! bucket stores and single-use, HMAC-hashed verification tokens for email and invite flows.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod obs;
pub mod rate_limit;
pub mod store;
pub mod verification;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		clock::{Clock, ManualClock},
		config::{RateLimitConfig, VerificationConfig},
		rate_limit::{BucketStore, MemoryBucketStore, RateLimiter},
		store::{MemoryTokenStore, TokenStore},
		verification::Verifier,
	};

	/// HMAC key used by every test verifier.
	pub const TEST_TOKEN_KEY: &str = "test-token-secret";

	/// Returns a manual clock pinned to a fixed, readable instant.
	pub fn test_clock() -> Arc<ManualClock> {
		Arc::new(ManualClock::new(time::macros::datetime!(2025-11-10 12:00 UTC)))
	}

	/// Constructs a [`Verifier`] backed by an in-memory store and a manual clock.
	pub fn build_test_verifier() -> (Verifier, Arc<MemoryTokenStore>, Arc<ManualClock>) {
		let store_backend = Arc::new(MemoryTokenStore::default());
		let store: Arc<dyn TokenStore> = store_backend.clone();
		let clock = test_clock();
		let dyn_clock: Arc<dyn Clock> = clock.clone();
		let config = VerificationConfig::default().with_token_secret(TEST_TOKEN_KEY);
		let verifier = Verifier::new(store, config)
			.expect("Test verifier configuration should be valid.")
			.with_clock(dyn_clock);

		(verifier, store_backend, clock)
	}

	/// Constructs a [`RateLimiter`] over a memory bucket store with the provided policy.
	pub fn build_test_limiter(
		capacity: f64,
		refill_rate_per_second: f64,
	) -> (RateLimiter, Arc<MemoryBucketStore>, Arc<ManualClock>) {
		let config = RateLimitConfig::default()
			.with_capacity(capacity)
			.with_refill_rate_per_second(refill_rate_per_second);
		let clock = test_clock();
		let dyn_clock: Arc<dyn Clock> = clock.clone();
		let store_backend = Arc::new(MemoryBucketStore::new().with_clock(dyn_clock.clone()));
		let store: Arc<dyn BucketStore> = store_backend.clone();
		let limiter = RateLimiter::new(config, store)
			.expect("Test limiter configuration should be valid.")
			.with_clock(dyn_clock);

		(limiter, store_backend, clock)
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use url;
#[cfg(test)] use {color_eyre as _, tokio as _};
