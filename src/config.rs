//! Guard configuration with service defaults, builder setters, and JSON loading.
//!
//! Field names follow the camelCase keys of the platform's configuration documents:
//!
//! ```json
//! {
//!   "rateLimit": { "keyPrefix": "auth", "capacity": 10, "refillRatePerSecond": 0.1 },
//!   "verification": { "tokenSecret": "change-me", "ttlSeconds": 86400 }
//! }
//! ```

// self
use crate::{_prelude::*, auth::TokenSecret, error::ConfigError};

/// Longest accepted lifetime setting (ten years), well inside the representable date range.
pub const MAX_LIFETIME_SECONDS: u64 = 10 * 365 * 24 * 60 * 60;

/// Behaviour of the rate limiter when its bucket store fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreErrorPolicy {
	/// Let the request through.
	#[default]
	Admit,
	/// Reject the request as if the bucket were empty.
	Reject,
}

/// Top-level configuration document.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GuardConfig {
	/// Rate limiter settings.
	pub rate_limit: RateLimitConfig,
	/// Verification token settings.
	pub verification: VerificationConfig,
}
impl GuardConfig {
	/// Parses a JSON document, reporting the path of the first invalid field.
	pub fn from_json_str(payload: &str) -> Result<Self, ConfigError> {
		let mut de = serde_json::Deserializer::from_str(payload);
		let config: Self = serde_path_to_error::deserialize(&mut de)?;

		config.rate_limit.validate()?;
		config.verification.validate()?;

		Ok(config)
	}
}

/// Token-bucket settings for one limiter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RateLimitConfig {
	/// Namespace prepended to every bucket key.
	pub key_prefix: String,
	/// Maximum burst size.
	pub capacity: f64,
	/// Tokens regenerated per second.
	pub refill_rate_per_second: f64,
	/// What to do when the bucket store fails.
	pub on_store_error: StoreErrorPolicy,
	/// Inactivity after which a bucket may be dropped by its store, in seconds.
	pub idle_ttl_seconds: u64,
	/// Upper bound on buckets held by an in-process store.
	pub max_keys: Option<usize>,
}
impl RateLimitConfig {
	const DEFAULT_CAPACITY: f64 = 5.;
	const DEFAULT_IDLE_TTL_SECONDS: u64 = 3_600;
	const DEFAULT_KEY_PREFIX: &'static str = "rl";
	const DEFAULT_REFILL_RATE: f64 = 0.1;

	/// Overrides the key prefix.
	pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.key_prefix = prefix.into();

		self
	}

	/// Overrides the burst capacity.
	pub fn with_capacity(mut self, capacity: f64) -> Self {
		self.capacity = capacity;

		self
	}

	/// Overrides the steady refill rate.
	pub fn with_refill_rate_per_second(mut self, rate: f64) -> Self {
		self.refill_rate_per_second = rate;

		self
	}

	/// Overrides the store failure policy.
	pub fn with_on_store_error(mut self, policy: StoreErrorPolicy) -> Self {
		self.on_store_error = policy;

		self
	}

	/// Overrides the bucket idle TTL.
	pub fn with_idle_ttl(mut self, ttl: Duration) -> Self {
		self.idle_ttl_seconds = ttl.whole_seconds().max(1) as u64;

		self
	}

	/// Bounds the number of buckets kept by in-process stores.
	pub fn with_max_keys(mut self, max_keys: usize) -> Self {
		self.max_keys = Some(max_keys);

		self
	}

	/// Idle TTL as a [`Duration`].
	pub fn idle_ttl(&self) -> Duration {
		Duration::seconds(self.idle_ttl_seconds.min(MAX_LIFETIME_SECONDS) as i64)
	}

	/// Checks that the settings describe a usable bucket.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if !self.capacity.is_finite() || self.capacity < 1. {
			return Err(ConfigError::InvalidCapacity { capacity: self.capacity });
		}
		if !self.refill_rate_per_second.is_finite() || self.refill_rate_per_second <= 0. {
			return Err(ConfigError::InvalidRefillRate { rate: self.refill_rate_per_second });
		}
		if self.key_prefix.is_empty() {
			return Err(ConfigError::EmptyKeyPrefix);
		}

		check_lifetime("idleTtlSeconds", self.idle_ttl_seconds, 1)
	}
}
impl Default for RateLimitConfig {
	fn default() -> Self {
		Self {
			key_prefix: Self::DEFAULT_KEY_PREFIX.into(),
			capacity: Self::DEFAULT_CAPACITY,
			refill_rate_per_second: Self::DEFAULT_REFILL_RATE,
			on_store_error: StoreErrorPolicy::default(),
			idle_ttl_seconds: Self::DEFAULT_IDLE_TTL_SECONDS,
			max_keys: None,
		}
	}
}

/// Verification token settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VerificationConfig {
	/// HMAC key; never logged.
	pub token_secret: TokenSecret,
	/// Default token lifetime, in seconds.
	pub ttl_seconds: u64,
	/// Invalidate older unused tokens of the same purpose when issuing a new one.
	pub single_active: bool,
	/// Public application URL used to build verification and invite links.
	pub app_base_url: String,
}
impl VerificationConfig {
	const DEFAULT_BASE_URL: &'static str = "http://localhost:3025";
	const DEFAULT_TOKEN_SECRET: &'static str = "dev-token-secret";
	const DEFAULT_TTL_SECONDS: u64 = 24 * 60 * 60;

	/// Overrides the HMAC key.
	pub fn with_token_secret(mut self, secret: impl Into<String>) -> Self {
		self.token_secret = TokenSecret::new(secret);

		self
	}

	/// Overrides the default token lifetime.
	pub fn with_ttl(mut self, ttl: Duration) -> Self {
		self.ttl_seconds = ttl.whole_seconds().max(0) as u64;

		self
	}

	/// Enables or disables the single-active-token policy.
	pub fn with_single_active(mut self, single_active: bool) -> Self {
		self.single_active = single_active;

		self
	}

	/// Overrides the application base URL.
	pub fn with_app_base_url(mut self, url: impl Into<String>) -> Self {
		self.app_base_url = url.into();

		self
	}

	/// Parses the application base URL.
	pub fn base_url(&self) -> Result<Url, ConfigError> {
		let url = Url::parse(&self.app_base_url)
			.map_err(|_| ConfigError::InvalidBaseUrl { url: self.app_base_url.clone() })?;

		if url.cannot_be_a_base() {
			return Err(ConfigError::InvalidBaseUrl { url: self.app_base_url.clone() });
		}

		Ok(url)
	}

	/// Default token lifetime as a [`Duration`].
	pub fn ttl(&self) -> Duration {
		Duration::seconds(self.ttl_seconds.min(MAX_LIFETIME_SECONDS) as i64)
	}

	/// Checks the HMAC key, the default lifetime, and the base URL.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.token_secret.expose().is_empty() {
			return Err(ConfigError::EmptyTokenSecret);
		}

		check_lifetime("ttlSeconds", self.ttl_seconds, 0)?;
		self.base_url()?;

		Ok(())
	}
}
fn check_lifetime(field: &'static str, seconds: u64, min: u64) -> Result<(), ConfigError> {
	if (min..=MAX_LIFETIME_SECONDS).contains(&seconds) {
		Ok(())
	} else {
		Err(ConfigError::InvalidLifetime { field, seconds, min, max: MAX_LIFETIME_SECONDS })
	}
}

impl Default for VerificationConfig {
	fn default() -> Self {
		Self {
			token_secret: TokenSecret::new(Self::DEFAULT_TOKEN_SECRET),
			ttl_seconds: Self::DEFAULT_TTL_SECONDS,
			single_active: true,
			app_base_url: Self::DEFAULT_BASE_URL.into(),
		}
	}
}
