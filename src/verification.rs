//! Verification-token lifecycle: issuance, redemption, purge, links, and legacy migration.
//!
//! [`Verifier::issue`] hands the plaintext secret to the caller exactly once and persists only its
//! HMAC. [`Verifier::redeem`] recomputes the HMAC, validates the row, and flips `used` through the
//! store's conditional update, so a secret can succeed at most once no matter how many requests
//! race on it.

pub mod issue;
pub mod link;
pub mod migrate;
pub mod redeem;

mod metrics;

pub use issue::*;
pub use link::*;
pub use migrate::*;
pub use metrics::VerificationMetrics;

// self
use crate::{
	_prelude::*,
	auth::TokenHasher,
	clock::{self, Clock},
	config::VerificationConfig,
	error::ConfigError,
	store::TokenStore,
};

/// Issues and redeems verification tokens against a [`TokenStore`].
#[derive(Clone)]
pub struct Verifier {
	/// Token store implementation that persists token rows.
	pub store: Arc<dyn TokenStore>,
	/// Shared counters for issuance and redemption outcomes.
	pub metrics: Arc<VerificationMetrics>,
	hasher: TokenHasher,
	config: VerificationConfig,
	base_url: Url,
	clock: Arc<dyn Clock>,
}
impl Verifier {
	/// Creates a verifier keyed with `config.token_secret`.
	pub fn new(store: Arc<dyn TokenStore>, config: VerificationConfig) -> Result<Self, ConfigError> {
		config.validate()?;

		let hasher = TokenHasher::new(config.token_secret.expose())?;
		let base_url = config.base_url()?;

		Ok(Self {
			store,
			metrics: Default::default(),
			hasher,
			config,
			base_url,
			clock: clock::system(),
		})
	}

	/// Replaces the clock used for expiry decisions.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Settings in effect.
	pub fn config(&self) -> &VerificationConfig {
		&self.config
	}

	/// Keyed hasher shared by issuance, redemption, and migration.
	pub fn hasher(&self) -> &TokenHasher {
		&self.hasher
	}
}
impl Debug for Verifier {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Verifier")
			.field("ttl", &self.config.ttl())
			.field("single_active", &self.config.single_active)
			.field("base_url", &self.base_url.as_str())
			.finish()
	}
}
