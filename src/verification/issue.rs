//! Token issuance.

// self
use crate::{
	_prelude::*,
	auth::{OwnerId, TokenId, TokenPurpose, TokenSecret, VerificationToken},
	error::ConfigError,
	obs::{self, GuardOp, OpOutcome, OpSpan},
	verification::Verifier,
};

/// Secret and metadata returned to the caller for out-of-band delivery.
#[derive(Clone, Debug)]
pub struct IssuedToken {
	/// Identifier of the persisted row.
	pub id: TokenId,
	/// Plaintext secret. Not persisted anywhere; deliver it and drop it.
	pub secret: TokenSecret,
	/// Flow the token was issued for.
	pub purpose: TokenPurpose,
	/// First instant at which the token is no longer valid.
	pub expires_at: OffsetDateTime,
}

impl Verifier {
	/// Issues a token for `owner` valid for `ttl` (negative values count as zero).
	///
	/// With the single-active policy enabled, older unused tokens of the same purpose for the
	/// same owner are invalidated first.
	pub async fn issue(
		&self,
		owner: &OwnerId,
		purpose: TokenPurpose,
		ttl: Duration,
	) -> Result<IssuedToken> {
		const OP: GuardOp = GuardOp::Issue;

		let span = OpSpan::new(OP, "issue");

		obs::record_op_outcome(OP, OpOutcome::Attempt);

		let result = span
			.instrument(async move {
				let now = self.clock.now();
				let secret = TokenSecret::generate();
				let record = VerificationToken::builder(owner.clone(), purpose)
					.token_hash(self.hasher.hash(&secret))
					.created_at(now)
					.expires_in(ttl.max(Duration::ZERO))
					.build()
					.map_err(ConfigError::from)?;

				if self.config.single_active {
					self.store.invalidate_active(owner, purpose, now).await?;
				}

				let issued = IssuedToken {
					id: record.id.clone(),
					secret,
					purpose,
					expires_at: record.expires_at,
				};

				self.store.insert(record).await?;

				Ok(issued)
			})
			.await;

		match &result {
			Ok(_) => {
				self.metrics.record_issued();
				obs::record_op_outcome(OP, OpOutcome::Success);
			},
			Err(_) => obs::record_op_outcome(OP, OpOutcome::Failure),
		}

		result
	}

	/// Issues a token with the configured default lifetime.
	pub async fn issue_default(
		&self,
		owner: &OwnerId,
		purpose: TokenPurpose,
	) -> Result<IssuedToken> {
		self.issue(owner, purpose, self.config.ttl()).await
	}
}
