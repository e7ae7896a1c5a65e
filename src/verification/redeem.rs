//! Token redemption, inspection, and purge.

// self
use crate::{
	_prelude::*,
	auth::{OwnerId, TokenPurpose, TokenSecret, TokenStatus, VerificationToken},
	obs::{self, GuardOp, OpOutcome, OpSpan},
	store::MarkUsedOutcome,
	verification::Verifier,
};

impl Verifier {
	/// Consumes `secret` and returns the account it was issued for.
	///
	/// Checks run in a fixed order: unknown secret or `purpose` mismatch yields
	/// [`Error::InvalidToken`], then [`Error::TokenAlreadyUsed`], then [`Error::TokenExpired`].
	/// The final `used` flip is conditional, so among concurrent callers presenting the same
	/// secret exactly one succeeds and the rest see [`Error::TokenAlreadyUsed`].
	pub async fn redeem(&self, secret: &str, purpose: Option<TokenPurpose>) -> Result<OwnerId> {
		const OP: GuardOp = GuardOp::Redeem;

		let span = OpSpan::new(OP, "redeem");

		obs::record_op_outcome(OP, OpOutcome::Attempt);

		let result = span
			.instrument(async move {
				let now = self.clock.now();
				let record = self.lookup(secret, purpose, now).await?;

				match self.store.mark_used(&record.id, now).await? {
					MarkUsedOutcome::Marked => Ok(record.owner),
					MarkUsedOutcome::AlreadyUsed => Err(Error::TokenAlreadyUsed),
					// Purged between lookup and update.
					MarkUsedOutcome::Missing => Err(Error::InvalidToken),
				}
			})
			.await;

		if result.is_ok() {
			self.metrics.record_redeemed();
		}

		self.finish(OP, result)
	}

	/// Validates `secret` exactly like [`Verifier::redeem`] without consuming it.
	pub async fn inspect(
		&self,
		secret: &str,
		purpose: Option<TokenPurpose>,
	) -> Result<VerificationToken> {
		const OP: GuardOp = GuardOp::Inspect;

		let span = OpSpan::new(OP, "inspect");

		obs::record_op_outcome(OP, OpOutcome::Attempt);

		let result = span.instrument(self.lookup(secret, purpose, self.clock.now())).await;

		self.finish(OP, result)
	}

	/// Deletes rows that were used, or that expired, before `cutoff`.
	pub async fn purge(&self, cutoff: OffsetDateTime) -> Result<usize> {
		const OP: GuardOp = GuardOp::Purge;

		let span = OpSpan::new(OP, "purge");

		obs::record_op_outcome(OP, OpOutcome::Attempt);

		let result = span.instrument(self.store.purge(cutoff)).await.map_err(Error::from);

		#[cfg(feature = "tracing")]
		{
			if let Ok(removed) = &result {
				tracing::info!(removed, %cutoff, "purged verification tokens");
			}
		}

		self.finish(OP, result)
	}

	async fn lookup(
		&self,
		secret: &str,
		purpose: Option<TokenPurpose>,
		now: OffsetDateTime,
	) -> Result<VerificationToken> {
		if secret.is_empty() {
			return Err(Error::InvalidToken);
		}

		let hash = self.hasher.hash(&TokenSecret::new(secret));
		let record = self.store.find_by_hash(&hash).await?.ok_or(Error::InvalidToken)?;

		validate(&record, purpose, now)?;

		Ok(record)
	}

	fn finish<T>(&self, op: GuardOp, result: Result<T>) -> Result<T> {
		match &result {
			Ok(_) => obs::record_op_outcome(op, OpOutcome::Success),
			Err(e) if e.is_token_error() => {
				self.metrics.record_rejected();
				obs::log_token_rejection(op, e);
				obs::record_op_outcome(op, OpOutcome::Rejected);
			},
			Err(_) => obs::record_op_outcome(op, OpOutcome::Failure),
		}

		result
	}
}

fn validate(
	record: &VerificationToken,
	purpose: Option<TokenPurpose>,
	now: OffsetDateTime,
) -> Result<()> {
	if purpose.is_some_and(|purpose| purpose != record.purpose) {
		return Err(Error::InvalidToken);
	}

	match record.status_at(now) {
		TokenStatus::Active => Ok(()),
		TokenStatus::Used => Err(Error::TokenAlreadyUsed),
		TokenStatus::Expired => Err(Error::TokenExpired),
	}
}
