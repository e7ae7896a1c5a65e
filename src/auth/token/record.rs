//! Persisted verification token rows, lifecycle helpers, and builders.

// self
use crate::{
	_prelude::*,
	auth::{OwnerId, TokenId, TokenPurpose, token::hash::TokenHash},
};

/// Current lifecycle status for a verification token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStatus {
	/// Token may still be redeemed.
	Active,
	/// Token reached its expiry instant without being redeemed.
	Expired,
	/// Token has been redeemed or invalidated.
	Used,
}

/// Errors produced by [`VerificationTokenBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum VerificationTokenBuilderError {
	/// Issued when no token hash was provided.
	#[error("Token hash is required.")]
	MissingTokenHash,
	/// Issued when no expiry (absolute or relative) was configured.
	#[error("Expiry must be supplied via expires_at or expires_in.")]
	MissingExpiry,
	/// Issued when the relative expiry lands outside the representable date range.
	#[error("Expiry is outside the supported date range.")]
	ExpiryOutOfRange,
}

/// Single-use credential row. Holds the keyed hash of the secret, never the secret itself.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationToken {
	/// Row identifier.
	pub id: TokenId,
	/// Account the token acts for.
	pub owner: OwnerId,
	/// HMAC of the secret handed out at issuance.
	pub token_hash: TokenHash,
	/// Flow the token may be redeemed for.
	pub purpose: TokenPurpose,
	/// Creation instant.
	pub created_at: OffsetDateTime,
	/// First instant at which the token is no longer valid.
	pub expires_at: OffsetDateTime,
	/// Monotonic `false → true` flag set on redemption or invalidation.
	pub used: bool,
	/// Instant the token was redeemed or invalidated.
	pub used_at: Option<OffsetDateTime>,
}
impl VerificationToken {
	/// Returns a builder for a token owned by `owner` for `purpose`.
	pub fn builder(owner: OwnerId, purpose: TokenPurpose) -> VerificationTokenBuilder {
		VerificationTokenBuilder::new(owner, purpose)
	}

	/// Computes the lifecycle status at a given instant.
	pub fn status_at(&self, instant: OffsetDateTime) -> TokenStatus {
		if self.used {
			return TokenStatus::Used;
		}
		if self.is_expired_at(instant) {
			return TokenStatus::Expired;
		}

		TokenStatus::Active
	}

	/// Returns `true` if the token has expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_at
	}

	/// Marks the token as used. Later calls keep the first usage instant.
	pub fn mark_used(&mut self, instant: OffsetDateTime) {
		if !self.used {
			self.used = true;
			self.used_at = Some(instant);
		}
	}
}
impl Debug for VerificationToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("VerificationToken")
			.field("id", &self.id)
			.field("owner", &self.owner)
			.field("token_hash", &self.token_hash)
			.field("purpose", &self.purpose)
			.field("created_at", &self.created_at)
			.field("expires_at", &self.expires_at)
			.field("used", &self.used)
			.field("used_at", &self.used_at)
			.finish()
	}
}

/// Builder for [`VerificationToken`].
#[derive(Clone, Debug)]
pub struct VerificationTokenBuilder {
	owner: OwnerId,
	purpose: TokenPurpose,
	id: Option<TokenId>,
	token_hash: Option<TokenHash>,
	created_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
	used_at: Option<OffsetDateTime>,
}
impl VerificationTokenBuilder {
	fn new(owner: OwnerId, purpose: TokenPurpose) -> Self {
		Self {
			owner,
			purpose,
			id: None,
			token_hash: None,
			created_at: None,
			expires_at: None,
			expires_in: None,
			used_at: None,
		}
	}

	/// Uses a caller-provided row identifier instead of a generated one.
	pub fn id(mut self, id: TokenId) -> Self {
		self.id = Some(id);

		self
	}

	/// Provides the keyed hash of the secret.
	pub fn token_hash(mut self, hash: TokenHash) -> Self {
		self.token_hash = Some(hash);

		self
	}

	/// Sets the creation instant.
	pub fn created_at(mut self, instant: OffsetDateTime) -> Self {
		self.created_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry duration from the creation instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Builds the row in the used state, e.g. for retired legacy rows.
	pub fn used_at(mut self, instant: OffsetDateTime) -> Self {
		self.used_at = Some(instant);

		self
	}

	/// Consumes the builder and produces a [`VerificationToken`].
	pub fn build(self) -> Result<VerificationToken, VerificationTokenBuilderError> {
		let token_hash = self.token_hash.ok_or(VerificationTokenBuilderError::MissingTokenHash)?;
		let created_at = self.created_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => instant,
			(None, Some(delta)) => created_at
				.checked_add(delta)
				.ok_or(VerificationTokenBuilderError::ExpiryOutOfRange)?,
			(None, None) => return Err(VerificationTokenBuilderError::MissingExpiry),
		};

		Ok(VerificationToken {
			id: self.id.unwrap_or_else(TokenId::generate),
			owner: self.owner,
			token_hash,
			purpose: self.purpose,
			created_at,
			expires_at,
			used: self.used_at.is_some(),
			used_at: self.used_at,
		})
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn owner() -> OwnerId {
		OwnerId::new("user-1").expect("Owner fixture should be valid.")
	}

	#[test]
	fn status_transitions_cover_all_states() {
		let mut record = VerificationToken::builder(owner(), TokenPurpose::EmailVerification)
			.token_hash(TokenHash::from_encoded("hash"))
			.created_at(macros::datetime!(2025-01-01 00:00 UTC))
			.expires_at(macros::datetime!(2025-01-02 00:00 UTC))
			.build()
			.expect("Token builder should succeed for status transitions.");

		assert_eq!(record.status_at(macros::datetime!(2025-01-01 12:00 UTC)), TokenStatus::Active);
		assert_eq!(record.status_at(macros::datetime!(2025-01-02 00:00 UTC)), TokenStatus::Expired);

		record.mark_used(macros::datetime!(2025-01-01 06:00 UTC));

		assert_eq!(record.status_at(macros::datetime!(2025-01-01 12:00 UTC)), TokenStatus::Used);

		record.mark_used(macros::datetime!(2025-01-01 07:00 UTC));

		assert_eq!(record.used_at, Some(macros::datetime!(2025-01-01 06:00 UTC)));
	}

	#[test]
	fn builder_handles_relative_expiry_and_generates_ids() {
		let a = VerificationToken::builder(owner(), TokenPurpose::InviteAccept)
			.token_hash(TokenHash::from_encoded("a"))
			.created_at(macros::datetime!(2025-01-01 00:00 UTC))
			.expires_in(Duration::hours(24))
			.build()
			.expect("Token builder should support relative expiry calculations.");
		let b = VerificationToken::builder(owner(), TokenPurpose::InviteAccept)
			.token_hash(TokenHash::from_encoded("b"))
			.expires_in(Duration::hours(24))
			.build()
			.expect("Token builder should default the creation instant.");

		assert_eq!(a.expires_at, macros::datetime!(2025-01-02 00:00 UTC));
		assert!(!a.used);
		assert_ne!(a.id, b.id);
	}

	#[test]
	fn builder_requires_hash_and_expiry() {
		let missing_hash = VerificationToken::builder(owner(), TokenPurpose::InviteAccept)
			.expires_in(Duration::hours(1))
			.build();
		let missing_expiry = VerificationToken::builder(owner(), TokenPurpose::InviteAccept)
			.token_hash(TokenHash::from_encoded("h"))
			.build();

		assert_eq!(missing_hash, Err(VerificationTokenBuilderError::MissingTokenHash));
		assert_eq!(missing_expiry, Err(VerificationTokenBuilderError::MissingExpiry));
	}

	#[test]
	fn builder_rejects_unrepresentable_expiry() {
		let overflow = VerificationToken::builder(owner(), TokenPurpose::EmailVerification)
			.token_hash(TokenHash::from_encoded("hash"))
			.created_at(macros::datetime!(2025-01-01 00:00 UTC))
			.expires_in(Duration::MAX)
			.build();

		assert_eq!(overflow, Err(VerificationTokenBuilderError::ExpiryOutOfRange));
	}
}
