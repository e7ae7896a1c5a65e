//! One-time conversion of legacy token rows into the keyed-hash scheme.
//!
//! Legacy rows stored either the plaintext secret or an unkeyed digest of it. Rows that still
//! carry the plaintext are re-hashed and keep their lifecycle state; digest-only rows cannot be
//! re-keyed and are retired, so redemption only ever needs a single lookup. Rows with neither
//! value are corrupt and are skipped.

// self
use crate::{
	_prelude::*,
	auth::{OwnerId, TokenId, TokenPurpose, TokenSecret, VerificationToken},
	error::ConfigError,
	obs::{self, GuardOp, OpOutcome, OpSpan},
	verification::Verifier,
};

/// Row exported from the legacy token tables.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyTokenRow {
	/// Identifier to keep; a new one is generated when absent.
	#[serde(default)]
	pub id: Option<TokenId>,
	/// Account the token acts for.
	pub owner: OwnerId,
	/// Flow the token was issued for.
	pub purpose: TokenPurpose,
	/// Plaintext secret, when the legacy table stored it.
	#[serde(default)]
	pub token: Option<TokenSecret>,
	/// Unkeyed digest, when the legacy table stored only that.
	///
	/// Never compared against anything: the digest is not keyed, so it only marks the row as a
	/// real token that gets retired rather than skipped.
	#[serde(default)]
	pub token_digest: Option<String>,
	/// Creation instant.
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
	/// Expiry instant.
	#[serde(with = "time::serde::rfc3339")]
	pub expires_at: OffsetDateTime,
	/// Whether the token had been consumed.
	#[serde(default)]
	pub used: bool,
}
impl Debug for LegacyTokenRow {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LegacyTokenRow")
			.field("id", &self.id)
			.field("owner", &self.owner)
			.field("purpose", &self.purpose)
			.field("has_plaintext", &self.token.is_some())
			.field("has_digest", &self.token_digest.is_some())
			.field("created_at", &self.created_at)
			.field("expires_at", &self.expires_at)
			.field("used", &self.used)
			.finish()
	}
}

/// Counts reported by [`Verifier::migrate_legacy`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationReport {
	/// Rows re-hashed under the server key.
	pub rehashed: usize,
	/// Rows that could not be re-keyed and were stored as used.
	pub retired: usize,
	/// Rows carrying neither a plaintext nor a digest; not imported.
	pub skipped: usize,
}

impl Verifier {
	/// Imports `rows` into the store, re-hashing plaintext rows and retiring digest-only ones.
	///
	/// Rows with neither a plaintext nor a digest are counted in [`MigrationReport::skipped`].
	pub async fn migrate_legacy(
		&self,
		rows: impl IntoIterator<Item = LegacyTokenRow>,
	) -> Result<MigrationReport> {
		const OP: GuardOp = GuardOp::Migrate;

		let span = OpSpan::new(OP, "migrate_legacy");

		obs::record_op_outcome(OP, OpOutcome::Attempt);

		let rows = rows.into_iter().collect::<Vec<_>>();
		let result = span
			.instrument(async move {
				let now = self.clock.now();
				let mut report = MigrationReport::default();

				for row in rows {
					let (secret, retired) = match (row.token, &row.token_digest) {
						(Some(secret), _) => (secret, false),
						// Unredeemable by construction: nobody holds this secret.
						(None, Some(_)) => (TokenSecret::generate(), true),
						(None, None) => {
							#[cfg(feature = "tracing")]
							tracing::warn!(
								owner = %row.owner,
								purpose = ?row.purpose,
								"skipping legacy token row without plaintext or digest"
							);

							report.skipped += 1;

							continue;
						},
					};
					let mut builder = VerificationToken::builder(row.owner, row.purpose)
						.token_hash(self.hasher.hash(&secret))
						.created_at(row.created_at)
						.expires_at(row.expires_at);

					if let Some(id) = row.id {
						builder = builder.id(id);
					}
					if row.used || retired {
						builder = builder.used_at(now);
					}

					self.store.insert(builder.build().map_err(ConfigError::from)?).await?;

					if retired {
						report.retired += 1;
					} else {
						report.rehashed += 1;
					}
				}

				Ok(report)
			})
			.await;

		match &result {
			Ok(report) => {
				#[cfg(feature = "tracing")]
				tracing::info!(
					rehashed = report.rehashed,
					retired = report.retired,
					skipped = report.skipped,
					"migrated legacy verification tokens"
				);
				#[cfg(not(feature = "tracing"))]
				let _ = report;

				obs::record_op_outcome(OP, OpOutcome::Success);
			},
			Err(_) => obs::record_op_outcome(OP, OpOutcome::Failure),
		}

		result
	}
}
