//! Storage contracts and built-in store implementations for verification token rows.

pub mod file;
pub mod memory;

pub use file::FileTokenStore;
pub use memory::MemoryTokenStore;

// self
use crate::{
	_prelude::*,
	auth::{OwnerId, TokenHash, TokenId, TokenPurpose, VerificationToken},
};

/// Boxed future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract implemented by verification token stores.
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Persists a new row (replacing any row with the same identifier).
	fn insert(&self, record: VerificationToken) -> StoreFuture<'_, ()>;

	/// Fetches the row whose keyed hash equals `hash`, if present.
	fn find_by_hash<'a>(&'a self, hash: &'a TokenHash)
	-> StoreFuture<'a, Option<VerificationToken>>;

	/// Atomically flips `used` from `false` to `true` for the identified row.
	///
	/// Equivalent to `UPDATE .. SET used = true WHERE id = $1 AND used = false`; exactly one
	/// concurrent caller observes [`MarkUsedOutcome::Marked`].
	fn mark_used<'a>(
		&'a self,
		id: &'a TokenId,
		instant: OffsetDateTime,
	) -> StoreFuture<'a, MarkUsedOutcome>;

	/// Marks every unused row of `purpose` owned by `owner` as used, returning how many changed.
	fn invalidate_active<'a>(
		&'a self,
		owner: &'a OwnerId,
		purpose: TokenPurpose,
		instant: OffsetDateTime,
	) -> StoreFuture<'a, usize>;

	/// Deletes rows that were used, or that expired, before `cutoff`. Returns the number removed.
	fn purge(&self, cutoff: OffsetDateTime) -> StoreFuture<'_, usize>;
}

/// Result of a conditional [`TokenStore::mark_used`] update.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkUsedOutcome {
	/// The row was unused and is now marked used.
	Marked,
	/// The row had already been marked used.
	AlreadyUsed,
	/// No row matched the identifier.
	Missing,
}

/// Error type produced by [`TokenStore`] and bucket store implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
	/// Conditional updates kept losing to concurrent writers.
	#[error("Too much contention on key `{key}`.")]
	Contention {
		/// Contended key.
		key: String,
	},
}
