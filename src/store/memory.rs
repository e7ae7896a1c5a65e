//! Thread-safe in-memory [`TokenStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::{OwnerId, TokenHash, TokenId, TokenPurpose, VerificationToken},
	store::{MarkUsedOutcome, StoreFuture, TokenStore},
};

/// Rows keyed by identifier plus a unique index on the keyed hash.
#[derive(Clone, Debug, Default)]
pub(crate) struct TokenTable {
	rows: HashMap<TokenId, VerificationToken>,
	by_hash: HashMap<TokenHash, TokenId>,
}
impl TokenTable {
	pub(crate) fn from_rows(rows: impl IntoIterator<Item = VerificationToken>) -> Self {
		let mut table = Self::default();

		rows.into_iter().for_each(|row| table.insert(row));

		table
	}

	pub(crate) fn rows(&self) -> impl Iterator<Item = &VerificationToken> {
		self.rows.values()
	}

	pub(crate) fn len(&self) -> usize {
		self.rows.len()
	}

	pub(crate) fn insert(&mut self, record: VerificationToken) {
		if let Some(previous) = self.rows.remove(&record.id) {
			self.by_hash.remove(&previous.token_hash);
		}

		self.by_hash.insert(record.token_hash.clone(), record.id.clone());
		self.rows.insert(record.id.clone(), record);
	}

	pub(crate) fn find_by_hash(&self, hash: &TokenHash) -> Option<VerificationToken> {
		self.by_hash.get(hash).and_then(|id| self.rows.get(id)).cloned()
	}

	pub(crate) fn mark_used(&mut self, id: &TokenId, instant: OffsetDateTime) -> MarkUsedOutcome {
		match self.rows.get_mut(id) {
			Some(row) if row.used => MarkUsedOutcome::AlreadyUsed,
			Some(row) => {
				row.mark_used(instant);

				MarkUsedOutcome::Marked
			},
			None => MarkUsedOutcome::Missing,
		}
	}

	pub(crate) fn invalidate_active(
		&mut self,
		owner: &OwnerId,
		purpose: TokenPurpose,
		instant: OffsetDateTime,
	) -> usize {
		let mut invalidated = 0;

		for row in self.rows.values_mut() {
			if !row.used && row.purpose == purpose && &row.owner == owner {
				row.mark_used(instant);

				invalidated += 1;
			}
		}

		invalidated
	}

	pub(crate) fn purge(&mut self, cutoff: OffsetDateTime) -> usize {
		let stale = self
			.rows
			.values()
			.filter(|row| {
				row.expires_at <= cutoff || row.used_at.is_some_and(|used_at| used_at < cutoff)
			})
			.map(|row| row.id.clone())
			.collect::<Vec<_>>();

		for id in &stale {
			if let Some(row) = self.rows.remove(id) {
				self.by_hash.remove(&row.token_hash);
			}
		}

		stale.len()
	}
}

type StoreTable = Arc<RwLock<TokenTable>>;

/// Thread-safe storage backend that keeps token rows in-process for tests and demos.
#[derive(Clone, Debug, Default)]
pub struct MemoryTokenStore(StoreTable);
impl MemoryTokenStore {
	/// Number of rows currently held.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when the store holds no rows.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Returns a snapshot of every row, e.g. for audits.
	pub fn snapshot(&self) -> Vec<VerificationToken> {
		self.0.read().rows().cloned().collect()
	}
}
impl TokenStore for MemoryTokenStore {
	fn insert(&self, record: VerificationToken) -> StoreFuture<'_, ()> {
		let table = self.0.clone();

		Box::pin(async move {
			table.write().insert(record);

			Ok(())
		})
	}

	fn find_by_hash<'a>(
		&'a self,
		hash: &'a TokenHash,
	) -> StoreFuture<'a, Option<VerificationToken>> {
		let table = self.0.clone();

		Box::pin(async move { Ok(table.read().find_by_hash(hash)) })
	}

	fn mark_used<'a>(
		&'a self,
		id: &'a TokenId,
		instant: OffsetDateTime,
	) -> StoreFuture<'a, MarkUsedOutcome> {
		let table = self.0.clone();

		Box::pin(async move { Ok(table.write().mark_used(id, instant)) })
	}

	fn invalidate_active<'a>(
		&'a self,
		owner: &'a OwnerId,
		purpose: TokenPurpose,
		instant: OffsetDateTime,
	) -> StoreFuture<'a, usize> {
		let table = self.0.clone();

		Box::pin(async move { Ok(table.write().invalidate_active(owner, purpose, instant)) })
	}

	fn purge(&self, cutoff: OffsetDateTime) -> StoreFuture<'_, usize> {
		let table = self.0.clone();

		Box::pin(async move { Ok(table.write().purge(cutoff)) })
	}
}
