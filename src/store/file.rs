//! Simple file-backed [`TokenStore`] for single-node deployments.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::{OwnerId, TokenHash, TokenId, TokenPurpose, VerificationToken},
	store::{MarkUsedOutcome, StoreError, StoreFuture, TokenStore, memory::TokenTable},
};

/// Persists token rows to a JSON file after each mutation.
#[derive(Clone, Debug)]
pub struct FileTokenStore {
	path: PathBuf,
	inner: Arc<RwLock<TokenTable>>,
}
impl FileTokenStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing rows.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let table = Self::load_snapshot(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(table)) })
	}

	fn load_snapshot(path: &Path) -> Result<TokenTable, StoreError> {
		if !path.exists() {
			return Ok(TokenTable::default());
		}

		let metadata = path.metadata().map_err(|e| StoreError::Backend {
			message: format!("Failed to inspect {}: {e}", path.display()),
		})?;

		if metadata.len() == 0 {
			return Ok(TokenTable::default());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;
		let rows: Vec<VerificationToken> =
			serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
				message: format!("Failed to parse {}: {e}", path.display()),
			})?;

		Ok(TokenTable::from_rows(rows))
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}
		Ok(())
	}

	/// Applies `mutate` to a copy of the table and publishes the copy only once it is on disk.
	fn commit<T>(
		&self,
		mutate: impl FnOnce(&mut TokenTable) -> T,
		changed: impl FnOnce(&T) -> bool,
	) -> Result<T, StoreError> {
		let mut guard = self.inner.write();
		let mut next = guard.clone();
		let outcome = mutate(&mut next);

		if changed(&outcome) {
			self.persist_locked(&next)?;

			*guard = next;
		}

		Ok(outcome)
	}

	fn persist_locked(&self, table: &TokenTable) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let snapshot: Vec<_> = table.rows().collect();
		let serialized =
			serde_json::to_vec_pretty(&snapshot).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize store snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl TokenStore for FileTokenStore {
	fn insert(&self, record: VerificationToken) -> StoreFuture<'_, ()> {
		Box::pin(async move { self.commit(|table| table.insert(record), |_| true) })
	}

	fn find_by_hash<'a>(
		&'a self,
		hash: &'a TokenHash,
	) -> StoreFuture<'a, Option<VerificationToken>> {
		Box::pin(async move { Ok(self.inner.read().find_by_hash(hash)) })
	}

	fn mark_used<'a>(
		&'a self,
		id: &'a TokenId,
		instant: OffsetDateTime,
	) -> StoreFuture<'a, MarkUsedOutcome> {
		Box::pin(async move {
			self.commit(
				|table| table.mark_used(id, instant),
				|outcome| matches!(outcome, MarkUsedOutcome::Marked),
			)
		})
	}

	fn invalidate_active<'a>(
		&'a self,
		owner: &'a OwnerId,
		purpose: TokenPurpose,
		instant: OffsetDateTime,
	) -> StoreFuture<'a, usize> {
		Box::pin(async move {
			self.commit(|table| table.invalidate_active(owner, purpose, instant), |n| *n > 0)
		})
	}

	fn purge(&self, cutoff: OffsetDateTime) -> StoreFuture<'_, usize> {
		Box::pin(async move { self.commit(|table| table.purge(cutoff), |n| *n > 0) })
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, process};
	// crates.io
	use tokio::runtime::Runtime;
	// self
	use super::*;

	fn temp_path() -> PathBuf {
		let unique = format!(
			"lms_guard_file_store_{}_{}.json",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		);

		env::temp_dir().join(unique)
	}

	fn build_record() -> VerificationToken {
		let owner = OwnerId::new("user-demo").expect("Failed to build owner fixture.");

		VerificationToken::builder(owner, TokenPurpose::EmailVerification)
			.token_hash(TokenHash::from_encoded("file-store-hash"))
			.expires_in(Duration::hours(24))
			.build()
			.expect("Failed to build file-store test record.")
	}

	#[test]
	fn save_mark_and_reload_round_trip() {
		let path = temp_path();
		let store = FileTokenStore::open(&path).expect("Failed to open file store snapshot.");
		let record = build_record();
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file store test.");

		rt.block_on(store.insert(record.clone()))
			.expect("Failed to save fixture record to file store.");

		let outcome = rt
			.block_on(store.mark_used(&record.id, OffsetDateTime::now_utc()))
			.expect("Failed to mark fixture record as used.");

		assert_eq!(outcome, MarkUsedOutcome::Marked);

		drop(store);

		let reopened = FileTokenStore::open(&path).expect("Failed to reopen file store snapshot.");
		let fetched = rt
			.block_on(reopened.find_by_hash(&record.token_hash))
			.expect("Failed to fetch fixture record from file store.")
			.expect("File store lost record after reopen.");

		assert_eq!(fetched.id, record.id);
		assert!(fetched.used, "Usage flag must survive a reopen.");

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}

	#[test]
	fn failed_persist_leaves_memory_untouched() {
		let path = temp_path();
		let store = FileTokenStore::open(&path).expect("Failed to open file store snapshot.");
		let record = build_record();
		let owner = record.owner.clone();
		let now = OffsetDateTime::now_utc();
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file store test.");

		rt.block_on(store.insert(record.clone()))
			.expect("Failed to save fixture record to file store.");

		// A directory where the temporary snapshot should go makes every write fail.
		let blocker = path.with_extension("tmp");

		fs::create_dir(&blocker).expect("Failed to create blocking directory.");

		let mut other = build_record();

		other.id = TokenId::generate();
		other.token_hash = TokenHash::from_encoded("file-store-other");

		assert!(rt.block_on(store.insert(other.clone())).is_err());
		assert!(rt.block_on(store.mark_used(&record.id, now)).is_err());
		assert!(
			rt.block_on(store.invalidate_active(&owner, TokenPurpose::EmailVerification, now))
				.is_err()
		);
		assert!(rt.block_on(store.purge(now + Duration::days(2))).is_err());

		let snapshot = store.inner.read().rows().cloned().collect::<Vec<_>>();

		assert_eq!(snapshot.len(), 1, "Rejected writes must not be visible.");
		assert!(!snapshot[0].used, "Rejected writes must not be visible.");

		fs::remove_dir(&blocker).expect("Failed to remove blocking directory.");

		assert_eq!(
			rt.block_on(store.mark_used(&record.id, now)).expect("Mark should succeed."),
			MarkUsedOutcome::Marked
		);

		let reopened = FileTokenStore::open(&path).expect("Failed to reopen file store snapshot.");

		assert!(
			rt.block_on(reopened.find_by_hash(&other.token_hash))
				.expect("Lookup should succeed.")
				.is_none()
		);

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}
}
