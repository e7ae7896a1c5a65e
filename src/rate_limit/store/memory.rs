//! Thread-safe in-process [`BucketStore`] with idle expiry and a least-recently-used bound.

// self
use crate::{
	_prelude::*,
	clock::{self, Clock},
	config::RateLimitConfig,
	rate_limit::{Bucket, BucketCasOutcome, BucketStore, VersionedBucket},
	store::StoreFuture,
};

#[derive(Clone, Copy, Debug)]
struct Entry {
	bucket: Bucket,
	version: u64,
	expires_at: OffsetDateTime,
	touched_at: OffsetDateTime,
}

/// Buckets kept in a process-local map.
///
/// Entries expire after their TTL of inactivity. When `max_keys` is set, inserting a new key into
/// a full map first drops expired entries and then evicts the least recently written key.
#[derive(Clone)]
pub struct MemoryBucketStore {
	entries: Arc<Mutex<HashMap<String, Entry>>>,
	max_keys: Option<usize>,
	clock: Arc<dyn Clock>,
}
impl MemoryBucketStore {
	/// Creates an unbounded store.
	pub fn new() -> Self {
		Self { entries: Default::default(), max_keys: None, clock: clock::system() }
	}

	/// Creates a store bounded by `config.max_keys`, if set.
	pub fn from_config(config: &RateLimitConfig) -> Self {
		let store = Self::new();

		match config.max_keys {
			Some(max_keys) => store.with_max_keys(max_keys),
			None => store,
		}
	}

	/// Bounds the number of keys kept in memory.
	pub fn with_max_keys(mut self, max_keys: usize) -> Self {
		self.max_keys = Some(max_keys.max(1));

		self
	}

	/// Replaces the clock used to evaluate expiry.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Number of keys currently held, including expired ones not yet pruned.
	pub fn len(&self) -> usize {
		self.entries.lock().len()
	}

	/// Returns `true` when no keys are held.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Drops every expired entry, returning how many were removed.
	pub fn prune_expired(&self) -> usize {
		let now = self.clock.now();
		let mut entries = self.entries.lock();

		Self::prune_locked(&mut entries, now)
	}

	fn prune_locked(entries: &mut HashMap<String, Entry>, now: OffsetDateTime) -> usize {
		let before = entries.len();

		entries.retain(|_, entry| entry.expires_at > now);

		before - entries.len()
	}

	fn evict_lru_locked(entries: &mut HashMap<String, Entry>) {
		let oldest = entries
			.iter()
			.min_by_key(|(_, entry)| entry.touched_at)
			.map(|(key, _)| key.clone());

		if let Some(key) = oldest {
			entries.remove(&key);
		}
	}

	fn load_now(&self, key: &str) -> Option<VersionedBucket> {
		let now = self.clock.now();
		let entries = self.entries.lock();

		entries
			.get(key)
			.filter(|entry| entry.expires_at > now)
			.map(|entry| VersionedBucket { bucket: entry.bucket, version: entry.version })
	}

	fn cas_now(
		&self,
		key: &str,
		expected: Option<u64>,
		bucket: Bucket,
		ttl: Duration,
	) -> BucketCasOutcome {
		let now = self.clock.now();
		let mut entries = self.entries.lock();
		let live_version =
			entries.get(key).filter(|entry| entry.expires_at > now).map(|entry| entry.version);

		if live_version != expected {
			return BucketCasOutcome::Conflict;
		}

		let is_new = !entries.contains_key(key);

		if let Some(max_keys) = self.max_keys.filter(|max| is_new && entries.len() >= *max) {
			Self::prune_locked(&mut entries, now);

			while entries.len() >= max_keys {
				Self::evict_lru_locked(&mut entries);
			}
		}

		// An expired entry restarts its version sequence.
		let version = expected.map_or(1, |v| v + 1);

		entries.insert(
			key.to_owned(),
			Entry { bucket, version, expires_at: clock::saturating_add(now, ttl), touched_at: now },
		);

		BucketCasOutcome::Updated
	}
}
impl Default for MemoryBucketStore {
	fn default() -> Self {
		Self::new()
	}
}
impl Debug for MemoryBucketStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("MemoryBucketStore")
			.field("keys", &self.len())
			.field("max_keys", &self.max_keys)
			.finish()
	}
}
impl BucketStore for MemoryBucketStore {
	fn load<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<VersionedBucket>> {
		Box::pin(async move { Ok(self.load_now(key)) })
	}

	fn compare_and_swap<'a>(
		&'a self,
		key: &'a str,
		expected: Option<u64>,
		bucket: Bucket,
		ttl: Duration,
	) -> StoreFuture<'a, BucketCasOutcome> {
		Box::pin(async move { Ok(self.cas_now(key, expected, bucket, ttl)) })
	}
}
