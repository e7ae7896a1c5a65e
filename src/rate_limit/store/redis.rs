//! Redis-backed [`BucketStore`] for horizontally scaled deployments.
//!
//! Each key is a hash with the fields `tokens`, `last` (unix nanoseconds), and `version`.
//! Writes go through a Lua compare-and-set that also re-arms `PEXPIRE`, so idle buckets vanish
//! on their own and concurrent processes never overwrite each other's decisions.

// crates.io
use redis::{Script, aio::ConnectionManager};
// self
use crate::{
	_prelude::*,
	config::MAX_LIFETIME_SECONDS,
	rate_limit::{Bucket, BucketCasOutcome, BucketStore, VersionedBucket},
	store::{StoreError, StoreFuture},
};

const CAS_SCRIPT: &str = r"
local current = redis.call('HGET', KEYS[1], 'version')
if (not current and ARGV[1] == '') or current == ARGV[1] then
	redis.call('HSET', KEYS[1], 'tokens', ARGV[2], 'last', ARGV[3], 'version', ARGV[4])
	redis.call('PEXPIRE', KEYS[1], ARGV[5])
	return 1
end
return 0
";

/// Bucket store shared by every process connected to the same Redis instance.
#[derive(Clone)]
pub struct RedisBucketStore {
	conn: ConnectionManager,
	cas: Arc<Script>,
}
impl RedisBucketStore {
	/// Wraps an established connection manager.
	pub fn new(conn: ConnectionManager) -> Self {
		Self { conn, cas: Arc::new(Script::new(CAS_SCRIPT)) }
	}

	/// Connects to `url` (e.g. `redis://127.0.0.1/`).
	pub async fn connect(url: &str) -> Result<Self, StoreError> {
		let client = redis::Client::open(url).map_err(backend)?;
		let conn = ConnectionManager::new(client).await.map_err(backend)?;

		Ok(Self::new(conn))
	}

	fn decode(key: &str, fields: Vec<Option<String>>) -> Result<Option<VersionedBucket>, StoreError> {
		let [tokens, last, version]: [Option<String>; 3] =
			fields.try_into().map_err(|_| serialization(key, "unexpected HMGET arity"))?;
		let (Some(tokens), Some(last), Some(version)) = (tokens, last, version) else {
			return Ok(None);
		};
		let tokens = tokens.parse::<f64>().map_err(|e| serialization(key, e))?;
		let last = last.parse::<i128>().map_err(|e| serialization(key, e))?;
		let last_refill_at =
			OffsetDateTime::from_unix_timestamp_nanos(last).map_err(|e| serialization(key, e))?;
		let version = version.parse::<u64>().map_err(|e| serialization(key, e))?;

		Ok(Some(VersionedBucket { bucket: Bucket { tokens, last_refill_at }, version }))
	}
}
impl Debug for RedisBucketStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("RedisBucketStore(..)")
	}
}
impl BucketStore for RedisBucketStore {
	fn load<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<VersionedBucket>> {
		Box::pin(async move {
			let mut conn = self.conn.clone();
			let fields: Vec<Option<String>> = redis::cmd("HMGET")
				.arg(key)
				.arg("tokens")
				.arg("last")
				.arg("version")
				.query_async(&mut conn)
				.await
				.map_err(backend)?;

			Self::decode(key, fields)
		})
	}

	fn compare_and_swap<'a>(
		&'a self,
		key: &'a str,
		expected: Option<u64>,
		bucket: Bucket,
		ttl: Duration,
	) -> StoreFuture<'a, BucketCasOutcome> {
		Box::pin(async move {
			let mut conn = self.conn.clone();
			let expected_arg = expected.map(|v| v.to_string()).unwrap_or_default();
			let next_version = expected.map_or(1, |v| v + 1);
			let ttl_ms = ttl.whole_milliseconds().clamp(1, MAX_LIFETIME_SECONDS as i128 * 1_000);
			let updated: i64 = self
				.cas
				.key(key)
				.arg(expected_arg)
				.arg(bucket.tokens.to_string())
				.arg(bucket.last_refill_at.unix_timestamp_nanos().to_string())
				.arg(next_version)
				.arg(ttl_ms.to_string())
				.invoke_async(&mut conn)
				.await
				.map_err(backend)?;

			Ok(if updated == 1 { BucketCasOutcome::Updated } else { BucketCasOutcome::Conflict })
		})
	}
}

fn backend(e: redis::RedisError) -> StoreError {
	StoreError::Backend { message: e.to_string() }
}

fn serialization(key: &str, e: impl Display) -> StoreError {
	StoreError::Serialization { message: format!("Bucket `{key}` is corrupt: {e}") }
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn fields(tokens: &str, last: &str, version: &str) -> Vec<Option<String>> {
		vec![Some(tokens.into()), Some(last.into()), Some(version.into())]
	}

	#[test]
	fn decode_handles_missing_and_corrupt_hashes() {
		assert_eq!(RedisBucketStore::decode("k", vec![None, None, None]), Ok(None));

		let decoded = RedisBucketStore::decode("k", fields("2.5", "1000000000", "7"))
			.expect("Well-formed hash should decode.")
			.expect("Well-formed hash should yield a bucket.");

		assert_eq!(decoded.version, 7);
		assert_eq!(decoded.bucket.tokens, 2.5);
		assert_eq!(decoded.bucket.last_refill_at.unix_timestamp(), 1);
		assert!(matches!(
			RedisBucketStore::decode("k", fields("lots", "0", "1")),
			Err(StoreError::Serialization { .. })
		));
	}
}
