//! Keyed hashing of verification secrets.
//!
//! Only the HMAC-SHA256 of a secret is ever persisted. Without the server key, a leaked
//! [`TokenHash`] can neither be inverted nor used to mint new valid tokens.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use sha2::Sha256;
// self
use crate::{_prelude::*, auth::TokenSecret, error::ConfigError};

type HmacSha256 = Hmac<Sha256>;

/// Base64url (no padding) encoding of an HMAC-SHA256 digest.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenHash(String);
impl TokenHash {
	/// Wraps an already-encoded digest, e.g. when loading rows from storage.
	pub fn from_encoded(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the encoded digest.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl Debug for TokenHash {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		// Eight characters are enough to correlate rows in logs.
		let prefix = self.0.get(..8).unwrap_or(&self.0);

		write!(f, "TokenHash({prefix}..)")
	}
}

/// Computes [`TokenHash`] values under the server-side key.
#[derive(Clone)]
pub struct TokenHasher {
	mac: HmacSha256,
}
impl TokenHasher {
	/// Builds a hasher keyed with `key`.
	pub fn new(key: impl AsRef<[u8]>) -> Result<Self, ConfigError> {
		let key = key.as_ref();

		if key.is_empty() {
			return Err(ConfigError::EmptyTokenSecret);
		}

		let mac = HmacSha256::new_from_slice(key).map_err(|_| ConfigError::InvalidTokenSecret)?;

		Ok(Self { mac })
	}

	/// Hashes the provided secret.
	pub fn hash(&self, secret: &TokenSecret) -> TokenHash {
		let mut mac = self.mac.clone();

		mac.update(secret.expose().as_bytes());

		TokenHash(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
	}
}
impl Debug for TokenHasher {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("TokenHasher(<redacted>)")
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn hashing_is_deterministic_and_keyed() {
		let secret = TokenSecret::new("fixture-secret");
		let hasher = TokenHasher::new("key-a").expect("Hasher fixture should build.");
		let other = TokenHasher::new("key-b").expect("Second hasher fixture should build.");

		assert_eq!(hasher.hash(&secret), hasher.hash(&secret));
		assert_ne!(hasher.hash(&secret), other.hash(&secret));
		assert_ne!(hasher.hash(&secret), hasher.hash(&TokenSecret::new("fixture-secreT")));
	}

	#[test]
	fn matches_rfc4231_vector() {
		// RFC 4231 test case 2.
		let hasher = TokenHasher::new("Jefe").expect("RFC key should be accepted.");
		let digest = hasher.hash(&TokenSecret::new("what do ya want for nothing?"));
		let raw = URL_SAFE_NO_PAD.decode(digest.as_str()).expect("Digest should decode.");
		let hex = raw.iter().map(|b| format!("{b:02x}")).collect::<String>();

		assert_eq!(hex, "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843");
	}

	#[test]
	fn empty_key_is_rejected() {
		assert!(matches!(TokenHasher::new(""), Err(ConfigError::EmptyTokenSecret)));
	}

	#[test]
	fn debug_output_is_truncated() {
		let hash = TokenHash::from_encoded("abcdefghijklmnop");

		assert_eq!(format!("{hash:?}"), "TokenHash(abcdefgh..)");
		assert_eq!(format!("{:?}", TokenHasher::new("k").expect("Hasher should build.")), "TokenHasher(<redacted>)");
	}
}
