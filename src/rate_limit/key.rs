//! Mapping incoming requests to rate-limit keys.

// std
use std::net::IpAddr;
// self
use crate::_prelude::*;

/// Key used when a request carries neither a subject nor a network address.
pub const ANONYMOUS_KEY: &str = "anon";

/// Request attributes a [`KeyExtractor`] may draw from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestIdentity {
	/// Authenticated subject (e.g. the `sub` claim of a verified JWT).
	pub subject: Option<String>,
	/// Client network address as seen by the server.
	pub remote_addr: Option<IpAddr>,
}
impl RequestIdentity {
	/// Identity of an unauthenticated request from `addr`.
	pub fn from_addr(addr: IpAddr) -> Self {
		Self { subject: None, remote_addr: Some(addr) }
	}

	/// Attaches an authenticated subject.
	pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
		self.subject = Some(subject.into());

		self
	}
}

/// Maps a request to the key its bucket is stored under (before prefixing).
pub trait KeyExtractor
where
	Self: Send + Sync,
{
	/// Returns the bucket key for `identity`.
	fn extract(&self, identity: &RequestIdentity) -> String;
}

/// Authenticated subject, else network address, else [`ANONYMOUS_KEY`].
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultKeyExtractor;
impl KeyExtractor for DefaultKeyExtractor {
	fn extract(&self, identity: &RequestIdentity) -> String {
		identity
			.subject
			.as_deref()
			.filter(|subject| !subject.is_empty())
			.map(str::to_owned)
			.or_else(|| identity.remote_addr.map(|addr| addr.to_string()))
			.unwrap_or_else(|| ANONYMOUS_KEY.to_owned())
	}
}

/// Keys every request by network address only, ignoring authentication.
#[derive(Clone, Copy, Debug, Default)]
pub struct AddrKeyExtractor;
impl KeyExtractor for AddrKeyExtractor {
	fn extract(&self, identity: &RequestIdentity) -> String {
		identity.remote_addr.map_or_else(|| ANONYMOUS_KEY.to_owned(), |addr| addr.to_string())
	}
}

impl<F> KeyExtractor for F
where
	F: Send + Sync + Fn(&RequestIdentity) -> String,
{
	fn extract(&self, identity: &RequestIdentity) -> String {
		self(identity)
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::net::Ipv4Addr;
	// self
	use super::*;

	#[test]
	fn default_extractor_prefers_subject_then_addr() {
		let addr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7));
		let anonymous = RequestIdentity::default();
		let by_addr = RequestIdentity::from_addr(addr);
		let by_subject = by_addr.clone().with_subject("user-1");
		let empty_subject = by_addr.clone().with_subject("");

		assert_eq!(DefaultKeyExtractor.extract(&anonymous), ANONYMOUS_KEY);
		assert_eq!(DefaultKeyExtractor.extract(&by_addr), "10.0.0.7");
		assert_eq!(DefaultKeyExtractor.extract(&by_subject), "user-1");
		assert_eq!(DefaultKeyExtractor.extract(&empty_subject), "10.0.0.7");
		assert_eq!(AddrKeyExtractor.extract(&by_subject), "10.0.0.7");
	}

	#[test]
	fn closures_act_as_extractors() {
		let extractor = |identity: &RequestIdentity| {
			identity.subject.clone().unwrap_or_else(|| "guest".into())
		};

		assert_eq!(extractor.extract(&RequestIdentity::default()), "guest");
	}
}
