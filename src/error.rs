//! Guard-level error types shared by the rate limiter, the verification flows, and the stores.

// self
use crate::_prelude::*;

/// Guard-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Message returned to clients whose requests were throttled.
pub const TOO_MANY_REQUESTS_MESSAGE: &str = "Too many requests";

/// Canonical guard error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),

	/// No token matches the presented secret, or it was issued for another purpose.
	#[error("Invalid token.")]
	InvalidToken,
	/// The token was already redeemed and must not be reused.
	#[error("Token already used.")]
	TokenAlreadyUsed,
	/// The token reached its expiry instant.
	#[error("Token expired.")]
	TokenExpired,
	/// The caller exhausted its request budget.
	#[error("Too many requests; retry in {retry_after}.")]
	TooManyRequests {
		/// Suggested wait before the next attempt.
		retry_after: Duration,
	},
}
impl Error {
	/// HTTP status code the request boundary should answer with.
	pub fn status_code(&self) -> u16 {
		match self {
			Self::TooManyRequests { .. } => 429,
			Self::InvalidToken | Self::TokenAlreadyUsed | Self::TokenExpired => 400,
			Self::Storage(_) | Self::Config(_) => 500,
		}
	}

	/// Returns `true` for token failures that are the caller's fault.
	pub fn is_token_error(&self) -> bool {
		matches!(self, Self::InvalidToken | Self::TokenAlreadyUsed | Self::TokenExpired)
	}

	/// Builds the structured JSON body the request boundary should return.
	pub fn body(&self) -> ErrorBody {
		match self {
			Self::TooManyRequests { .. } => ErrorBody::new(TOO_MANY_REQUESTS_MESSAGE),
			e if e.is_token_error() => ErrorBody::new(e.to_string()).with_field("token"),
			// Internal details stay in logs.
			_ => ErrorBody::new("Internal server error"),
		}
	}
}

/// Structured error envelope handed to HTTP clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
	/// Always `false` for error envelopes.
	pub success: bool,
	/// User-facing message.
	pub message: String,
	/// Request field the error refers to, if any.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub field: Option<String>,
}
impl ErrorBody {
	/// Creates a field-less error body.
	pub fn new(message: impl Into<String>) -> Self {
		Self { success: false, message: message.into(), field: None }
	}

	/// Names the request field the error refers to.
	pub fn with_field(mut self, field: impl Into<String>) -> Self {
		self.field = Some(field.into());

		self
	}
}

/// Configuration and validation failures raised while assembling guards.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Bucket capacity must allow at least one request.
	#[error("Rate limit capacity must be a finite number of at least 1, got {capacity}.")]
	InvalidCapacity {
		/// Rejected capacity.
		capacity: f64,
	},
	/// Refill rate must be positive.
	#[error("Rate limit refill rate must be a finite positive number, got {rate}.")]
	InvalidRefillRate {
		/// Rejected refill rate.
		rate: f64,
	},
	/// Key prefix must not be empty.
	#[error("Rate limit key prefix cannot be empty.")]
	EmptyKeyPrefix,
	/// A lifetime setting is zero where that is meaningless, or too large to represent.
	#[error("`{field}` must be between {min} and {max} seconds, got {seconds}.")]
	InvalidLifetime {
		/// Offending setting.
		field: &'static str,
		/// Rejected value.
		seconds: u64,
		/// Smallest accepted value.
		min: u64,
		/// Largest accepted value.
		max: u64,
	},
	/// HMAC key is missing.
	#[error("Token secret cannot be empty.")]
	EmptyTokenSecret,
	/// HMAC key was rejected by the MAC implementation.
	#[error("Token secret has an unsupported length.")]
	InvalidTokenSecret,
	/// Application base URL cannot be used to build links.
	#[error("Base URL `{url}` is not a valid absolute URL.")]
	InvalidBaseUrl {
		/// Offending URL.
		url: String,
	},
	/// Link path could not be joined onto the base URL.
	#[error("Link could not be built.")]
	LinkBuild {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Token row builder validation failed.
	#[error("Unable to build verification token.")]
	TokenBuild(#[from] crate::auth::VerificationTokenBuilderError),
	/// Configuration document failed to parse.
	#[error("Configuration is invalid at `{path}`.")]
	Parse {
		/// JSON path of the failing field.
		path: String,
		/// Underlying parser failure.
		#[source]
		source: serde_json::Error,
	},
}
impl From<serde_path_to_error::Error<serde_json::Error>> for ConfigError {
	fn from(e: serde_path_to_error::Error<serde_json::Error>) -> Self {
		let path = e.path().to_string();

		Self::Parse { path, source: e.into_inner() }
	}
}
