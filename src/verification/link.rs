//! Links that carry a verification secret back to the application.

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::ConfigError,
	verification::{IssuedToken, Verifier},
};

/// Account roles with their own verification landing page.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
	/// Learner account.
	Student,
	/// Guardian account.
	Parent,
	/// Teaching staff account.
	Instructor,
}
impl Role {
	/// Returns the stable lowercase label.
	pub const fn as_str(self) -> &'static str {
		match self {
			Role::Student => "student",
			Role::Parent => "parent",
			Role::Instructor => "instructor",
		}
	}
}
impl Display for Role {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Builders for the URLs embedded in verification and invite emails.
#[derive(Clone, Copy, Debug)]
pub struct VerificationLink;
impl VerificationLink {
	/// `<base>/<role>s/verify?token=<secret>`.
	pub fn verify(base: &Url, role: Role, secret: &TokenSecret) -> Result<Url, ConfigError> {
		Self::build(base, &format!("{role}s/verify"), secret)
	}

	/// `<base>/invite/complete?token=<secret>`.
	pub fn invite(base: &Url, secret: &TokenSecret) -> Result<Url, ConfigError> {
		Self::build(base, "invite/complete", secret)
	}

	fn build(base: &Url, path: &str, secret: &TokenSecret) -> Result<Url, ConfigError> {
		let mut base = base.clone();

		// Without a trailing slash `join` would replace the last segment instead of extending it.
		if !base.path().ends_with('/') {
			let extended = format!("{}/", base.path());

			base.set_path(&extended);
		}

		let mut url = base.join(path).map_err(|source| ConfigError::LinkBuild { source })?;

		url.query_pairs_mut().append_pair("token", secret.expose());

		Ok(url)
	}
}

impl Verifier {
	/// Email verification link for `issued`, rooted at the configured application URL.
	pub fn verification_link(&self, role: Role, issued: &IssuedToken) -> Result<Url, ConfigError> {
		VerificationLink::verify(&self.base_url, role, &issued.secret)
	}

	/// Invite acceptance link for `issued`, rooted at the configured application URL.
	pub fn invite_link(&self, issued: &IssuedToken) -> Result<Url, ConfigError> {
		VerificationLink::invite(&self.base_url, &issued.secret)
	}
}
