//! Purpose tags that bind a verification token to a single flow.

// self
use crate::_prelude::*;

/// Flow a verification token may be redeemed for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
	/// Proves control of the email address on an account.
	EmailVerification,
	/// Completes an invitation (e.g. a parent-created child account) by setting a password.
	InviteAccept,
}
impl TokenPurpose {
	/// Returns the stable tag stored alongside token rows.
	pub const fn as_str(self) -> &'static str {
		match self {
			TokenPurpose::EmailVerification => "email_verification",
			TokenPurpose::InviteAccept => "invite_accept",
		}
	}
}
impl Display for TokenPurpose {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for TokenPurpose {
	type Err = UnknownPurpose;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"email_verification" => Ok(Self::EmailVerification),
			"invite_accept" => Ok(Self::InviteAccept),
			other => Err(UnknownPurpose(other.to_owned())),
		}
	}
}

/// Error returned when a stored purpose tag is not recognized.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Unknown token purpose `{0}`.")]
pub struct UnknownPurpose(pub String);
