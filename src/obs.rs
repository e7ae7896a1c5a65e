//! Optional observability helpers for guard operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` (default) to emit structured spans named `lms_guard.op` with the `op` and
//!   `stage` fields, plus `warn` events whenever a store failure is absorbed by a policy.
//! - Enable `metrics` to increment the `lms_guard_op_total` counter for every
//!   attempt/success/failure/rejection, labeled by `op` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Guard operations observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GuardOp {
	/// Token-bucket admission decision.
	RateLimit,
	/// Verification token issuance.
	Issue,
	/// Verification token redemption.
	Redeem,
	/// Verification token lookup without redemption.
	Inspect,
	/// Stale token removal.
	Purge,
	/// Legacy token migration.
	Migrate,
}
impl GuardOp {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			GuardOp::RateLimit => "rate_limit",
			GuardOp::Issue => "issue",
			GuardOp::Redeem => "redeem",
			GuardOp::Inspect => "inspect",
			GuardOp::Purge => "purge",
			GuardOp::Migrate => "migrate",
		}
	}
}
impl Display for GuardOp {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpOutcome {
	/// Entry to a guard operation.
	Attempt,
	/// Successful completion (admission, for the rate limiter).
	Success,
	/// Failure propagated back to the caller.
	Failure,
	/// Request turned away by the rate limiter.
	Rejected,
}
impl OpOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpOutcome::Attempt => "attempt",
			OpOutcome::Success => "success",
			OpOutcome::Failure => "failure",
			OpOutcome::Rejected => "rejected",
		}
	}
}
impl Display for OpOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
