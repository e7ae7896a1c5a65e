// self
use crate::{_prelude::*, obs::GuardOp, store::StoreError};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedOp<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedOp<F> = F;

/// A span builder used by guard operations.
#[derive(Clone, Debug)]
pub struct OpSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl OpSpan {
	/// Creates a new span tagged with the provided operation + stage.
	pub fn new(op: GuardOp, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("lms_guard.op", op = op.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (op, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedOp<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Logs a store failure that a policy absorbed instead of propagating.
pub fn log_absorbed_store_error(op: GuardOp, key: &str, error: &StoreError, action: &'static str) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(op = op.as_str(), key, %error, action, "bucket store failed");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (op, key, error, action);
	}
}

/// Logs a rejected redemption at debug level. The secret itself is never logged.
pub fn log_token_rejection(op: GuardOp, reason: &Error) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(op = op.as_str(), %reason, "verification token rejected");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (op, reason);
	}
}
