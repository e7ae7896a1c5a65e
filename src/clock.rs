//! Injectable time sources so limiter refills and token expiry can be driven deterministically.

// crates.io
use time::PrimitiveDateTime;
// self
use crate::_prelude::*;

/// Source of the current instant.
pub trait Clock
where
	Self: Send + Sync,
{
	/// Returns the current UTC instant.
	fn now(&self) -> OffsetDateTime;
}

/// Wall-clock time source.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;
impl Clock for SystemClock {
	fn now(&self) -> OffsetDateTime {
		OffsetDateTime::now_utc()
	}
}

/// Manually advanced time source for tests and simulations.
#[derive(Debug)]
pub struct ManualClock(Mutex<OffsetDateTime>);
impl ManualClock {
	/// Creates a clock frozen at `instant`.
	pub fn new(instant: OffsetDateTime) -> Self {
		Self(Mutex::new(instant))
	}

	/// Moves the clock forward (or backward, for negative durations).
	pub fn advance(&self, delta: Duration) {
		*self.0.lock() += delta;
	}

	/// Pins the clock to `instant`.
	pub fn set(&self, instant: OffsetDateTime) {
		*self.0.lock() = instant;
	}
}
impl Default for ManualClock {
	fn default() -> Self {
		Self::new(OffsetDateTime::UNIX_EPOCH)
	}
}
impl Clock for ManualClock {
	fn now(&self) -> OffsetDateTime {
		*self.0.lock()
	}
}

/// `instant + delta`, clamped to the representable range instead of overflowing.
pub fn saturating_add(instant: OffsetDateTime, delta: Duration) -> OffsetDateTime {
	instant.checked_add(delta).unwrap_or(if delta.is_negative() {
		PrimitiveDateTime::MIN.assume_utc()
	} else {
		PrimitiveDateTime::MAX.assume_utc()
	})
}

/// `seconds` as a [`Duration`], saturating at [`Duration::MAX`] (or [`Duration::MIN`]).
pub fn saturating_seconds(seconds: f64) -> Duration {
	Duration::checked_seconds_f64(seconds).unwrap_or(if seconds.is_sign_negative() {
		Duration::MIN
	} else {
		Duration::MAX
	})
}

/// Shared clock handle used by default throughout the crate.
pub fn system() -> Arc<dyn Clock> {
	Arc::new(SystemClock)
}
