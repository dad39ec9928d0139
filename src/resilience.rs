//! Retry timing and admission control shared by every call a client makes.
//!
//! - [`backoff`] computes retry delays from attempt counts and server hints.
//! - [`throttle`] bounds the outbound request rate before the server has to.
//! - [`rate_limit`] describes rate-limit observations handed to operators.

pub mod backoff;
pub mod rate_limit;
pub mod throttle;

pub use backoff::*;
pub use rate_limit::*;
pub use throttle::*;

// self
use crate::_prelude::*;

/// Converts a possibly negative [`Duration`] into a sleepable [`std::time::Duration`].
pub(crate) fn to_std(duration: Duration) -> std::time::Duration {
	if duration.is_negative() { std::time::Duration::ZERO } else { duration.unsigned_abs() }
}
