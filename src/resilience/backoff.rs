//! Exponential backoff with jitter and `Retry-After` resolution.

// crates.io
use rand::Rng;
use time::format_description::well_known::Rfc2822;
// self
use crate::_prelude::*;

/// Fraction of the delay used as the uniform jitter band (±10%).
pub const JITTER_RATIO: f64 = 0.1;

/// Timing knobs for computed retry delays.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
	/// Delay before the second attempt.
	pub initial_delay: Duration,
	/// Ceiling applied to the exponential term before jitter.
	pub max_delay: Duration,
	/// Growth factor per attempt.
	pub multiplier: f64,
}
impl Default for BackoffPolicy {
	fn default() -> Self {
		Self {
			initial_delay: Duration::seconds(1),
			max_delay: Duration::seconds(30),
			multiplier: 2.0,
		}
	}
}

/// Delay before retrying after failed attempt number `attempt` (1-based).
///
/// The exponential term `initial_delay * multiplier^(attempt - 1)` is capped at `max_delay`
/// and then jittered by ±10%, so the realized delay never exceeds `max_delay * 1.1` but may
/// land slightly above `max_delay` once the cap is reached.
pub fn compute_delay(attempt: u32, policy: &BackoffPolicy) -> Duration {
	let unit = rand::rng().random_range(-1.0..=1.0);

	delay_with_jitter(attempt, policy, unit)
}

/// Delay to wait after a failed attempt, preferring the server's `Retry-After` hint.
///
/// An integer hint is whole seconds, an HTTP date is measured from now (never negative),
/// and anything else falls back to [`compute_delay`]. Server-driven delays are not jittered.
pub fn resolve_retry_delay(hint: Option<&str>, attempt: u32, policy: &BackoffPolicy) -> Duration {
	hint.and_then(|value| parse_retry_after(value, OffsetDateTime::now_utc()))
		.unwrap_or_else(|| compute_delay(attempt, policy))
}

/// Parses a `Retry-After` value relative to `now`.
pub fn parse_retry_after(value: &str, now: OffsetDateTime) -> Option<Duration> {
	let raw = value.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX)));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - now;

		return Some(if delta.is_negative() { Duration::ZERO } else { delta });
	}

	None
}

/// [`compute_delay`] with the jitter draw supplied by the caller; `unit` is in `[-1, 1]`.
pub(crate) fn delay_with_jitter(attempt: u32, policy: &BackoffPolicy, unit: f64) -> Duration {
	let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
	let max_secs = policy.max_delay.as_seconds_f64().max(0.0);
	let raw = policy.initial_delay.as_seconds_f64() * policy.multiplier.powi(exponent);
	let capped = if raw.is_finite() { raw.clamp(0.0, max_secs) } else { max_secs };
	let jittered = capped + capped * JITTER_RATIO * unit.clamp(-1.0, 1.0);

	Duration::seconds_f64(jittered.max(0.0))
}
