//! Optional observability helpers for API calls and credential exchanges.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit spans named `realm_client.call` with the `kind` (call type) and
//!   `stage` (call site) fields, plus `debug`/`warn` events for retries, rate limits,
//!   recoveries, and throttle waits. Token values never reach these events; only
//!   fingerprints do.
//! - Enable `metrics` to increment `realm_client_call_total{kind,outcome}` for every
//!   attempt/success/failure and `realm_client_retry_total{reason}` for every scheduled retry.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Call kinds observed by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallKind {
	/// Authenticated call against the realm API.
	Api,
	/// Per-scope temporary credential exchange.
	TempTokenExchange,
	/// Federated assertion exchange.
	FederatedExchange,
	/// Legacy ticket issuance.
	TicketIssue,
}
impl CallKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CallKind::Api => "api",
			CallKind::TempTokenExchange => "temp_token_exchange",
			CallKind::FederatedExchange => "federated_exchange",
			CallKind::TicketIssue => "ticket_issue",
		}
	}
}
impl Display for CallKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallOutcome {
	/// Entry to a call.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl CallOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CallOutcome::Attempt => "attempt",
			CallOutcome::Success => "success",
			CallOutcome::Failure => "failure",
		}
	}
}
impl Display for CallOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Why the executor scheduled another attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RetryReason {
	/// 429 response.
	RateLimited,
	/// 5xx response.
	Server,
	/// Transport deadline.
	Timeout,
	/// Credential refreshed after a 401.
	Recovery,
}
impl RetryReason {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RetryReason::RateLimited => "rate_limited",
			RetryReason::Server => "server",
			RetryReason::Timeout => "timeout",
			RetryReason::Recovery => "recovery",
		}
	}

	/// Maps a retryable error to its reason label.
	pub fn of(error: &Error) -> Option<Self> {
		match error {
			Error::RateLimited { .. } => Some(Self::RateLimited),
			Error::Server(_) => Some(Self::Server),
			Error::Timeout(_) => Some(Self::Timeout),
			_ => None,
		}
	}
}
impl Display for RetryReason {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
