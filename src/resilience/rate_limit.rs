//! Rate-limit observations surfaced to operators.

// self
use crate::{
	_prelude::*,
	auth::ScopeKey,
	http::{CorrelationIds, Method},
};

/// Callback invoked for every rate-limited response, whether or not a retry follows.
pub type RateLimitObserver = Arc<dyn Fn(&RateLimitInfo) + Send + Sync>;

/// Structured snapshot of one rate-limited response.
#[derive(Clone, Debug, PartialEq)]
pub struct RateLimitInfo {
	/// Delay the executor resolved for the next attempt.
	pub retry_after: Duration,
	/// Raw `Retry-After` header, if the server sent one.
	pub retry_after_header: Option<String>,
	/// Attempt number (1-based) that was rejected.
	pub attempt: u32,
	/// Method of the rejected request.
	pub method: Method,
	/// Path of the rejected request.
	pub path: String,
	/// Scope key the request was authorized for.
	pub scope: Option<ScopeKey>,
	/// Correlation headers from the response.
	pub correlation: CorrelationIds,
	/// Wall-clock instant the response was observed.
	pub observed_at: OffsetDateTime,
}
impl RateLimitInfo {
	/// Wall-clock instant after which a retry is expected to be admitted.
	pub fn earliest_retry_at(&self) -> OffsetDateTime {
		self.observed_at + self.retry_after
	}

	/// Returns `true` when the delay came from the server rather than computed backoff.
	pub fn is_server_directed(&self) -> bool {
		self.retry_after_header.is_some()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn earliest_retry_adds_delay_to_observation() {
		let info = RateLimitInfo {
			retry_after: Duration::seconds(2),
			retry_after_header: Some("2".into()),
			attempt: 1,
			method: Method::Post,
			path: "/records/query".into(),
			scope: None,
			correlation: CorrelationIds::default(),
			observed_at: macros::datetime!(2025-06-01 12:00:00 UTC),
		};

		assert_eq!(info.earliest_retry_at(), macros::datetime!(2025-06-01 12:00:02 UTC));
		assert!(info.is_server_directed());
	}
}
