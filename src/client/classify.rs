//! Maps transport outcomes onto the client's error taxonomy.

// self
use crate::{
	_prelude::*,
	auth::ScopeKey,
	http::{Method, TransportResponse},
	resilience::{self, BackoffPolicy, RateLimitInfo},
};

/// Coarse class of an HTTP status code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusClass {
	/// 2xx.
	Success,
	/// 401.
	Authentication,
	/// 403.
	Authorization,
	/// 404.
	NotFound,
	/// 429.
	RateLimited,
	/// Any other 4xx.
	Validation,
	/// 5xx.
	Server,
	/// 1xx, 3xx, and anything out of range.
	Unclassified,
}
impl StatusClass {
	/// Classifies `status`.
	pub fn of(status: u16) -> Self {
		match status {
			200..=299 => Self::Success,
			401 => Self::Authentication,
			403 => Self::Authorization,
			404 => Self::NotFound,
			429 => Self::RateLimited,
			400..=499 => Self::Validation,
			500..=599 => Self::Server,
			_ => Self::Unclassified,
		}
	}

	/// Returns `true` when the executor may retry this class.
	pub fn is_retryable(self) -> bool {
		matches!(self, Self::RateLimited | Self::Server)
	}
}

/// Facts about the attempt being classified.
#[derive(Clone, Copy, Debug)]
pub(crate) struct AttemptContext<'a> {
	pub(crate) method: Method,
	pub(crate) path: &'a str,
	pub(crate) scope: Option<&'a ScopeKey>,
	pub(crate) attempt: u32,
	pub(crate) backoff: &'a BackoffPolicy,
	pub(crate) correlation_headers: &'a [String],
}

/// Passes 2xx responses through and turns everything else into a typed error.
pub(crate) fn classify_response(
	response: TransportResponse,
	ctx: &AttemptContext,
) -> Result<TransportResponse> {
	let class = StatusClass::of(response.status);

	if class == StatusClass::Success {
		return Ok(response);
	}

	let failure = response.failure(ctx.correlation_headers);
	let error = match class {
		StatusClass::Authentication => Error::Authentication(failure),
		StatusClass::Authorization => Error::Authorization(failure),
		StatusClass::NotFound => Error::NotFound(failure),
		StatusClass::Validation => Error::Validation(failure),
		StatusClass::Server => Error::Server(failure),
		StatusClass::RateLimited => {
			let header = response.headers.retry_after().map(str::to_owned);
			let retry_after =
				resilience::resolve_retry_delay(header.as_deref(), ctx.attempt, ctx.backoff);
			let info = RateLimitInfo {
				retry_after,
				retry_after_header: header,
				attempt: ctx.attempt,
				method: ctx.method,
				path: ctx.path.to_owned(),
				scope: ctx.scope.cloned(),
				correlation: failure.correlation.clone(),
				observed_at: OffsetDateTime::now_utc(),
			};

			Error::RateLimited { failure, info }
		},
		StatusClass::Success | StatusClass::Unclassified => Error::Unclassified(failure),
	};

	Err(error)
}

/// Timeouts become retryable [`Error::Timeout`]; other transport failures are final.
pub(crate) fn classify_transport(error: TransportError) -> Error {
	let failure = ApiFailure::new(error.describe());

	if error.is_timeout() { Error::Timeout(failure) } else { Error::Unclassified(failure) }
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::http::{DEFAULT_CORRELATION_HEADERS, ResponseHeaders};

	fn respond(status: u16, headers: &[(&str, &str)]) -> TransportResponse {
		TransportResponse {
			status,
			headers: ResponseHeaders::from_pairs(headers.iter().copied()),
			body: br#"{"message":"nope"}"#.to_vec(),
		}
	}

	fn classify(status: u16, headers: &[(&str, &str)]) -> Result<TransportResponse> {
		let backoff = BackoffPolicy::default();
		let correlation =
			DEFAULT_CORRELATION_HEADERS.iter().map(|name| (*name).to_owned()).collect::<Vec<_>>();
		let scope = ScopeKey::new("bq7xz3").expect("Scope fixture should be valid.");
		let ctx = AttemptContext {
			method: Method::Post,
			path: "/records/query",
			scope: Some(&scope),
			attempt: 1,
			backoff: &backoff,
			correlation_headers: &correlation,
		};

		classify_response(respond(status, headers), &ctx)
	}

	#[test]
	fn status_classes() {
		assert_eq!(StatusClass::of(204), StatusClass::Success);
		assert_eq!(StatusClass::of(400), StatusClass::Validation);
		assert_eq!(StatusClass::of(422), StatusClass::Validation);
		assert_eq!(StatusClass::of(409), StatusClass::Validation);
		assert_eq!(StatusClass::of(302), StatusClass::Unclassified);
		assert!(StatusClass::of(503).is_retryable());
		assert!(StatusClass::of(429).is_retryable());
		assert!(!StatusClass::of(401).is_retryable());
	}

	#[test]
	fn errors_carry_status_message_and_correlation() {
		let err = classify(403, &[("x-request-id", "req-1")]).expect_err("403 should fail.");

		assert!(matches!(err, Error::Authorization(_)));
		assert_eq!(err.status(), Some(403));
		assert_eq!(err.correlation_id(), Some("req-1"));
		assert_eq!(err.failure().map(|failure| failure.message.as_str()), Some("nope"));
		assert!(matches!(classify(404, &[]), Err(Error::NotFound(_))));
		assert!(matches!(classify(401, &[]), Err(Error::Authentication(_))));
		assert!(matches!(classify(502, &[]), Err(Error::Server(_))));
		assert!(classify(200, &[]).is_ok());
	}

	#[test]
	fn rate_limit_snapshot_uses_retry_after() {
		let err = classify(429, &[("Retry-After", "2"), ("cf-ray", "ray-1")])
			.expect_err("429 should fail.");
		let Error::RateLimited { info, .. } = &err else {
			panic!("Expected a rate-limit error, got {err:?}.");
		};

		assert_eq!(info.retry_after, Duration::seconds(2));
		assert_eq!(info.retry_after_header.as_deref(), Some("2"));
		assert_eq!(info.path, "/records/query");
		assert_eq!(info.scope.as_ref().map(ScopeKey::as_str), Some("bq7xz3"));
		assert_eq!(info.correlation.primary(), Some("ray-1"));
		assert!(err.is_retryable());
	}

	#[test]
	fn transport_timeouts_are_retryable() {
		let timeout = std::io::Error::new(std::io::ErrorKind::TimedOut, "deadline");

		assert!(matches!(classify_transport(TransportError::timeout(timeout)), Error::Timeout(_)));

		let reset = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");

		assert!(matches!(
			classify_transport(TransportError::network(reset)),
			Error::Unclassified(_)
		));
	}
}
