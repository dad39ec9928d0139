//! Client-level error types shared across strategies, the executor, and transports.

// self
use crate::{_prelude::*, http::CorrelationIds, resilience::RateLimitInfo};

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical client error exposed by public APIs.
///
/// Variants mirror how the executor classifies a failure; only [`Error::RateLimited`],
/// [`Error::Server`], and [`Error::Timeout`] are retried.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),

	/// Credential rejected, not refreshable, or acquisition failed.
	#[error("Authentication failed: {0}.")]
	Authentication(ApiFailure),
	/// Credential valid but lacks rights for the resource.
	#[error("Authorization denied: {0}.")]
	Authorization(ApiFailure),
	/// Request was rejected as malformed.
	#[error("Request validation failed: {0}.")]
	Validation(ApiFailure),
	/// Target resource does not exist.
	#[error("Resource not found: {0}.")]
	NotFound(ApiFailure),
	/// Remote API asked the caller to slow down.
	#[error("Rate limited, retry in {}ms: {failure}.", .info.retry_after.whole_milliseconds())]
	RateLimited {
		/// Failure details for the rejected call.
		failure: ApiFailure,
		/// Structured rate-limit snapshot, including the resolved retry delay.
		info: RateLimitInfo,
	},
	/// Remote API reported a 5xx failure.
	#[error("Server error: {0}.")]
	Server(ApiFailure),
	/// Transport call exceeded its deadline.
	#[error("Request timed out: {0}.")]
	Timeout(ApiFailure),
	/// Any other transport failure or unexpected status.
	#[error("Request failed: {0}.")]
	Unclassified(ApiFailure),
	/// Successful response body could not be decoded into the requested type.
	#[error("Response body could not be decoded at `{path}`.")]
	Decode {
		/// JSON path of the failing field.
		path: String,
		/// Underlying JSON error.
		#[source]
		source: serde_json::Error,
		/// Correlation headers from the response.
		correlation: CorrelationIds,
	},
}
impl Error {
	/// Returns `true` when the executor may retry the failure.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::RateLimited { .. } | Self::Server(_) | Self::Timeout(_))
	}

	/// Returns the failure payload for API-level variants.
	pub fn failure(&self) -> Option<&ApiFailure> {
		match self {
			Self::Authentication(failure)
			| Self::Authorization(failure)
			| Self::Validation(failure)
			| Self::NotFound(failure)
			| Self::Server(failure)
			| Self::Timeout(failure)
			| Self::Unclassified(failure)
			| Self::RateLimited { failure, .. } => Some(failure),
			Self::Config(_) | Self::Decode { .. } => None,
		}
	}

	/// HTTP status attached to the failure, if one was observed.
	pub fn status(&self) -> Option<u16> {
		self.failure().and_then(|failure| failure.status)
	}

	/// First correlation identifier attached to the failure, if any.
	pub fn correlation_id(&self) -> Option<&str> {
		match self {
			Self::Decode { correlation, .. } => correlation.primary(),
			other => other.failure().and_then(|failure| failure.correlation.primary()),
		}
	}
}

/// Details carried by every API-level [`Error`] variant.
///
/// The struct is `Clone` so a single acquisition failure can be handed to every caller that
/// was waiting on the same in-flight credential exchange.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ApiFailure {
	/// HTTP status code, when a response was received.
	pub status: Option<u16>,
	/// Human-readable summary.
	pub message: String,
	/// Structured detail extracted from the response body.
	pub detail: Option<serde_json::Value>,
	/// Correlation headers copied verbatim from the response.
	pub correlation: CorrelationIds,
}
impl ApiFailure {
	/// Creates a failure with only a message.
	pub fn new(message: impl Into<String>) -> Self {
		Self { message: message.into(), ..Default::default() }
	}

	/// Attaches an HTTP status.
	pub fn with_status(mut self, status: u16) -> Self {
		self.status = Some(status);

		self
	}

	/// Attaches structured detail.
	pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
		self.detail = Some(detail);

		self
	}

	/// Attaches correlation identifiers.
	pub fn with_correlation(mut self, correlation: CorrelationIds) -> Self {
		self.correlation = correlation;

		self
	}
}
impl Display for ApiFailure {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self.status {
			Some(status) => write!(f, "{} (HTTP {status})", self.message)?,
			None => f.write_str(&self.message)?,
		}
		if let Some(id) = self.correlation.primary() {
			write!(f, " [{id}]")?;
		}

		Ok(())
	}
}

/// Configuration and validation failures raised before any request is sent.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Base URL or request URL could not be parsed.
	#[error("URL `{url}` is invalid.")]
	InvalidUrl {
		/// Offending URL text.
		url: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Base URL uses a scheme other than http/https.
	#[error("Base URL must use http or https: {url}.")]
	UnsupportedScheme {
		/// Offending URL text.
		url: String,
	},
	/// Identifier validation failed.
	#[error(transparent)]
	InvalidIdentifier(#[from] crate::auth::IdentifierError),
	/// Retry policy values are inconsistent.
	#[error("Retry policy is invalid: {reason}.")]
	InvalidRetryPolicy {
		/// Which constraint failed.
		reason: &'static str,
	},
	/// Throttle policy values are inconsistent.
	#[error("Throttle policy is invalid: {reason}.")]
	InvalidThrottlePolicy {
		/// Which constraint failed.
		reason: &'static str,
	},
	/// Credential lifespan must be positive.
	#[error("Credential lifespan must be positive.")]
	NonPositiveLifespan,
	/// A required secret was empty.
	#[error("The {field} secret cannot be empty.")]
	EmptySecret {
		/// Config field name.
		field: &'static str,
	},
	/// Scoped credentials need a scope key and none could be extracted.
	#[error("The {strategy} strategy requires a scope key, but the request does not name one.")]
	MissingScopeKey {
		/// Strategy label.
		strategy: &'static str,
	},
	/// No transport was supplied and the default one is compiled out.
	#[error("No HTTP transport configured; enable the `reqwest` feature or supply one.")]
	MissingTransport,
	/// The ticket strategy was configured without an issuer.
	#[error("Ticket authentication requires a ticket issuer.")]
	MissingTicketIssuer,
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	BodySerialize(#[from] serde_json::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO, deadlines).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Transport gave up waiting for the remote API.
	#[error("Request timed out while calling the remote API.")]
	Timeout {
		/// Transport-specific timeout error.
		#[source]
		source: BoxError,
	},
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the remote API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the remote API.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}

	/// Wraps a transport-specific timeout error.
	pub fn timeout(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Timeout { source: Box::new(src) }
	}

	/// Returns `true` for deadline failures.
	pub fn is_timeout(&self) -> bool {
		matches!(self, Self::Timeout { .. })
	}

	/// Flattens the error and its sources into a single message.
	pub fn describe(&self) -> String {
		let mut message = self.to_string().trim_end_matches('.').to_owned();
		let mut source = StdError::source(self);

		while let Some(inner) = source {
			message.push_str(": ");
			message.push_str(&inner.to_string());

			source = inner.source();
		}

		message
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::timeout(e) } else { Self::network(e) }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn retryable_classification_matches_taxonomy() {
		let failure = ApiFailure::new("boom").with_status(503);

		assert!(Error::Server(failure.clone()).is_retryable());
		assert!(Error::Timeout(failure.clone()).is_retryable());
		assert!(!Error::Authentication(failure.clone()).is_retryable());
		assert!(!Error::Authorization(failure.clone()).is_retryable());
		assert!(!Error::Validation(failure.clone()).is_retryable());
		assert!(!Error::NotFound(failure.clone()).is_retryable());
		assert!(!Error::Unclassified(failure).is_retryable());
		assert!(!Error::from(ConfigError::NonPositiveLifespan).is_retryable());
	}

	#[test]
	fn failure_display_includes_status_and_correlation() {
		let correlation = CorrelationIds::from_pairs([("x-request-id", "req-7")]);
		let failure =
			ApiFailure::new("Table is locked").with_status(423).with_correlation(correlation);
		let err = Error::Validation(failure);

		assert_eq!(err.to_string(), "Request validation failed: Table is locked (HTTP 423) [req-7].");
		assert_eq!(err.status(), Some(423));
		assert_eq!(err.correlation_id(), Some("req-7"));
	}

	#[test]
	fn transport_error_describe_walks_sources() {
		let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "peer reset");
		let err = TransportError::network(io);

		assert_eq!(err.describe(), "Network error occurred while calling the remote API: peer reset");
		assert!(!err.is_timeout());
	}
}
