//! Transport primitives for API calls and credential exchanges.
//!
//! The module exposes [`HttpTransport`], the client's only dependency on an HTTP stack,
//! together with the crate-owned request/response shapes it speaks. Implementations
//! receive a fully built [`TransportRequest`] and return the status, headers, and body of
//! whatever came back; classification, retries, and credential handling stay in the
//! executor so every transport behaves the same way.

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
use serde::de::DeserializeOwned;
// self
use crate::_prelude::*;

/// Name of the header carrying the rate-limit retry hint.
pub const RETRY_AFTER: &str = "retry-after";
/// Name of the header that addresses the tenant realm.
pub const REALM_HEADER: &str = "X-Realm-Hostname";
/// Correlation headers captured when the config does not name any.
pub const DEFAULT_CORRELATION_HEADERS: [&str; 2] = ["x-request-id", "cf-ray"];

/// Boxed future returned by [`HttpTransport::send`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<TransportResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP stacks capable of executing one request.
///
/// Implementations must be `Send + Sync` so a single transport can be shared between the
/// executor and every auth strategy of a client. Timeouts must surface as
/// [`TransportError::Timeout`] so the executor can retry them; any status code, including
/// 4xx/5xx, is a successful transport call.
pub trait HttpTransport
where
	Self: Send + Sync,
{
	/// Executes `request` and returns the raw response.
	fn send(&self, request: TransportRequest) -> TransportFuture<'_>;
}

/// HTTP methods used by the client.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
	#[default]
	/// `GET`
	Get,
	/// `POST`
	Post,
	/// `PUT`
	Put,
	/// `PATCH`
	Patch,
	/// `DELETE`
	Delete,
}
impl Method {
	/// Returns the canonical method token.
	pub const fn as_str(self) -> &'static str {
		match self {
			Method::Get => "GET",
			Method::Post => "POST",
			Method::Put => "PUT",
			Method::Patch => "PATCH",
			Method::Delete => "DELETE",
		}
	}
}
impl Display for Method {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Fully resolved request handed to a transport.
#[derive(Clone)]
pub struct TransportRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute URL including query string.
	pub url: Url,
	/// Request headers in insertion order.
	pub headers: Vec<(String, String)>,
	/// Serialized body, if any.
	pub body: Option<Vec<u8>>,
	/// Asks browser-like transports to send ambient session cookies.
	pub include_credentials: bool,
	/// Per-request deadline.
	pub timeout: Option<Duration>,
}
impl TransportRequest {
	/// Creates a request without headers or body.
	pub fn new(method: Method, url: Url) -> Self {
		Self { method, url, headers: Vec::new(), body: None, include_credentials: false, timeout: None }
	}

	/// Appends a header.
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));

		self
	}

	/// Serializes `body` as JSON and sets the content type.
	pub fn with_json(mut self, body: &serde_json::Value) -> Result<Self, ConfigError> {
		self.body = Some(serde_json::to_vec(body)?);

		Ok(self.with_header("Content-Type", "application/json"))
	}

	/// Marks the request as relying on ambient session cookies.
	pub fn with_credentials(mut self, include: bool) -> Self {
		self.include_credentials = include;

		self
	}

	/// Sets the per-request deadline.
	pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
		self.timeout = timeout;

		self
	}

	/// Looks up a header value case-insensitively.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers
			.iter()
			.find(|(key, _)| key.eq_ignore_ascii_case(name))
			.map(|(_, value)| value.as_str())
	}
}
impl Debug for TransportRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let headers = self
			.headers
			.iter()
			.map(|(name, value)| {
				let shown = if is_sensitive(name) { "<redacted>" } else { value.as_str() };

				(name.as_str(), shown)
			})
			.collect::<Vec<_>>();

		f.debug_struct("TransportRequest")
			.field("method", &self.method)
			.field("url", &self.url.as_str())
			.field("headers", &headers)
			.field("body_len", &self.body.as_ref().map(Vec::len))
			.field("include_credentials", &self.include_credentials)
			.field("timeout", &self.timeout)
			.finish()
	}
}

/// Response headers with case-insensitive lookup.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseHeaders(Vec<(String, String)>);
impl ResponseHeaders {
	/// Builds a header set from name/value pairs.
	pub fn from_pairs<I, K, V>(pairs: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		Self(pairs.into_iter().map(|(name, value)| (name.into(), value.into())).collect())
	}

	/// First value for `name`, compared case-insensitively.
	pub fn get(&self, name: &str) -> Option<&str> {
		self.0.iter().find(|(key, _)| key.eq_ignore_ascii_case(name)).map(|(_, value)| value.as_str())
	}

	/// Raw `Retry-After` value, trimmed.
	pub fn retry_after(&self) -> Option<&str> {
		self.get(RETRY_AFTER).map(str::trim).filter(|value| !value.is_empty())
	}

	/// Copies the named correlation headers that are present, preserving `names` order.
	pub fn correlation<S>(&self, names: &[S]) -> CorrelationIds
	where
		S: AsRef<str>,
	{
		CorrelationIds(
			names
				.iter()
				.filter_map(|name| {
					let name = name.as_ref();

					self.get(name).map(|value| (name.to_ascii_lowercase(), value.to_owned()))
				})
				.collect(),
		)
	}

	/// Iterator over all header pairs.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.0.iter().map(|(name, value)| (name.as_str(), value.as_str()))
	}
}

/// Response returned by a transport.
#[derive(Clone, Debug)]
pub struct TransportResponse {
	/// HTTP status code.
	pub status: u16,
	/// Response headers.
	pub headers: ResponseHeaders,
	/// Fully read response body.
	pub body: Vec<u8>,
}
impl TransportResponse {
	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Body as UTF-8 text, replacing invalid sequences.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}

	/// Deserializes the body, reporting the JSON path of the first failing field.
	pub fn json<T>(&self) -> Result<T, serde_path_to_error::Error<serde_json::Error>>
	where
		T: DeserializeOwned,
	{
		let de = &mut serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(de)
	}

	/// Summarizes a non-success response as an [`ApiFailure`].
	///
	/// The message comes from a JSON `message` or `description` field when present, otherwise
	/// from a bounded preview of the body; a JSON body is kept whole as the failure detail.
	pub fn failure<S>(&self, correlation_headers: &[S]) -> ApiFailure
	where
		S: AsRef<str>,
	{
		let detail = serde_json::from_slice::<serde_json::Value>(&self.body).ok();
		let message = detail
			.as_ref()
			.and_then(|body| {
				["message", "description", "error"]
					.iter()
					.find_map(|field| body.get(*field).and_then(serde_json::Value::as_str))
			})
			.map(str::to_owned)
			.or_else(|| {
				let text = self.text();

				(!text.trim().is_empty()).then(|| truncate_preview(text.trim()))
			})
			.unwrap_or_else(|| format!("Remote API returned HTTP {}", self.status));
		let mut failure = ApiFailure::new(message)
			.with_status(self.status)
			.with_correlation(self.headers.correlation(correlation_headers));

		failure.detail = detail;

		failure
	}
}

const BODY_PREVIEW_LIMIT: usize = 256;

fn truncate_preview(body: &str) -> String {
	if body.chars().count() <= BODY_PREVIEW_LIMIT {
		return body.to_owned();
	}

	let mut preview = body.chars().take(BODY_PREVIEW_LIMIT).collect::<String>();

	preview.push('…');

	preview
}

/// Correlation headers copied verbatim from a response, in configured priority order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationIds(Vec<(String, String)>);
impl CorrelationIds {
	/// Builds a set from name/value pairs.
	pub fn from_pairs<I, K, V>(pairs: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		Self(pairs.into_iter().map(|(name, value)| (name.into(), value.into())).collect())
	}

	/// Value of the highest-priority header that was present.
	pub fn primary(&self) -> Option<&str> {
		self.0.first().map(|(_, value)| value.as_str())
	}

	/// Value for a specific header name.
	pub fn get(&self, name: &str) -> Option<&str> {
		self.0.iter().find(|(key, _)| key.eq_ignore_ascii_case(name)).map(|(_, value)| value.as_str())
	}

	/// Returns `true` if no correlation header was present.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Redirects are not followed by the client core's semantics; configure any custom
/// [`ReqwestClient`] accordingly. Cookie sessions (for `include_credentials` requests)
/// come from whatever cookie store the wrapped client was built with.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
		let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
			.map_err(TransportError::network)?;
		let mut builder = self.0.request(method, request.url);

		for (name, value) in &request.headers {
			builder = builder.header(name.as_str(), value.as_str());
		}
		if let Some(body) = request.body {
			builder = builder.body(body);
		}
		if let Some(timeout) = request.timeout.filter(|timeout| timeout.is_positive()) {
			builder = builder.timeout(timeout.unsigned_abs());
		}

		let response = builder.send().await?;
		let status = response.status().as_u16();
		let headers = ResponseHeaders::from_pairs(response.headers().iter().filter_map(
			|(name, value)| value.to_str().ok().map(|value| (name.as_str().to_owned(), value.to_owned())),
		));
		let body = response.bytes().await?.to_vec();

		Ok(TransportResponse { status, headers, body })
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn send(&self, request: TransportRequest) -> TransportFuture<'_> {
		Box::pin(self.execute(request))
	}
}

fn is_sensitive(name: &str) -> bool {
	name.eq_ignore_ascii_case("authorization") || name.eq_ignore_ascii_case("cookie")
}
