//! Caller-facing description of one logical API call.

// self
use crate::{_prelude::*, http::Method};

/// Method, path, query, and body of one logical call, plus an optional scope override.
///
/// The executor never mutates a description; retries rebuild the transport request from it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RequestDescription {
	/// HTTP method.
	pub method: Method,
	/// Path relative to the base URL, e.g. `/tables/bq7xz3/fields`.
	pub path: String,
	/// Query parameters in insertion order.
	pub query: Vec<(String, String)>,
	/// JSON body.
	pub body: Option<serde_json::Value>,
	/// Scope key that takes precedence over anything inferred from the request.
	pub scope_override: Option<String>,
	/// Extra request headers.
	pub headers: Vec<(String, String)>,
}
impl RequestDescription {
	/// Creates a description without query, body, or headers.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self { method, path: path.into(), ..Default::default() }
	}

	/// Shorthand for a `GET` description.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::Get, path)
	}

	/// Shorthand for a `POST` description.
	pub fn post(path: impl Into<String>) -> Self {
		Self::new(Method::Post, path)
	}

	/// Shorthand for a `DELETE` description.
	pub fn delete(path: impl Into<String>) -> Self {
		Self::new(Method::Delete, path)
	}

	/// Appends a query parameter.
	pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.query.push((name.into(), value.into()));

		self
	}

	/// Sets a JSON body.
	pub fn with_body(mut self, body: serde_json::Value) -> Self {
		self.body = Some(body);

		self
	}

	/// Serializes `body` and sets it as the JSON body.
	pub fn with_json<T>(self, body: &T) -> Result<Self, ConfigError>
	where
		T: ?Sized + Serialize,
	{
		Ok(self.with_body(serde_json::to_value(body)?))
	}

	/// Forces the scope key used to pick a credential.
	pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
		self.scope_override = Some(scope.into());

		self
	}

	/// Appends a request header.
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));

		self
	}

	/// Absolute URL of this call under `base`.
	pub fn url(&self, base: &Url) -> Result<Url, ConfigError> {
		let joined =
			format!("{}/{}", base.as_str().trim_end_matches('/'), self.path.trim_start_matches('/'));
		let mut url =
			Url::parse(&joined).map_err(|source| ConfigError::InvalidUrl { url: joined, source })?;

		if !self.query.is_empty() {
			url.query_pairs_mut().extend_pairs(&self.query);
		}

		Ok(url)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn url_joins_base_path_and_query() {
		let base = Url::parse("https://api.realm.example/v1/").expect("Base fixture should parse.");
		let request = RequestDescription::get("/fields").with_query("tableId", "bq7xz3");

		assert_eq!(
			request.url(&base).expect("URL should build.").as_str(),
			"https://api.realm.example/v1/fields?tableId=bq7xz3"
		);

		let bare = Url::parse("https://api.realm.example/v1").expect("Base fixture should parse.");

		assert_eq!(
			RequestDescription::post("records/query")
				.url(&bare)
				.expect("URL should build.")
				.as_str(),
			"https://api.realm.example/v1/records/query"
		);
	}

	#[test]
	fn builders_accumulate() {
		#[derive(Serialize)]
		struct Query<'a> {
			from: &'a str,
		}

		let request = RequestDescription::post("/records/query")
			.with_json(&Query { from: "bq7xz3" })
			.expect("Body should serialize.")
			.with_scope("override")
			.with_header("X-Trace", "1");

		assert_eq!(request.method, Method::Post);
		assert_eq!(request.body, Some(serde_json::json!({ "from": "bq7xz3" })));
		assert_eq!(request.scope_override.as_deref(), Some("override"));
		assert_eq!(request.headers, vec![("X-Trace".to_owned(), "1".to_owned())]);
	}
}
