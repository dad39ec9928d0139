//! Scope-key extraction.
//!
//! A temporary credential is valid for one resource, so the executor needs to know which
//! resource a request touches before it can pick a credential. Sources are consulted in
//! order and the first valid candidate wins:
//!
//! 1. the explicit override on the [`RequestDescription`];
//! 2. query parameters ([`QUERY_KEYS`]);
//! 3. the path segment after a resource marker ([`PATH_MARKERS`]);
//! 4. string fields of a JSON object body ([`BODY_FIELDS`]).
//!
//! Within each source the table-level identifier outranks the app-level one, since a
//! table-scoped credential is accepted for that table while an app-scoped one may not be.

// self
use crate::{auth::ScopeKey, request::RequestDescription};

/// Query parameters that name a scope, most specific first.
pub const QUERY_KEYS: [&str; 3] = ["tableId", "dbid", "appId"];
/// Path markers whose following segment names a scope, most specific first.
pub const PATH_MARKERS: [&str; 2] = ["tables", "apps"];
/// Body fields that name a scope, in preference order.
pub const BODY_FIELDS: [&str; 4] = ["to", "from", "tableId", "appId"];

/// Derives the scope key for `request`, or `None` if nothing names one.
pub fn extract_scope_key(request: &RequestDescription) -> Option<ScopeKey> {
	request
		.scope_override
		.as_deref()
		.and_then(candidate)
		.or_else(|| from_query(&request.query))
		.or_else(|| from_path(&request.path))
		.or_else(|| from_body(request.body.as_ref()))
}

fn from_query(query: &[(String, String)]) -> Option<ScopeKey> {
	QUERY_KEYS.iter().find_map(|key| {
		query.iter().filter(|(name, _)| name == key).find_map(|(_, value)| candidate(value))
	})
}

fn from_path(path: &str) -> Option<ScopeKey> {
	let path = path.split(['?', '#']).next().unwrap_or_default();
	let segments = path.split('/').filter(|segment| !segment.is_empty()).collect::<Vec<_>>();

	PATH_MARKERS.iter().find_map(|marker| {
		segments
			.windows(2)
			.filter(|pair| pair[0] == *marker && !is_placeholder(pair[1]))
			.find_map(|pair| candidate(pair[1]))
	})
}

fn from_body(body: Option<&serde_json::Value>) -> Option<ScopeKey> {
	let body = body?.as_object()?;

	BODY_FIELDS
		.iter()
		.find_map(|field| body.get(*field).and_then(serde_json::Value::as_str).and_then(candidate))
}

fn is_placeholder(segment: &str) -> bool {
	segment.starts_with('{') && segment.ends_with('}')
}

fn candidate(value: &str) -> Option<ScopeKey> {
	ScopeKey::new(value).ok()
}
