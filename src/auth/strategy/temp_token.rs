//! Per-scope temporary tokens exchanged on demand.
//!
//! Each scope key (a table or app id) gets its own short-lived token from
//! `GET {base}/auth/temporaryToken/{scope}`. The exchange is authorized by the bootstrap user
//! token when one is configured; otherwise it relies on the caller's session cookie.

// self
use crate::{
	_prelude::*,
	auth::{
		Credential, ScopeKey, TokenSecret,
		strategy::{ExchangeContext, IssuedCredential, ScopedCredentials, lifespan_from_secs},
	},
	http::Method,
	obs::CallKind,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TemporaryTokenResponse {
	temporary_authorization: TokenSecret,
	#[serde(default)]
	expires_in: Option<f64>,
}

/// Scoped temporary-token strategy.
#[derive(Debug)]
pub struct TempTokenAuth {
	ctx: ExchangeContext,
	bootstrap: Option<TokenSecret>,
	credentials: ScopedCredentials,
}
impl TempTokenAuth {
	/// Creates the strategy; `bootstrap` authorizes exchanges when present.
	pub fn new(
		ctx: ExchangeContext,
		bootstrap: Option<TokenSecret>,
		credentials: ScopedCredentials,
	) -> Self {
		Self { ctx, bootstrap, credentials }
	}

	/// Credential for `scope`; a scope key is mandatory for this strategy.
	pub async fn token(&self, scope: Option<&ScopeKey>) -> Result<Credential> {
		let scope = scope.ok_or(ConfigError::MissingScopeKey { strategy: "temp_token" })?;

		self.credentials
			.get_or_acquire(CallKind::TempTokenExchange, scope, || self.exchange(scope))
			.await
	}

	/// Invalidates `scope` unless `rejected` was already replaced, then fetches a credential.
	pub async fn recover(&self, scope: Option<&ScopeKey>, rejected: Option<&TokenSecret>) -> bool {
		let Some(scope) = scope else {
			return false;
		};

		if !self.credentials.is_superseded(scope, rejected) {
			self.credentials.invalidate(scope);
		}

		self.token(Some(scope)).await.is_ok()
	}

	/// Drops the credential for `scope`, or every cached credential when `None`.
	pub fn invalidate(&self, scope: Option<&ScopeKey>) {
		match scope {
			Some(scope) => {
				self.credentials.invalidate(scope);
			},
			None => self.credentials.clear(),
		}
	}

	/// Cache and singleflight state.
	pub fn credentials(&self) -> &ScopedCredentials {
		&self.credentials
	}

	async fn exchange(&self, scope: &ScopeKey) -> Result<IssuedCredential, ApiFailure> {
		let url = self.ctx.endpoint(&["auth", "temporaryToken", scope.as_str()])?;
		let request = self.ctx.request(Method::Get, url);
		let request = match &self.bootstrap {
			Some(token) => request.with_header("Authorization", format!("user-token {}", token.expose())),
			None => request.with_credentials(true),
		};
		let response = self
			.ctx
			.exchange::<TemporaryTokenResponse>(CallKind::TempTokenExchange, "temporary_token", request)
			.await?;

		Ok(IssuedCredential {
			token: response.temporary_authorization,
			lifespan: lifespan_from_secs(response.expires_in),
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		_preludet::{Scripted, ScriptedTransport, test_config},
		auth::{AuthStrategy, CredentialCache, MAX_LIFESPAN},
		http::HttpTransport,
	};

	fn strategy(transport: Arc<ScriptedTransport>, bootstrap: Option<&str>) -> AuthStrategy {
		let dyn_transport: Arc<dyn HttpTransport> = transport;
		let ctx = ExchangeContext::from_config(&test_config("https://api.realm.example/v1"), dyn_transport)
			.expect("Exchange context should build.");

		AuthStrategy::TempToken(TempTokenAuth::new(
			ctx,
			bootstrap.map(TokenSecret::new),
			ScopedCredentials::new(CredentialCache::new(Duration::minutes(5))),
		))
	}

	fn scope(value: &str) -> ScopeKey {
		ScopeKey::new(value).expect("Scope fixture should be valid.")
	}

	#[tokio::test]
	async fn concurrent_misses_collapse_into_one_exchange() {
		let transport = Arc::new(ScriptedTransport::default());

		transport.push_exchange(Scripted::json(200, r#"{"temporaryAuthorization":"T1"}"#));

		let auth = strategy(transport.clone(), Some("bootstrap"));
		let key = scope("bq7xz3");
		let (a, b, c, d) = tokio::join!(
			auth.token(Some(&key)),
			auth.token(Some(&key)),
			auth.token(Some(&key)),
			auth.token(Some(&key)),
		);

		assert_eq!(transport.exchange_calls(), 1);

		for credential in [a, b, c, d] {
			assert_eq!(credential.expect("Token should be issued.").token.expose(), "T1");
		}

		let request = &transport.requests()[0];

		assert_eq!(request.url.path(), "/v1/auth/temporaryToken/bq7xz3");
		assert_eq!(request.header("authorization"), Some("user-token bootstrap"));
		assert!(!request.include_credentials);
	}

	#[tokio::test]
	async fn missing_bootstrap_falls_back_to_session_cookie() {
		let transport = Arc::new(ScriptedTransport::default());

		transport.push_exchange(Scripted::json(200, r#"{"temporaryAuthorization":"T1"}"#));

		let auth = strategy(transport.clone(), None);

		auth.token(Some(&scope("bq7xz3"))).await.expect("Token should be issued.");

		let request = &transport.requests()[0];

		assert_eq!(request.header("authorization"), None);
		assert!(request.include_credentials);
	}

	#[tokio::test]
	async fn missing_scope_is_a_config_error() {
		let auth = strategy(Arc::new(ScriptedTransport::default()), Some("bootstrap"));
		let err = auth.token(None).await.expect_err("Scope is mandatory.");

		assert!(matches!(err, Error::Config(ConfigError::MissingScopeKey { strategy: "temp_token" })));
	}

	#[tokio::test]
	async fn exchange_failures_surface_as_authentication_errors() {
		let transport = Arc::new(ScriptedTransport::default());

		transport.push_exchange(
			Scripted::json(401, r#"{"message":"Invalid user token"}"#).header("x-request-id", "req-9"),
		);

		let auth = strategy(transport.clone(), Some("stale"));
		let key = scope("bq7xz3");
		let (a, b) = tokio::join!(auth.token(Some(&key)), auth.token(Some(&key)));

		assert_eq!(transport.exchange_calls(), 1, "Waiters share the failed exchange.");

		for err in [a, b].map(|result| result.expect_err("Exchange should fail.")) {
			let failure = match err {
				Error::Authentication(failure) => failure,
				other => panic!("Expected an authentication error, got {other:?}."),
			};

			assert_eq!(failure.status, Some(401));
			assert_eq!(failure.message, "Invalid user token");
			assert_eq!(failure.correlation.primary(), Some("req-9"));
		}
	}

	#[tokio::test]
	async fn malformed_exchange_body_reports_field_path() {
		let transport = Arc::new(ScriptedTransport::default());

		transport.push_exchange(Scripted::json(200, r#"{"temporaryAuthorization":42}"#));

		let auth = strategy(transport, Some("bootstrap"));
		let err = auth.token(Some(&scope("bq7xz3"))).await.expect_err("Body should be rejected.");
		let failure = err.failure().expect("Authentication errors carry a failure.");

		assert!(failure.message.contains("temporaryAuthorization"), "{}", failure.message);
	}

	#[tokio::test]
	async fn recovery_refetches_exactly_once() {
		let transport = Arc::new(ScriptedTransport::default());

		transport
			.push_exchange(Scripted::json(200, r#"{"temporaryAuthorization":"T1"}"#))
			.push_exchange(Scripted::json(200, r#"{"temporaryAuthorization":"T2"}"#));

		let auth = strategy(transport.clone(), Some("bootstrap"));
		let key = scope("bq7xz3");

		auth.token(Some(&key)).await.expect("First token should be issued.");

		assert!(auth.handle_auth_failure(Some(&key)).await);
		assert_eq!(transport.exchange_calls(), 2);
		assert_eq!(
			auth.token(Some(&key)).await.expect("Refreshed token should be cached.").token.expose(),
			"T2"
		);
		assert_eq!(transport.exchange_calls(), 2);
		assert!(!auth.handle_auth_failure(None).await, "Recovery needs a scope.");
	}

	#[tokio::test]
	async fn rejection_of_a_replaced_token_keeps_the_replacement() {
		let transport = Arc::new(ScriptedTransport::default());

		transport
			.push_exchange(Scripted::json(200, r#"{"temporaryAuthorization":"T1"}"#))
			.push_exchange(Scripted::json(200, r#"{"temporaryAuthorization":"T2"}"#));

		let auth = strategy(transport.clone(), Some("bootstrap"));
		let key = scope("bq7xz3");
		let rejected = auth.token(Some(&key)).await.expect("First token should be issued.");

		assert!(auth.handle_rejected(Some(&key), &rejected).await);
		assert_eq!(transport.exchange_calls(), 2);
		assert!(auth.handle_rejected(Some(&key), &rejected).await);
		assert_eq!(transport.exchange_calls(), 2, "T2 already replaced T1.");
		assert_eq!(
			auth.token(Some(&key)).await.expect("Replacement should stay cached.").token.expose(),
			"T2"
		);
	}

	#[tokio::test]
	async fn oversized_expiry_is_capped() {
		let transport = Arc::new(ScriptedTransport::default());

		transport.push_exchange(Scripted::json(
			200,
			r#"{"temporaryAuthorization":"T1","expiresIn":1e30}"#,
		));

		let auth = strategy(transport.clone(), Some("bootstrap"));
		let key = scope("bq7xz3");
		let credential = auth.token(Some(&key)).await.expect("Oversized expiry should still issue.");

		assert_eq!(credential.token.expose(), "T1");

		let AuthStrategy::TempToken(temp) = &auth else {
			panic!("Fixture builds a temp-token strategy.");
		};
		let remaining = temp.credentials().time_to_expiry(&key).expect("Credential should be cached.");

		assert!(remaining <= MAX_LIFESPAN, "Remaining lifetime {remaining} exceeds the cap.");
		assert!(remaining > Duration::days(365), "Remaining lifetime {remaining} was not kept.");
	}

	#[tokio::test]
	async fn reported_lifespan_overrides_default() {
		let transport = Arc::new(ScriptedTransport::default());

		transport.push_exchange(Scripted::json(
			200,
			r#"{"temporaryAuthorization":"T1","expiresIn":120}"#,
		));

		let auth = strategy(transport, Some("bootstrap"));
		let key = scope("bq7xz3");

		auth.token(Some(&key)).await.expect("Token should be issued.");

		let AuthStrategy::TempToken(inner) = &auth else {
			unreachable!();
		};
		let remaining = inner.credentials().time_to_expiry(&key).expect("Entry should be cached.");

		assert!(remaining <= Duration::seconds(120) && remaining > Duration::seconds(100));

		auth.invalidate(None);

		assert!(!inner.credentials().has(&key));
	}
}
