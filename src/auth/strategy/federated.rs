//! Federated (SAML) assertion exchange.

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

/// Grant type of the token-exchange request.
pub const TOKEN_EXCHANGE_GRANT: &str = "urn:ietf:params:oauth:grant-type:token-exchange";
/// Subject token type announced for the SAML assertion.
pub const SAML2_TOKEN_TYPE: &str = "urn:ietf:params:oauth:token-type:saml2";

const GLOBAL_SCOPE: &str = "federated";

#[derive(Debug, Deserialize)]
struct TokenExchangeResponse {
	access_token: TokenSecret,
	#[serde(default)]
	expires_in: Option<f64>,
}

/// Exchanges one federated assertion for a single realm-wide temporary token.
#[derive(Debug)]
pub struct FederatedAuth {
	ctx: ExchangeContext,
	assertion: TokenSecret,
	requested_token_type: String,
	scope: ScopeKey,
	credentials: ScopedCredentials,
}
impl FederatedAuth {
	/// Creates the strategy for `assertion`.
	pub fn new(
		ctx: ExchangeContext,
		assertion: TokenSecret,
		requested_token_type: String,
		credentials: ScopedCredentials,
	) -> Result<Self, ConfigError> {
		Ok(Self { ctx, assertion, requested_token_type, scope: ScopeKey::new(GLOBAL_SCOPE)?, credentials })
	}

	/// The realm-wide credential; request scope is irrelevant.
	pub async fn token(&self) -> Result<Credential> {
		self.credentials
			.get_or_acquire(CallKind::FederatedExchange, &self.scope, || self.exchange())
			.await
	}

	/// Invalidates the credential unless `rejected` was already replaced, then fetches one.
	pub async fn recover(&self, rejected: Option<&TokenSecret>) -> bool {
		if !self.credentials.is_superseded(&self.scope, rejected) {
			self.invalidate();
		}

		self.token().await.is_ok()
	}

	/// Drops the cached credential.
	pub fn invalidate(&self) {
		self.credentials.invalidate(&self.scope);
	}

	async fn exchange(&self) -> Result<IssuedCredential, ApiFailure> {
		let url = self.ctx.endpoint(&["auth", "oauth", "token"])?;
		let body = serde_json::json!({
			"grant_type": TOKEN_EXCHANGE_GRANT,
			"subject_token": self.assertion.expose(),
			"subject_token_type": SAML2_TOKEN_TYPE,
			"requested_token_type": self.requested_token_type,
		});
		let request = self
			.ctx
			.request(Method::Post, url)
			.with_json(&body)
			.map_err(|e| ApiFailure::new(format!("Token exchange body could not be encoded: {e}")))?;
		let response = self
			.ctx
			.exchange::<TokenExchangeResponse>(CallKind::FederatedExchange, "token_exchange", request)
			.await?;

		Ok(IssuedCredential {
			token: response.access_token,
			lifespan: lifespan_from_secs(response.expires_in),
		})
	}
}
