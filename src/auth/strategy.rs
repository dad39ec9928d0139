//! Authentication strategies and the credential plumbing they share.
//!
//! [`AuthStrategy`] is a closed set of variants built once from validated
//! [`AuthConfig`]. The executor only talks to the enum's methods and never inspects which
//! variant it holds.

pub mod federated;
pub mod temp_token;
pub mod ticket;
pub mod user_token;

pub use federated::*;
pub use temp_token::*;
pub use ticket::*;
pub use user_token::*;

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::{
		Credential, CredentialCache, MAX_LIFESPAN, PendingAcquisitions, Realm, ScopeKey, TokenSecret,
	},
	config::{AuthConfig, ClientConfig},
	http::{HttpTransport, Method, REALM_HEADER, TransportRequest, TransportResponse},
	obs::{self, CallKind, CallOutcome, CallSpan},
};

/// Label identifying a strategy in logs, metrics, and error messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AuthKind {
	/// [`UserTokenAuth`].
	UserToken,
	/// [`TempTokenAuth`].
	TempToken,
	/// [`FederatedAuth`].
	Federated,
	/// [`TicketAuth`].
	Ticket,
}
impl AuthKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			AuthKind::UserToken => "user_token",
			AuthKind::TempToken => "temp_token",
			AuthKind::Federated => "federated",
			AuthKind::Ticket => "ticket",
		}
	}

	/// Scheme prefix of the `Authorization` header value.
	pub const fn header_scheme(self) -> &'static str {
		match self {
			AuthKind::UserToken => "user-token",
			AuthKind::TempToken | AuthKind::Federated => "temp-token",
			AuthKind::Ticket => "ticket",
		}
	}
}
impl Display for AuthKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Strategy that decides which credential authorizes a request.
#[derive(Debug)]
pub enum AuthStrategy {
	/// Static user token.
	UserToken(UserTokenAuth),
	/// Per-scope temporary tokens.
	TempToken(TempTokenAuth),
	/// Federated assertion exchange.
	Federated(FederatedAuth),
	/// Legacy session ticket.
	Ticket(TicketAuth),
}
impl AuthStrategy {
	/// Builds the strategy named by `config.auth`.
	///
	/// `issuer` is required by, and only used by, the ticket strategy.
	pub fn from_config(
		config: &ClientConfig,
		ctx: ExchangeContext,
		issuer: Option<Arc<dyn TicketIssuer>>,
	) -> Result<Self, ConfigError> {
		let credentials = || {
			ScopedCredentials::new(
				CredentialCache::new(config.credential_lifespan())
					.with_expiry_buffer(config.expiry_buffer()),
			)
		};
		let strategy = match &config.auth {
			AuthConfig::UserToken { token } => Self::UserToken(UserTokenAuth::new(token.clone())),
			AuthConfig::TempToken { user_token } =>
				Self::TempToken(TempTokenAuth::new(ctx, user_token.clone(), credentials())),
			AuthConfig::Federated { assertion, requested_token_type } =>
				Self::Federated(FederatedAuth::new(
					ctx,
					assertion.clone(),
					requested_token_type.clone(),
					credentials(),
				)?),
			AuthConfig::Ticket { username, password } => {
				let issuer = issuer.ok_or(ConfigError::MissingTicketIssuer)?;

				Self::Ticket(TicketAuth::new(
					issuer,
					ctx.realm,
					username.clone(),
					password.clone(),
					credentials(),
				)?)
			},
		};

		Ok(strategy)
	}

	/// Label of the active variant.
	pub fn kind(&self) -> AuthKind {
		match self {
			Self::UserToken(_) => AuthKind::UserToken,
			Self::TempToken(_) => AuthKind::TempToken,
			Self::Federated(_) => AuthKind::Federated,
			Self::Ticket(_) => AuthKind::Ticket,
		}
	}

	/// Returns a usable credential for `scope`, acquiring one if the cache has none.
	///
	/// Concurrent callers that miss for the same scope share a single acquisition.
	pub async fn token(&self, scope: Option<&ScopeKey>) -> Result<Credential> {
		match self {
			Self::UserToken(auth) => Ok(auth.credential()),
			Self::TempToken(auth) => auth.token(scope).await,
			Self::Federated(auth) => auth.token().await,
			Self::Ticket(auth) => auth.token().await,
		}
	}

	/// Value for the `Authorization` header carrying `credential`.
	pub fn authorization_header_value(&self, credential: &Credential) -> String {
		format!("{} {}", self.kind().header_scheme(), credential.token.expose())
	}

	/// Runs one recovery cycle after the remote API rejected a credential.
	///
	/// Returns `true` when a fresh credential was obtained and a retry is worthwhile.
	pub async fn handle_auth_failure(&self, scope: Option<&ScopeKey>) -> bool {
		self.recover(scope, None).await
	}

	/// Recovery cycle for a call whose `rejected` credential was refused.
	///
	/// A concurrent call may already have replaced that credential; the replacement is kept
	/// instead of being invalidated and exchanged again.
	pub async fn handle_rejected(&self, scope: Option<&ScopeKey>, rejected: &Credential) -> bool {
		self.recover(scope, Some(&rejected.token)).await
	}

	async fn recover(&self, scope: Option<&ScopeKey>, rejected: Option<&TokenSecret>) -> bool {
		let recovered = match self {
			Self::UserToken(_) => false,
			Self::TempToken(auth) => auth.recover(scope, rejected).await,
			Self::Federated(auth) => auth.recover(rejected).await,
			Self::Ticket(auth) => auth.recover(rejected).await,
		};

		obs::trace_recovery(scope.map(ScopeKey::as_str), recovered);

		recovered
	}

	/// Drops cached credentials for `scope`, or for every scope when `None`.
	pub fn invalidate(&self, scope: Option<&ScopeKey>) {
		match self {
			Self::UserToken(_) => {},
			Self::TempToken(auth) => auth.invalidate(scope),
			Self::Federated(auth) => auth.invalidate(),
			Self::Ticket(auth) => auth.invalidate(),
		}
	}

	/// `Cookie` header value that must accompany every request, if any.
	pub fn session_cookie(&self) -> Option<String> {
		match self {
			Self::Ticket(auth) => auth.session_cookie(),
			_ => None,
		}
	}
}

/// Everything a strategy needs to call the realm's exchange endpoints.
#[derive(Clone)]
pub struct ExchangeContext {
	/// Shared transport.
	pub transport: Arc<dyn HttpTransport>,
	/// API base URL.
	pub base_url: Url,
	/// Tenant realm sent as [`REALM_HEADER`].
	pub realm: Realm,
	/// Correlation header names copied into failures.
	pub correlation_headers: Vec<String>,
	/// Per-request deadline.
	pub request_timeout: Option<Duration>,
	/// `User-Agent` header value.
	pub user_agent: String,
}
impl ExchangeContext {
	/// Derives the context from `config`, sharing `transport`.
	pub fn from_config(
		config: &ClientConfig,
		transport: Arc<dyn HttpTransport>,
	) -> Result<Self, ConfigError> {
		Ok(Self {
			transport,
			base_url: config.effective_base_url()?,
			realm: config.realm.clone(),
			correlation_headers: config.correlation_headers.clone(),
			request_timeout: config.request_timeout(),
			user_agent: config.user_agent.clone(),
		})
	}

	/// Base URL extended with `segments`, each percent-encoded as one path segment.
	pub fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiFailure> {
		let mut url = self.base_url.clone();

		url.path_segments_mut()
			.map_err(|()| ApiFailure::new(format!("Base URL `{}` cannot carry a path.", self.base_url)))?
			.pop_if_empty()
			.extend(segments);

		Ok(url)
	}

	/// Request pre-populated with the realm, user agent, and deadline.
	pub fn request(&self, method: Method, url: Url) -> TransportRequest {
		TransportRequest::new(method, url)
			.with_header(REALM_HEADER, self.realm.as_str())
			.with_header("User-Agent", self.user_agent.as_str())
			.with_timeout(self.request_timeout)
	}

	/// Sends an exchange request and decodes a successful JSON reply.
	///
	/// Transport errors, non-2xx statuses, and malformed bodies all surface as [`ApiFailure`]
	/// so callers deduplicated onto this exchange can share the outcome.
	pub async fn exchange<T>(
		&self,
		kind: CallKind,
		stage: &'static str,
		request: TransportRequest,
	) -> Result<T, ApiFailure>
	where
		T: DeserializeOwned,
	{
		let span = CallSpan::new(kind, stage);

		obs::record_call_outcome(kind, CallOutcome::Attempt);

		let result = span
			.instrument(async {
				let response = self.transport.send(request).await.map_err(|e| {
					ApiFailure::new(format!("Credential exchange failed: {}", e.describe()))
				})?;

				self.decode(&response)
			})
			.await;

		match &result {
			Ok(_) => obs::record_call_outcome(kind, CallOutcome::Success),
			Err(_) => obs::record_call_outcome(kind, CallOutcome::Failure),
		}

		result
	}

	fn decode<T>(&self, response: &TransportResponse) -> Result<T, ApiFailure>
	where
		T: DeserializeOwned,
	{
		if !response.is_success() {
			return Err(response.failure(&self.correlation_headers));
		}

		response.json().map_err(|e| {
			ApiFailure::new(format!(
				"Credential exchange response is malformed at `{}`: {}",
				e.path(),
				e.inner()
			))
			.with_status(response.status)
			.with_correlation(response.headers.correlation(&self.correlation_headers))
		})
	}
}
impl Debug for ExchangeContext {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ExchangeContext")
			.field("base_url", &self.base_url.as_str())
			.field("realm", &self.realm)
			.field("correlation_headers", &self.correlation_headers)
			.field("request_timeout", &self.request_timeout)
			.finish_non_exhaustive()
	}
}

/// Credential returned by an exchange before it is cached.
#[derive(Clone, Debug)]
pub struct IssuedCredential {
	/// Token value.
	pub token: TokenSecret,
	/// Lifespan reported by the issuer; the cache default applies when absent.
	pub lifespan: Option<Duration>,
}

/// Cache plus singleflight map owned by one strategy instance.
#[derive(Debug)]
pub struct ScopedCredentials {
	cache: Mutex<CredentialCache>,
	pending: PendingAcquisitions,
}
impl ScopedCredentials {
	/// Wraps `cache` with an empty pending-acquisition map.
	pub fn new(cache: CredentialCache) -> Self {
		Self { cache: Mutex::new(cache), pending: PendingAcquisitions::default() }
	}

	/// Returns the cached credential for `scope` or runs `fetch` once for every concurrent miss.
	pub async fn get_or_acquire<F, Fut>(
		&self,
		kind: CallKind,
		scope: &ScopeKey,
		fetch: F,
	) -> Result<Credential>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<IssuedCredential, ApiFailure>>,
	{
		let cached = self.cache.lock().get(scope);

		if let Some(credential) = cached {
			return Ok(credential);
		}

		self.pending
			.acquire(scope, || async move {
				// A caller that missed just before the previous acquisition settled lands here.
				let cached = self.cache.lock().get(scope);

				if let Some(credential) = cached {
					return Ok(credential);
				}

				let issued = fetch().await?;
				let credential = self.cache.lock().set(scope.clone(), issued.token, issued.lifespan);

				obs::trace_credential_issued(kind, scope.as_str(), &credential.token.fingerprint());

				Ok(credential)
			})
			.await
			.map_err(Error::Authentication)
	}

	/// Drops the cached credential for `scope`.
	pub fn invalidate(&self, scope: &ScopeKey) -> bool {
		self.cache.lock().delete(scope)
	}

	/// Returns `true` if the credential cached for `scope` is usable and differs from `rejected`.
	pub fn is_superseded(&self, scope: &ScopeKey, rejected: Option<&TokenSecret>) -> bool {
		let Some(rejected) = rejected else {
			return false;
		};

		self.cache.lock().get(scope).is_some_and(|credential| &credential.token != rejected)
	}

	/// Drops every cached credential.
	pub fn clear(&self) {
		self.cache.lock().clear();
	}

	/// Returns `true` if a usable credential is cached for `scope`.
	pub fn has(&self, scope: &ScopeKey) -> bool {
		self.cache.lock().has(scope)
	}

	/// Remaining lifetime of the cached credential for `scope`.
	pub fn time_to_expiry(&self, scope: &ScopeKey) -> Option<Duration> {
		self.cache.lock().time_to_expiry(scope)
	}

	/// Number of scopes with an acquisition in flight.
	pub fn in_flight(&self) -> usize {
		self.pending.in_flight()
	}
}

/// Converts a lifespan in (possibly fractional) seconds reported by an exchange.
pub(crate) fn lifespan_from_secs(secs: Option<f64>) -> Option<Duration> {
	secs.filter(|secs| secs.is_finite() && *secs > 0.0).map(|secs| {
		Duration::checked_seconds_f64(secs).map_or(MAX_LIFESPAN, |lifespan| lifespan.min(MAX_LIFESPAN))
	})
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		_preludet::{ScriptedTransport, TEST_REALM, test_config},
		auth::TokenSecret,
	};

	fn context(transport: Arc<ScriptedTransport>) -> ExchangeContext {
		let transport: Arc<dyn HttpTransport> = transport;

		ExchangeContext::from_config(&test_config("https://api.realm.example/v1"), transport)
			.expect("Exchange context should build.")
	}

	#[test]
	fn header_schemes_follow_variant() {
		let credential = Credential::non_expiring(TokenSecret::new("T1"));
		let user = AuthStrategy::UserToken(UserTokenAuth::new(TokenSecret::new("T1")));

		assert_eq!(user.authorization_header_value(&credential), "user-token T1");
		assert_eq!(AuthKind::TempToken.header_scheme(), "temp-token");
		assert_eq!(AuthKind::Federated.header_scheme(), "temp-token");
		assert_eq!(AuthKind::Ticket.header_scheme(), "ticket");
	}

	#[test]
	fn endpoint_appends_encoded_segments() {
		let ctx = context(Arc::new(ScriptedTransport::default()));
		let url = ctx.endpoint(&["auth", "temporaryToken", "bq 7"]).expect("Endpoint should build.");

		assert_eq!(url.as_str(), "https://api.realm.example/v1/auth/temporaryToken/bq%207");

		let request = ctx.request(Method::Get, url);

		assert_eq!(request.header(REALM_HEADER), Some(TEST_REALM));
	}

	#[test]
	fn ticket_strategy_requires_issuer() {
		let config = ClientConfig::new(
			Realm::new(TEST_REALM).expect("Realm fixture should be valid."),
			AuthConfig::Ticket { username: "ops".into(), password: TokenSecret::new("pw") },
		);
		let ctx = context(Arc::new(ScriptedTransport::default()));

		assert!(matches!(
			AuthStrategy::from_config(&config, ctx, None),
			Err(ConfigError::MissingTicketIssuer)
		));
	}

	#[test]
	fn lifespans_ignore_nonsense() {
		assert_eq!(lifespan_from_secs(Some(0.5)), Some(Duration::milliseconds(500)));
		assert_eq!(lifespan_from_secs(Some(300.0)), Some(Duration::seconds(300)));
		assert_eq!(lifespan_from_secs(Some(0.0)), None);
		assert_eq!(lifespan_from_secs(Some(f64::NAN)), None);
		assert_eq!(lifespan_from_secs(None), None);
	}

	#[test]
	fn oversized_lifespans_are_capped() {
		assert_eq!(lifespan_from_secs(Some(1e30)), Some(MAX_LIFESPAN));
		assert_eq!(lifespan_from_secs(Some(9.2e18)), Some(MAX_LIFESPAN));
		assert_eq!(lifespan_from_secs(Some(f64::MAX)), Some(MAX_LIFESPAN));
	}
}
