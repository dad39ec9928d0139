//! Client facade: owns the transport, auth strategy, throttle, and counters of one realm
//! connection.

pub mod classify;
pub mod metrics;

mod execute;

pub use classify::StatusClass;
pub use metrics::*;

// self
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;
use crate::{
	_prelude::*,
	auth::{AuthStrategy, ExchangeContext, Realm, TicketIssuer},
	config::ClientConfig,
	http::HttpTransport,
	resilience::{BackoffPolicy, RateLimitInfo, RateLimitObserver, Throttle},
};

/// Resilient client for one realm.
///
/// Every client owns its own credential cache, pending-acquisition map, throttle window, and
/// counters; nothing is shared between instances. Cloning is cheap and clones share all of
/// that state.
#[derive(Clone)]
pub struct Client {
	ctx: ExchangeContext,
	auth: Arc<AuthStrategy>,
	throttle: Arc<Throttle>,
	metrics: Arc<ClientMetrics>,
	max_attempts: u32,
	backoff: BackoffPolicy,
	rate_limit_observer: Option<RateLimitObserver>,
}
impl Client {
	/// Starts building a client for `config`.
	pub fn builder(config: ClientConfig) -> ClientBuilder {
		ClientBuilder::new(config)
	}

	/// Active auth strategy.
	pub fn auth(&self) -> &AuthStrategy {
		&self.auth
	}

	/// Client-side throttle.
	pub fn throttle(&self) -> &Throttle {
		&self.throttle
	}

	/// Per-client counters.
	pub fn metrics(&self) -> &ClientMetrics {
		&self.metrics
	}

	/// Realm every request is addressed to.
	pub fn realm(&self) -> &Realm {
		&self.ctx.realm
	}

	/// API base URL.
	pub fn base_url(&self) -> &Url {
		&self.ctx.base_url
	}
}
impl Debug for Client {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Client")
			.field("ctx", &self.ctx)
			.field("auth", &self.auth.kind())
			.field("throttle", &self.throttle)
			.field("max_attempts", &self.max_attempts)
			.field("backoff", &self.backoff)
			.field("has_rate_limit_observer", &self.rate_limit_observer.is_some())
			.finish()
	}
}

/// Builder for [`Client`].
pub struct ClientBuilder {
	config: ClientConfig,
	transport: Option<Arc<dyn HttpTransport>>,
	ticket_issuer: Option<Arc<dyn TicketIssuer>>,
	rate_limit_observer: Option<RateLimitObserver>,
}
impl ClientBuilder {
	/// Creates a builder with the default transport and no observer.
	pub fn new(config: ClientConfig) -> Self {
		Self { config, transport: None, ticket_issuer: None, rate_limit_observer: None }
	}

	/// Uses `transport` for API calls and credential exchanges.
	pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
		self.transport = Some(transport);

		self
	}

	/// Supplies the sign-in collaborator required by ticket authentication.
	pub fn ticket_issuer(mut self, issuer: Arc<dyn TicketIssuer>) -> Self {
		self.ticket_issuer = Some(issuer);

		self
	}

	/// Registers a callback invoked for every rate-limited response.
	pub fn rate_limit_observer<F>(mut self, observer: F) -> Self
	where
		F: 'static + Fn(&RateLimitInfo) + Send + Sync,
	{
		self.rate_limit_observer = Some(Arc::new(observer));

		self
	}

	/// Validates the config and assembles the client.
	pub fn build(self) -> Result<Client, ConfigError> {
		let Self { config, transport, ticket_issuer, rate_limit_observer } = self;

		config.validate()?;

		let transport = match transport {
			Some(transport) => transport,
			None => default_transport()?,
		};
		let ctx = ExchangeContext::from_config(&config, transport)?;
		let auth = AuthStrategy::from_config(&config, ctx.clone(), ticket_issuer)?;

		Ok(Client {
			ctx,
			auth: Arc::new(auth),
			throttle: Arc::new(config.throttle.build()),
			metrics: Arc::new(ClientMetrics::default()),
			max_attempts: config.retry.max_attempts,
			backoff: config.retry.backoff(),
			rate_limit_observer,
		})
	}
}
impl Debug for ClientBuilder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientBuilder")
			.field("config", &self.config)
			.field("has_transport", &self.transport.is_some())
			.field("has_ticket_issuer", &self.ticket_issuer.is_some())
			.field("has_rate_limit_observer", &self.rate_limit_observer.is_some())
			.finish()
	}
}

#[cfg(feature = "reqwest")]
fn default_transport() -> Result<Arc<dyn HttpTransport>, ConfigError> {
	let client = ReqwestClient::builder().build()?;

	Ok(Arc::new(ReqwestTransport::with_client(client)))
}

#[cfg(not(feature = "reqwest"))]
fn default_transport() -> Result<Arc<dyn HttpTransport>, ConfigError> {
	Err(ConfigError::MissingTransport)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		_preludet::{ScriptedTransport, TEST_REALM, build_scripted_client, test_config},
		auth::{AuthKind, TokenSecret},
		config::{AuthConfig, ThrottlePolicy},
	};

	#[test]
	fn builder_validates_config() {
		let config = test_config("https://api.realm.example/v1").with_max_attempts(0);
		let transport: Arc<dyn HttpTransport> = Arc::new(ScriptedTransport::default());
		let err = Client::builder(config).transport(transport).build().expect_err("Config is invalid.");

		assert!(matches!(err, ConfigError::InvalidRetryPolicy { .. }));
	}

	#[test]
	fn builder_wires_strategy_and_throttle() {
		let config = test_config("https://api.realm.example/v1")
			.with_throttle(ThrottlePolicy::sliding_window(5, 1));
		let client = build_scripted_client(Arc::new(ScriptedTransport::default()), config);

		assert_eq!(client.auth().kind(), AuthKind::TempToken);
		assert_eq!(client.realm().as_str(), TEST_REALM);
		assert_eq!(client.throttle().remaining(), 5);
		assert_eq!(client.metrics().attempts(), 0);
	}

	#[test]
	fn clients_do_not_share_state() {
		let config = test_config("https://api.realm.example/v1").with_throttle(ThrottlePolicy::sliding_window(5, 60));
		let transport = Arc::new(ScriptedTransport::default());
		let a = build_scripted_client(transport.clone(), config.clone());
		let b = build_scripted_client(transport, config);

		assert!(!Arc::ptr_eq(&a.auth, &b.auth));
		assert!(!Arc::ptr_eq(&a.throttle, &b.throttle));

		let clone = a.clone();

		assert!(Arc::ptr_eq(&a.auth, &clone.auth));
	}

	#[test]
	fn user_token_clients_build_without_exchange() {
		let mut config = test_config("https://api.realm.example/v1");

		config.auth = AuthConfig::UserToken { token: TokenSecret::new("b4x7_user") };

		let client = build_scripted_client(Arc::new(ScriptedTransport::default()), config);

		assert_eq!(client.auth().kind(), AuthKind::UserToken);
	}
}
