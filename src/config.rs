//! Client configuration: realm, credentials, retry and throttle policies.
//!
//! [`ClientConfig`] deserializes from any serde format, so services can keep it next to the
//! rest of their settings. Every field except `realm` and `auth` has a default. Validation
//! happens once, in [`ClientBuilder::build`](crate::client::ClientBuilder::build).

// self
use crate::{
	_prelude::*,
	auth::{Realm, TokenSecret},
	http::DEFAULT_CORRELATION_HEADERS,
	resilience::{BackoffPolicy, Throttle},
};

/// Base URL used when the config does not name one.
pub const DEFAULT_BASE_URL: &str = "https://api.realm.example/v1";
/// Token type requested from the federated exchange when the config does not name one.
pub const DEFAULT_REQUESTED_TOKEN_TYPE: &str = "urn:ietf:params:oauth:token-type:access_token";
/// `User-Agent` sent when the config does not name one.
pub const DEFAULT_USER_AGENT: &str = concat!("realm-client/", env!("CARGO_PKG_VERSION"));

const DEFAULT_CREDENTIAL_LIFESPAN_MS: u64 = 290_000;
const DEFAULT_EXPIRY_BUFFER_MS: u64 = 10_000;

/// Top-level client configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
	/// Tenant realm hostname, sent with every request.
	pub realm: Realm,
	/// API base URL; [`DEFAULT_BASE_URL`] when absent.
	#[serde(default)]
	pub base_url: Option<Url>,
	/// Authentication strategy and its secrets.
	pub auth: AuthConfig,
	/// Retry policy for retryable failures.
	#[serde(default)]
	pub retry: RetryPolicy,
	/// Client-side admission control.
	#[serde(default)]
	pub throttle: ThrottlePolicy,
	/// Lifespan of cached credentials when the exchange does not report one.
	#[serde(default = "default_credential_lifespan_ms")]
	pub credential_lifespan_ms: u64,
	/// Upper bound of the safety margin before a cached credential's expiry.
	#[serde(default = "default_expiry_buffer_ms")]
	pub expiry_buffer_ms: u64,
	/// Response headers copied into every error, highest priority first.
	#[serde(default = "default_correlation_headers")]
	pub correlation_headers: Vec<String>,
	/// Per-request transport deadline.
	#[serde(default)]
	pub request_timeout_ms: Option<u64>,
	/// `User-Agent` header value.
	#[serde(default = "default_user_agent")]
	pub user_agent: String,
}
impl ClientConfig {
	/// Creates a config with defaults for everything except the realm and auth strategy.
	pub fn new(realm: Realm, auth: AuthConfig) -> Self {
		Self {
			realm,
			base_url: None,
			auth,
			retry: RetryPolicy::default(),
			throttle: ThrottlePolicy::default(),
			credential_lifespan_ms: DEFAULT_CREDENTIAL_LIFESPAN_MS,
			expiry_buffer_ms: DEFAULT_EXPIRY_BUFFER_MS,
			correlation_headers: default_correlation_headers(),
			request_timeout_ms: None,
			user_agent: default_user_agent(),
		}
	}

	/// Overrides the API base URL.
	pub fn with_base_url(mut self, base_url: Url) -> Self {
		self.base_url = Some(base_url);

		self
	}

	/// Replaces the retry policy.
	pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
		self.retry = retry;

		self
	}

	/// Overrides the attempt budget per logical call.
	pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
		self.retry.max_attempts = max_attempts;

		self
	}

	/// Overrides the first computed backoff delay.
	pub fn with_initial_delay(mut self, delay: Duration) -> Self {
		self.retry.initial_delay_ms = to_millis(delay);

		self
	}

	/// Overrides the backoff ceiling.
	pub fn with_max_delay(mut self, delay: Duration) -> Self {
		self.retry.max_delay_ms = to_millis(delay);

		self
	}

	/// Overrides the backoff growth factor.
	pub fn with_multiplier(mut self, multiplier: f64) -> Self {
		self.retry.multiplier = multiplier;

		self
	}

	/// Replaces the throttle policy.
	pub fn with_throttle(mut self, throttle: ThrottlePolicy) -> Self {
		self.throttle = throttle;

		self
	}

	/// Overrides the default cached-credential lifespan.
	pub fn with_credential_lifespan(mut self, lifespan: Duration) -> Self {
		self.credential_lifespan_ms = to_millis(lifespan);

		self
	}

	/// Overrides the credential expiry safety buffer.
	pub fn with_expiry_buffer(mut self, buffer: Duration) -> Self {
		self.expiry_buffer_ms = to_millis(buffer);

		self
	}

	/// Replaces the correlation header names.
	pub fn with_correlation_headers<I, S>(mut self, names: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.correlation_headers = names.into_iter().map(Into::into).collect();

		self
	}

	/// Sets the per-request transport deadline.
	pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout_ms = Some(to_millis(timeout));

		self
	}

	/// Overrides the `User-Agent` header.
	pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
		self.user_agent = user_agent.into();

		self
	}

	/// Base URL with [`DEFAULT_BASE_URL`] applied.
	pub fn effective_base_url(&self) -> Result<Url, ConfigError> {
		match &self.base_url {
			Some(url) => Ok(url.clone()),
			None => Url::parse(DEFAULT_BASE_URL)
				.map_err(|source| ConfigError::InvalidUrl { url: DEFAULT_BASE_URL.into(), source }),
		}
	}

	/// Default cached-credential lifespan.
	pub fn credential_lifespan(&self) -> Duration {
		from_millis(self.credential_lifespan_ms)
	}

	/// Credential expiry safety buffer.
	pub fn expiry_buffer(&self) -> Duration {
		from_millis(self.expiry_buffer_ms)
	}

	/// Per-request transport deadline.
	pub fn request_timeout(&self) -> Option<Duration> {
		self.request_timeout_ms.map(from_millis)
	}

	/// Checks every invariant the client relies on.
	pub fn validate(&self) -> Result<(), ConfigError> {
		let base_url = self.effective_base_url()?;

		if !matches!(base_url.scheme(), "http" | "https") || base_url.cannot_be_a_base() {
			return Err(ConfigError::UnsupportedScheme { url: base_url.into() });
		}

		self.retry.validate()?;
		self.throttle.validate()?;

		if self.credential_lifespan_ms == 0 {
			return Err(ConfigError::NonPositiveLifespan);
		}

		self.auth.validate()
	}
}

/// Authentication strategy selection plus its secrets.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuthConfig {
	/// Long-lived user token sent as-is.
	UserToken {
		/// User token.
		token: TokenSecret,
	},
	/// Per-scope temporary tokens exchanged on demand.
	TempToken {
		/// Bootstrap user token; the exchange relies on the session cookie when absent.
		#[serde(default)]
		user_token: Option<TokenSecret>,
	},
	/// Single temporary token obtained by exchanging a federated assertion.
	Federated {
		/// Base64 SAML assertion.
		assertion: TokenSecret,
		/// Token type asked of the exchange.
		#[serde(default = "default_requested_token_type")]
		requested_token_type: String,
	},
	/// Session ticket obtained from username and password.
	Ticket {
		/// Account name.
		username: String,
		/// Account password.
		password: TokenSecret,
	},
}
impl AuthConfig {
	/// Builds a federated config with the default requested token type.
	pub fn federated(assertion: impl Into<String>) -> Self {
		Self::Federated {
			assertion: TokenSecret::new(assertion),
			requested_token_type: default_requested_token_type(),
		}
	}

	fn validate(&self) -> Result<(), ConfigError> {
		match self {
			Self::UserToken { token } if token.is_blank() =>
				Err(ConfigError::EmptySecret { field: "user_token.token" }),
			Self::TempToken { user_token: Some(token) } if token.is_blank() =>
				Err(ConfigError::EmptySecret { field: "temp_token.user_token" }),
			Self::Federated { assertion, .. } if assertion.is_blank() =>
				Err(ConfigError::EmptySecret { field: "federated.assertion" }),
			Self::Federated { requested_token_type, .. } if requested_token_type.trim().is_empty() =>
				Err(ConfigError::EmptySecret { field: "federated.requested_token_type" }),
			Self::Ticket { username, .. } if username.trim().is_empty() =>
				Err(ConfigError::EmptySecret { field: "ticket.username" }),
			Self::Ticket { password, .. } if password.is_blank() =>
				Err(ConfigError::EmptySecret { field: "ticket.password" }),
			_ => Ok(()),
		}
	}
}

/// Retry budget and backoff timing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
	/// Total attempts per logical call, including the first.
	pub max_attempts: u32,
	/// Delay before the second attempt.
	pub initial_delay_ms: u64,
	/// Ceiling for the exponential term.
	pub max_delay_ms: u64,
	/// Growth factor per attempt.
	pub multiplier: f64,
}
impl RetryPolicy {
	/// Backoff timing derived from this policy.
	pub fn backoff(&self) -> BackoffPolicy {
		BackoffPolicy {
			initial_delay: from_millis(self.initial_delay_ms),
			max_delay: from_millis(self.max_delay_ms),
			multiplier: self.multiplier,
		}
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.max_attempts == 0 {
			return Err(ConfigError::InvalidRetryPolicy { reason: "max_attempts must be at least 1" });
		}
		if !self.multiplier.is_finite() || self.multiplier < 1.0 {
			return Err(ConfigError::InvalidRetryPolicy {
				reason: "multiplier must be a finite number of at least 1",
			});
		}
		if self.initial_delay_ms > self.max_delay_ms {
			return Err(ConfigError::InvalidRetryPolicy {
				reason: "initial_delay_ms cannot exceed max_delay_ms",
			});
		}

		Ok(())
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self { max_attempts: 3, initial_delay_ms: 1_000, max_delay_ms: 30_000, multiplier: 2.0 }
	}
}

/// Longest throttle window accepted by validation, in seconds.
pub const MAX_THROTTLE_WINDOW_SECS: u64 = 24 * 60 * 60;

/// Sliding-window admission policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottlePolicy {
	/// Turns the throttle on.
	pub enabled: bool,
	/// Admissions allowed per window.
	pub requests_per_window: usize,
	/// Window length in seconds.
	pub window_secs: u64,
}
impl ThrottlePolicy {
	/// Enabled policy admitting `requests_per_window` calls every `window_secs`.
	pub fn sliding_window(requests_per_window: usize, window_secs: u64) -> Self {
		Self { enabled: true, requests_per_window, window_secs }
	}

	/// Builds the throttle this policy describes.
	pub fn build(&self) -> Throttle {
		if !self.enabled {
			return Throttle::Disabled;
		}

		let window = Duration::seconds(i64::try_from(self.window_secs).unwrap_or(i64::MAX));

		Throttle::sliding_window(self.requests_per_window, window)
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if !self.enabled {
			return Ok(());
		}
		if self.requests_per_window == 0 {
			return Err(ConfigError::InvalidThrottlePolicy {
				reason: "requests_per_window must be positive",
			});
		}
		if self.window_secs == 0 {
			return Err(ConfigError::InvalidThrottlePolicy { reason: "window_secs must be positive" });
		}
		if self.window_secs > MAX_THROTTLE_WINDOW_SECS {
			return Err(ConfigError::InvalidThrottlePolicy {
				reason: "window_secs must not exceed one day",
			});
		}

		Ok(())
	}
}
impl Default for ThrottlePolicy {
	fn default() -> Self {
		Self { enabled: false, requests_per_window: 100, window_secs: 10 }
	}
}

fn default_credential_lifespan_ms() -> u64 {
	DEFAULT_CREDENTIAL_LIFESPAN_MS
}

fn default_expiry_buffer_ms() -> u64 {
	DEFAULT_EXPIRY_BUFFER_MS
}

fn default_correlation_headers() -> Vec<String> {
	DEFAULT_CORRELATION_HEADERS.iter().map(|name| (*name).to_owned()).collect()
}

fn default_user_agent() -> String {
	DEFAULT_USER_AGENT.to_owned()
}

fn default_requested_token_type() -> String {
	DEFAULT_REQUESTED_TOKEN_TYPE.to_owned()
}

fn to_millis(duration: Duration) -> u64 {
	u64::try_from(duration.whole_milliseconds().max(0)).unwrap_or(u64::MAX)
}

fn from_millis(millis: u64) -> Duration {
	Duration::milliseconds(i64::try_from(millis).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn realm() -> Realm {
		Realm::new("acme.realm.example").expect("Realm fixture should be valid.")
	}

	fn user_token() -> AuthConfig {
		AuthConfig::UserToken { token: TokenSecret::new("b4x7_user") }
	}

	#[test]
	fn minimal_json_applies_defaults() {
		let config: ClientConfig = serde_json::from_str(
			r#"{"realm":"acme.realm.example","auth":{"kind":"temp_token"}}"#,
		)
		.expect("Minimal config should deserialize.");

		assert!(matches!(config.auth, AuthConfig::TempToken { user_token: None }));
		assert_eq!(config.retry, RetryPolicy::default());
		assert_eq!(config.throttle, ThrottlePolicy::default());
		assert_eq!(config.credential_lifespan(), Duration::milliseconds(290_000));
		assert_eq!(config.expiry_buffer(), Duration::seconds(10));
		assert_eq!(config.correlation_headers, vec!["x-request-id", "cf-ray"]);
		assert_eq!(
			config.effective_base_url().expect("Default base URL should parse.").as_str(),
			DEFAULT_BASE_URL
		);
		assert!(config.validate().is_ok());
	}

	#[test]
	fn auth_variants_are_tagged_by_kind() {
		let config: ClientConfig = serde_json::from_str(
			r#"{
				"realm": "acme.realm.example",
				"auth": { "kind": "federated", "assertion": "PHNhbWw+" },
				"retry": { "max_attempts": 5 },
				"throttle": { "enabled": true, "requests_per_window": 10 }
			}"#,
		)
		.expect("Federated config should deserialize.");

		match &config.auth {
			AuthConfig::Federated { assertion, requested_token_type } => {
				assert_eq!(assertion.expose(), "PHNhbWw+");
				assert_eq!(requested_token_type, DEFAULT_REQUESTED_TOKEN_TYPE);
			},
			other => panic!("Unexpected auth config: {other:?}."),
		}

		assert_eq!(config.retry.max_attempts, 5);
		assert_eq!(config.retry.initial_delay_ms, 1_000);
		assert_eq!(config.throttle.window_secs, 10);
		assert!(matches!(config.throttle.build(), Throttle::SlidingWindow(_)));
	}

	#[test]
	fn validation_rejects_bad_policies() {
		let base = ClientConfig::new(realm(), user_token());

		assert!(matches!(
			base.clone().with_max_attempts(0).validate(),
			Err(ConfigError::InvalidRetryPolicy { .. })
		));
		assert!(matches!(
			base.clone().with_multiplier(0.5).validate(),
			Err(ConfigError::InvalidRetryPolicy { .. })
		));
		assert!(matches!(
			base.clone()
				.with_initial_delay(Duration::seconds(5))
				.with_max_delay(Duration::seconds(1))
				.validate(),
			Err(ConfigError::InvalidRetryPolicy { .. })
		));
		assert!(matches!(
			base.clone().with_throttle(ThrottlePolicy::sliding_window(0, 10)).validate(),
			Err(ConfigError::InvalidThrottlePolicy { .. })
		));
		assert!(matches!(
			base.clone().with_throttle(ThrottlePolicy::sliding_window(10, u64::MAX)).validate(),
			Err(ConfigError::InvalidThrottlePolicy { .. })
		));
		assert!(
			base.clone()
				.with_throttle(ThrottlePolicy::sliding_window(10, MAX_THROTTLE_WINDOW_SECS))
				.validate()
				.is_ok()
		);
		assert!(matches!(
			base.clone().with_credential_lifespan(Duration::ZERO).validate(),
			Err(ConfigError::NonPositiveLifespan)
		));
		assert!(matches!(
			base.with_base_url(Url::parse("ftp://files.example").expect("URL fixture should parse."))
				.validate(),
			Err(ConfigError::UnsupportedScheme { .. })
		));
	}

	#[test]
	fn validation_rejects_blank_secrets() {
		let blank_token = ClientConfig::new(realm(), AuthConfig::UserToken {
			token: TokenSecret::new("  "),
		});

		assert!(matches!(
			blank_token.validate(),
			Err(ConfigError::EmptySecret { field: "user_token.token" })
		));

		let blank_password = ClientConfig::new(realm(), AuthConfig::Ticket {
			username: "ops@acme.example".into(),
			password: TokenSecret::new(""),
		});

		assert!(matches!(
			blank_password.validate(),
			Err(ConfigError::EmptySecret { field: "ticket.password" })
		));
		assert!(ClientConfig::new(realm(), AuthConfig::federated("PHNhbWw+")).validate().is_ok());
	}

	#[test]
	fn duration_builders_round_to_milliseconds() {
		let config = ClientConfig::new(realm(), user_token())
			.with_initial_delay(Duration::milliseconds(250))
			.with_request_timeout(Duration::seconds(3));

		assert_eq!(config.retry.backoff().initial_delay, Duration::milliseconds(250));
		assert_eq!(config.request_timeout(), Some(Duration::seconds(3)));
		assert!(!config.throttle.enabled);
		assert!(matches!(config.throttle.build(), Throttle::Disabled));
	}
}
