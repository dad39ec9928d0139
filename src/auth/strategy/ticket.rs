//! Legacy session tickets.
//!
//! The ticket protocol itself (an XML sign-in call) lives outside this crate behind
//! [`TicketIssuer`]. The strategy caches the issued ticket under a single realm-wide key and
//! replays the session cookies that came with it on every request.

// self
use crate::{
	_prelude::*,
	auth::{
		Credential, Realm, ScopeKey, TokenSecret,
		strategy::{IssuedCredential, ScopedCredentials},
	},
	obs::{self, CallKind, CallOutcome, CallSpan},
};

const GLOBAL_SCOPE: &str = "ticket";

/// Boxed future returned by [`TicketIssuer::issue`].
pub type TicketFuture<'a> = Pin<Box<dyn Future<Output = Result<IssuedTicket, ApiFailure>> + 'a + Send>>;

/// External collaborator that signs in with username and password.
pub trait TicketIssuer
where
	Self: Send + Sync,
{
	/// Obtains a fresh ticket for `request`.
	fn issue<'a>(&'a self, request: TicketRequest<'a>) -> TicketFuture<'a>;
}

/// Sign-in parameters handed to a [`TicketIssuer`].
#[derive(Clone, Copy, Debug)]
pub struct TicketRequest<'a> {
	/// Tenant realm.
	pub realm: &'a Realm,
	/// Account name.
	pub username: &'a str,
	/// Account password.
	pub password: &'a TokenSecret,
}

/// Ticket plus the session cookies issued alongside it.
#[derive(Clone, Debug)]
pub struct IssuedTicket {
	/// Session ticket.
	pub ticket: TokenSecret,
	/// `name=value` cookie pairs to replay on every request.
	pub cookies: Vec<String>,
	/// Ticket lifetime, when the issuer knows it.
	pub lifespan: Option<Duration>,
}

/// Legacy ticket strategy.
pub struct TicketAuth {
	issuer: Arc<dyn TicketIssuer>,
	realm: Realm,
	username: String,
	password: TokenSecret,
	scope: ScopeKey,
	credentials: ScopedCredentials,
	cookies: Mutex<Option<String>>,
}
impl TicketAuth {
	/// Creates the strategy around `issuer`.
	pub fn new(
		issuer: Arc<dyn TicketIssuer>,
		realm: Realm,
		username: String,
		password: TokenSecret,
		credentials: ScopedCredentials,
	) -> Result<Self, ConfigError> {
		Ok(Self {
			issuer,
			realm,
			username,
			password,
			scope: ScopeKey::new(GLOBAL_SCOPE)?,
			credentials,
			cookies: Mutex::new(None),
		})
	}

	/// The realm-wide ticket; request scope is irrelevant.
	pub async fn token(&self) -> Result<Credential> {
		self.credentials.get_or_acquire(CallKind::TicketIssue, &self.scope, || self.issue()).await
	}

	/// Invalidates the ticket unless `rejected` was already replaced, then signs in again.
	pub async fn recover(&self, rejected: Option<&TokenSecret>) -> bool {
		if !self.credentials.is_superseded(&self.scope, rejected) {
			self.invalidate();
		}

		self.token().await.is_ok()
	}

	/// Drops the cached ticket and its cookies.
	pub fn invalidate(&self) {
		self.credentials.invalidate(&self.scope);
		self.cookies.lock().take();
	}

	/// Cookies from the most recent sign-in, joined for a `Cookie` header.
	pub fn session_cookie(&self) -> Option<String> {
		self.cookies.lock().clone()
	}

	async fn issue(&self) -> Result<IssuedCredential, ApiFailure> {
		let kind = CallKind::TicketIssue;
		let span = CallSpan::new(kind, "sign_in");

		obs::record_call_outcome(kind, CallOutcome::Attempt);

		let request =
			TicketRequest { realm: &self.realm, username: &self.username, password: &self.password };
		let issued = span.instrument(self.issuer.issue(request)).await;

		match &issued {
			Ok(_) => obs::record_call_outcome(kind, CallOutcome::Success),
			Err(_) => obs::record_call_outcome(kind, CallOutcome::Failure),
		}

		let issued = issued?;
		let cookies = (!issued.cookies.is_empty()).then(|| issued.cookies.join("; "));

		*self.cookies.lock() = cookies;

		Ok(IssuedCredential { token: issued.ticket, lifespan: issued.lifespan })
	}
}
impl Debug for TicketAuth {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TicketAuth")
			.field("realm", &self.realm)
			.field("username", &self.username)
			.field("credentials", &self.credentials)
			.field("has_cookies", &self.cookies.lock().is_some())
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;
	use crate::auth::{AuthStrategy, CredentialCache};

	#[derive(Debug, Default)]
	struct CountingIssuer {
		calls: AtomicUsize,
		reject: bool,
	}
	impl TicketIssuer for CountingIssuer {
		fn issue<'a>(&'a self, request: TicketRequest<'a>) -> TicketFuture<'a> {
			Box::pin(async move {
				let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

				tokio::task::yield_now().await;

				if self.reject || request.password.expose() != "hunter2" {
					return Err(ApiFailure::new("Invalid username or password").with_status(401));
				}

				Ok(IssuedTicket {
					ticket: TokenSecret::new(format!("ticket-{call}")),
					cookies: vec![format!("TICKET_{}=t{call}", request.realm), "luid=42".into()],
					lifespan: Some(Duration::hours(12)),
				})
			})
		}
	}

	fn strategy(issuer: Arc<CountingIssuer>, password: &str) -> AuthStrategy {
		let realm = Realm::new("acme.realm.example").expect("Realm fixture should be valid.");
		let auth = TicketAuth::new(
			issuer,
			realm,
			"ops@acme.example".into(),
			TokenSecret::new(password),
			ScopedCredentials::new(CredentialCache::new(Duration::minutes(5))),
		)
		.expect("Ticket strategy should build.");

		AuthStrategy::Ticket(auth)
	}

	#[tokio::test]
	async fn issues_once_and_replays_cookies() {
		let issuer = Arc::new(CountingIssuer::default());
		let auth = strategy(issuer.clone(), "hunter2");

		assert_eq!(auth.session_cookie(), None);

		let (a, b) = tokio::join!(auth.token(None), auth.token(None));
		let credential = a.expect("Ticket should be issued.");

		assert_eq!(b.expect("Ticket should be shared.").token, credential.token);
		assert_eq!(issuer.calls.load(Ordering::SeqCst), 1);
		assert_eq!(auth.authorization_header_value(&credential), "ticket ticket-1");
		assert_eq!(
			auth.session_cookie().as_deref(),
			Some("TICKET_acme.realm.example=t1; luid=42")
		);

		assert!(auth.handle_auth_failure(None).await);
		assert_eq!(auth.session_cookie().as_deref(), Some("TICKET_acme.realm.example=t2; luid=42"));
	}

	#[tokio::test]
	async fn rejected_sign_in_is_an_authentication_error() {
		let issuer = Arc::new(CountingIssuer { reject: true, ..Default::default() });
		let auth = strategy(issuer, "hunter2");
		let err = auth.token(None).await.expect_err("Sign-in should fail.");

		assert!(matches!(err, Error::Authentication(_)));
		assert_eq!(err.status(), Some(401));
		assert!(!auth.handle_auth_failure(None).await);
		assert_eq!(auth.session_cookie(), None);
	}
}
