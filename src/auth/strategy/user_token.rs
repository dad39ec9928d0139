//! Static user-token authentication.

// self
use crate::auth::{Credential, TokenSecret};

/// Sends the configured user token unchanged; there is nothing to cache or refresh.
#[derive(Debug)]
pub struct UserTokenAuth {
	credential: Credential,
}
impl UserTokenAuth {
	/// Wraps a long-lived user token.
	pub fn new(token: TokenSecret) -> Self {
		Self { credential: Credential::non_expiring(token) }
	}

	/// The configured token as a credential.
	pub fn credential(&self) -> Credential {
		self.credential.clone()
	}
}
