//! Issued credential values handed out by auth strategies.

// self
use crate::{_prelude::*, auth::token::secret::TokenSecret};

/// Longest lifetime a cached credential is given, whatever an exchange reports.
pub const MAX_LIFESPAN: Duration = Duration::days(365 * 30);

/// Opaque bearer token plus the instant it expires.
///
/// Credentials are immutable once issued; the cache clones one out per call.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
	/// Token value attached to the authorization header.
	pub token: TokenSecret,
	/// Absolute expiry instant.
	pub expires_at: Instant,
}
impl Credential {
	/// Creates a credential expiring at `expires_at`.
	pub fn new(token: TokenSecret, expires_at: Instant) -> Self {
		Self { token, expires_at }
	}

	/// Creates a credential that never expires in practice (static user tokens).
	pub fn non_expiring(token: TokenSecret) -> Self {
		let now = Instant::now();

		Self { token, expires_at: now.checked_add(MAX_LIFESPAN.unsigned_abs()).unwrap_or(now) }
	}

	/// Returns `true` if the credential has expired at `now`.
	pub fn is_expired_at(&self, now: Instant) -> bool {
		now >= self.expires_at
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credential")
			.field("token", &"<redacted>")
			.field("fingerprint", &self.token.fingerprint())
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn debug_output_redacts_token() {
		let credential = Credential::new(TokenSecret::new("T1"), Instant::now());
		let rendered = format!("{credential:?}");

		assert!(rendered.contains("<redacted>"));
		assert!(!rendered.contains("\"T1\""));
	}

	#[test]
	fn expiry_is_inclusive() {
		let now = Instant::now();
		let credential = Credential::new(TokenSecret::new("T1"), now);

		assert!(credential.is_expired_at(now));
		assert!(!Credential::non_expiring(TokenSecret::new("U")).is_expired_at(now));
	}
}
