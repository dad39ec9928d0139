//! Secure token secret wrapper that redacts sensitive material.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

const FINGERPRINT_BYTES: usize = 9;

/// Redacted token secret wrapper keeping sensitive material out of logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Returns `true` if the secret is empty or only whitespace.
	pub fn is_blank(&self) -> bool {
		self.0.trim().is_empty()
	}

	/// Short, stable digest that identifies the secret in logs without revealing it.
	///
	/// The value is the base64url (no padding) encoding of the first bytes of the SHA-256
	/// digest, so two log lines can be correlated to the same credential.
	pub fn fingerprint(&self) -> String {
		let digest = Sha256::digest(self.0.as_bytes());

		URL_SAFE_NO_PAD.encode(&digest[..FINGERPRINT_BYTES])
	}
}
impl AsRef<str> for TokenSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}
