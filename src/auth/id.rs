//! Strongly typed identifiers for realms and credential scopes.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $validate:path) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a new identifier after validation.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let view = value.as_ref();

				$validate(view)?;

				Ok(Self(view.to_owned()))
			}

			/// Returns the identifier as a string slice.
			pub fn as_str(&self) -> &str {
				&self.0
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				$validate(&value)?;

				Ok(Self(value))
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!(stringify!($name), "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
	};
}

/// Longest hostname DNS allows.
const REALM_MAX_LEN: usize = 253;
const LABEL_MAX_LEN: usize = 63;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (realm, scope).
		kind: &'static str,
	},
	/// The identifier contains a character its kind does not allow.
	#[error("{kind} identifier contains {character:?}.")]
	InvalidCharacter {
		/// Kind of identifier (realm, scope).
		kind: &'static str,
		/// First offending character.
		character: char,
	},
	/// The realm is longer than a hostname may be.
	#[error("Realm identifier exceeds {max} characters.")]
	TooLong {
		/// Maximum permitted character count.
		max: usize,
	},
	/// A dot-separated realm label is empty, too long, or starts or ends with a hyphen.
	#[error("Realm label `{label}` is not a valid hostname label.")]
	InvalidLabel {
		/// The offending label.
		label: String,
	},
}

def_id! { Realm, "Hostname of the tenant realm every request is addressed to.", validate_realm }
def_id! { ScopeKey, "Resource identifier (app or table id) a temporary credential is valid for.", validate_scope }

fn validate_realm(view: &str) -> Result<(), IdentifierError> {
	const KIND: &str = "Realm";

	if view.is_empty() {
		return Err(IdentifierError::Empty { kind: KIND });
	}
	if let Some(character) =
		view.chars().find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '.'))
	{
		return Err(IdentifierError::InvalidCharacter { kind: KIND, character });
	}
	if view.len() > REALM_MAX_LEN {
		return Err(IdentifierError::TooLong { max: REALM_MAX_LEN });
	}

	for label in view.split('.') {
		if label.is_empty()
			|| label.len() > LABEL_MAX_LEN
			|| label.starts_with('-')
			|| label.ends_with('-')
		{
			return Err(IdentifierError::InvalidLabel { label: label.to_owned() });
		}
	}

	Ok(())
}

// Scope keys become a path segment of the exchange URL.
fn validate_scope(view: &str) -> Result<(), IdentifierError> {
	const KIND: &str = "Scope";

	if view.is_empty() {
		return Err(IdentifierError::Empty { kind: KIND });
	}
	if let Some(character) = view
		.chars()
		.find(|c| c.is_whitespace() || c.is_control() || matches!(c, '/' | '?' | '#' | '%'))
	{
		return Err(IdentifierError::InvalidCharacter { kind: KIND, character });
	}

	Ok(())
}
