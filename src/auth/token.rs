//! Credential values and the redacted secrets they carry.

pub mod credential;
pub mod secret;
