//! TTL-keyed credential cache.
//!
//! The cache is a passive data structure: no I/O, no locks, `&mut self` mutation. Strategies
//! own it behind a mutex and handle deduplication themselves (see [`crate::auth::pending`]).

// self
use crate::{
	_prelude::*,
	auth::{Credential, MAX_LIFESPAN, ScopeKey, TokenSecret},
};

/// Default safety buffer subtracted from a credential's nominal expiry.
pub const DEFAULT_EXPIRY_BUFFER: Duration = Duration::seconds(10);

#[derive(Clone, Debug)]
struct CacheEntry {
	credential: Credential,
	stale_at: Instant,
}

/// Maps scope keys to credentials plus the instant they stop being handed out.
///
/// An entry goes stale `min(expiry_buffer, lifespan / 10)` before its nominal expiry. With
/// multi-minute lifespans that is the full buffer; very short-lived credentials keep
/// most of their lifetime instead of expiring on arrival. Stale entries are evicted lazily
/// on read.
#[derive(Debug)]
pub struct CredentialCache {
	entries: HashMap<ScopeKey, CacheEntry>,
	default_lifespan: Duration,
	expiry_buffer: Duration,
}
impl CredentialCache {
	/// Creates an empty cache using `default_lifespan` for entries without an override.
	pub fn new(default_lifespan: Duration) -> Self {
		Self { entries: HashMap::new(), default_lifespan, expiry_buffer: DEFAULT_EXPIRY_BUFFER }
	}

	/// Overrides the expiry safety buffer.
	pub fn with_expiry_buffer(mut self, buffer: Duration) -> Self {
		self.expiry_buffer = if buffer.is_negative() { Duration::ZERO } else { buffer };

		self
	}

	/// Default lifespan applied by [`set`](Self::set).
	pub fn default_lifespan(&self) -> Duration {
		self.default_lifespan
	}

	/// Returns a usable credential for `scope`, evicting it if it went stale.
	pub fn get(&mut self, scope: &ScopeKey) -> Option<Credential> {
		self.get_at(scope, Instant::now())
	}

	/// [`get`](Self::get) evaluated at an explicit instant.
	pub fn get_at(&mut self, scope: &ScopeKey, now: Instant) -> Option<Credential> {
		let entry = self.entries.get(scope)?;

		if now >= entry.stale_at {
			self.entries.remove(scope);

			return None;
		}

		Some(entry.credential.clone())
	}

	/// Stores `token` for `scope`, returning the credential that was cached.
	pub fn set(
		&mut self,
		scope: ScopeKey,
		token: TokenSecret,
		lifespan: Option<Duration>,
	) -> Credential {
		self.set_at(scope, token, lifespan, Instant::now())
	}

	/// [`set`](Self::set) evaluated at an explicit instant.
	pub fn set_at(
		&mut self,
		scope: ScopeKey,
		token: TokenSecret,
		lifespan: Option<Duration>,
		now: Instant,
	) -> Credential {
		let lifespan = clamp_lifespan(lifespan.unwrap_or(self.default_lifespan));
		let buffer = self.expiry_buffer.min(lifespan / 10_i32);
		let expires_at = now.checked_add(lifespan.unsigned_abs()).unwrap_or(now);
		let stale_at = expires_at.checked_sub(buffer.unsigned_abs()).unwrap_or(now);
		let credential = Credential::new(token, expires_at);

		self.entries.insert(scope, CacheEntry { credential: credential.clone(), stale_at });

		credential
	}

	/// Removes the entry for `scope`; returns whether one existed.
	pub fn delete(&mut self, scope: &ScopeKey) -> bool {
		self.entries.remove(scope).is_some()
	}

	/// Drops every entry.
	pub fn clear(&mut self) {
		self.entries.clear();
	}

	/// Returns `true` if a usable credential exists for `scope`.
	pub fn has(&mut self, scope: &ScopeKey) -> bool {
		self.has_at(scope, Instant::now())
	}

	/// [`has`](Self::has) evaluated at an explicit instant.
	pub fn has_at(&mut self, scope: &ScopeKey, now: Instant) -> bool {
		self.get_at(scope, now).is_some()
	}

	/// Time left before the credential for `scope` goes stale.
	pub fn time_to_expiry(&mut self, scope: &ScopeKey) -> Option<Duration> {
		self.time_to_expiry_at(scope, Instant::now())
	}

	/// [`time_to_expiry`](Self::time_to_expiry) evaluated at an explicit instant.
	pub fn time_to_expiry_at(&mut self, scope: &ScopeKey, now: Instant) -> Option<Duration> {
		self.get_at(scope, now)?;

		let entry = self.entries.get(scope)?;

		Duration::try_from(entry.stale_at.saturating_duration_since(now)).ok()
	}

	/// Number of entries currently held, stale or not.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Returns `true` if no entries are held.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

fn clamp_lifespan(value: Duration) -> Duration {
	value.clamp(Duration::ZERO, MAX_LIFESPAN)
}
