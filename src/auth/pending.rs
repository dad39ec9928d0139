//! Per-scope singleflight for credential acquisition.
//!
//! Every caller that misses the cache for a scope enqueues interest in the same
//! [`OnceCell`]; the first one to reach it runs the fetch, everyone else awaits the value.
//! The map entry is removed as soon as the fetch settles, success or failure, so the next
//! miss starts a fresh acquisition. If the caller running the fetch is cancelled, the cell
//! stays uninitialized and the next waiter takes over.

// self
use crate::{
	_prelude::*,
	auth::{Credential, ScopeKey},
};

type Settled = Result<Credential, ApiFailure>;
type Slot = Arc<OnceCell<Settled>>;

/// Tracks in-flight acquisitions keyed by scope.
#[derive(Debug, Default)]
pub struct PendingAcquisitions {
	slots: Mutex<HashMap<ScopeKey, Slot>>,
}
impl PendingAcquisitions {
	/// Runs `fetch` for `scope` unless another caller is already doing so, in which case the
	/// other caller's result is shared.
	pub async fn acquire<F, Fut>(&self, scope: &ScopeKey, fetch: F) -> Settled
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Settled>,
	{
		let slot = self.slot(scope);
		let slot_ref = &slot;
		let settled = slot
			.get_or_init(|| async move {
				let settled = fetch().await;

				self.release(scope, slot_ref);

				settled
			})
			.await;

		settled.clone()
	}

	/// Number of scopes with an acquisition in flight.
	pub fn in_flight(&self) -> usize {
		self.slots.lock().len()
	}

	fn slot(&self, scope: &ScopeKey) -> Slot {
		self.slots.lock().entry(scope.clone()).or_default().clone()
	}

	fn release(&self, scope: &ScopeKey, slot: &Slot) {
		let mut slots = self.slots.lock();

		if slots.get(scope).is_some_and(|current| Arc::ptr_eq(current, slot)) {
			slots.remove(scope);
		}
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;
	use crate::auth::TokenSecret;

	fn scope(value: &str) -> ScopeKey {
		ScopeKey::new(value).expect("Scope fixture should be valid.")
	}

	#[tokio::test]
	async fn concurrent_callers_share_one_fetch() {
		let pending = PendingAcquisitions::default();
		let calls = AtomicUsize::new(0);
		let key = scope("bq7xz3");
		let fetch = || async {
			calls.fetch_add(1, Ordering::SeqCst);
			tokio::task::yield_now().await;

			Ok(Credential::non_expiring(TokenSecret::new("shared")))
		};
		let (a, b, c) = tokio::join!(
			pending.acquire(&key, fetch),
			pending.acquire(&key, fetch),
			pending.acquire(&key, fetch),
		);

		assert_eq!(calls.load(Ordering::SeqCst), 1);

		for settled in [a, b, c] {
			assert_eq!(
				settled.expect("Shared fetch should succeed.").token,
				TokenSecret::new("shared")
			);
		}

		assert_eq!(pending.in_flight(), 0, "Settled acquisitions must be released.");
	}

	#[tokio::test]
	async fn failures_are_shared_then_released() {
		let pending = PendingAcquisitions::default();
		let calls = AtomicUsize::new(0);
		let key = scope("bq7xz3");
		let fetch = || async {
			calls.fetch_add(1, Ordering::SeqCst);
			tokio::task::yield_now().await;

			Err(ApiFailure::new("exchange rejected").with_status(401))
		};
		let (a, b) = tokio::join!(pending.acquire(&key, fetch), pending.acquire(&key, fetch));

		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert_eq!(a, b);
		assert_eq!(pending.in_flight(), 0);

		let _ = pending.acquire(&key, fetch).await;

		assert_eq!(calls.load(Ordering::SeqCst), 2, "A new miss must start a new acquisition.");
	}

	#[tokio::test]
	async fn distinct_scopes_do_not_share() {
		let pending = PendingAcquisitions::default();
		let calls = AtomicUsize::new(0);
		let fetch = || async {
			calls.fetch_add(1, Ordering::SeqCst);

			Ok(Credential::non_expiring(TokenSecret::new("t")))
		};
		let (a, b) = (scope("app-a"), scope("app-b"));
		let _ = tokio::join!(pending.acquire(&a, fetch), pending.acquire(&b, fetch));

		assert_eq!(calls.load(Ordering::SeqCst), 2);
	}
}
