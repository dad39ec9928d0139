//! Client-side admission control.
//!
//! [`Throttle::SlidingWindow`] keeps the timestamps of recent admissions and admits a call
//! only while fewer than `limit` fall inside the rolling window. Check-and-record happens in
//! one synchronous critical section, so two callers can never both claim the same spare slot;
//! waiting happens outside the lock and re-evaluates from scratch because other admissions
//! may land while a caller sleeps.

// std
use std::collections::VecDeque;
// self
use crate::{_prelude::*, resilience::to_std};

/// Admission gate applied before every outbound API call.
#[derive(Debug, Default)]
pub enum Throttle {
	/// Admits every call immediately.
	#[default]
	Disabled,
	/// Admits at most `limit` calls per rolling window.
	SlidingWindow(SlidingWindow),
}
impl Throttle {
	/// Builds a sliding-window throttle admitting `limit` calls per `window`.
	pub fn sliding_window(limit: usize, window: Duration) -> Self {
		Self::SlidingWindow(SlidingWindow::new(limit, window))
	}

	/// Waits until a slot is free, then records the admission.
	pub async fn acquire(&self) {
		if let Self::SlidingWindow(window) = self {
			window.acquire().await;
		}
	}

	/// Admissions recorded inside the current window.
	pub fn window_count(&self) -> usize {
		match self {
			Self::Disabled => 0,
			Self::SlidingWindow(window) => window.window_count(),
		}
	}

	/// Slots left in the current window; unbounded when disabled.
	pub fn remaining(&self) -> usize {
		match self {
			Self::Disabled => usize::MAX,
			Self::SlidingWindow(window) => window.remaining(),
		}
	}

	/// Forgets every recorded admission.
	pub fn reset(&self) {
		if let Self::SlidingWindow(window) = self {
			window.reset();
		}
	}
}

/// Rolling-window admission state.
#[derive(Debug)]
pub struct SlidingWindow {
	limit: usize,
	window: std::time::Duration,
	admissions: Mutex<VecDeque<Instant>>,
}
impl SlidingWindow {
	/// Creates a window admitting `limit` calls per `window`; a zero limit is treated as one.
	pub fn new(limit: usize, window: Duration) -> Self {
		Self {
			limit: limit.max(1),
			window: to_std(window),
			admissions: Mutex::new(VecDeque::with_capacity(limit.max(1))),
		}
	}

	/// Configured admissions per window.
	pub fn limit(&self) -> usize {
		self.limit
	}

	/// Waits until a slot is free, then records the admission.
	pub async fn acquire(&self) {
		loop {
			let wait = match self.try_admit(Instant::now()) {
				Ok(()) => return,
				Err(wait) => wait,
			};

			crate::obs::trace_throttle_wait(wait);

			tokio::time::sleep(wait).await;
		}
	}

	/// Admissions recorded inside the current window.
	pub fn window_count(&self) -> usize {
		let mut admissions = self.admissions.lock();

		self.prune(&mut admissions, Instant::now());

		admissions.len()
	}

	/// Slots left in the current window.
	pub fn remaining(&self) -> usize {
		self.limit.saturating_sub(self.window_count())
	}

	/// Forgets every recorded admission.
	pub fn reset(&self) {
		self.admissions.lock().clear();
	}

	/// Records an admission at `now` if a slot is free, else returns how long to wait.
	fn try_admit(&self, now: Instant) -> Result<(), std::time::Duration> {
		let mut admissions = self.admissions.lock();

		self.prune(&mut admissions, now);

		if admissions.len() < self.limit {
			admissions.push_back(now);

			return Ok(());
		}

		let oldest = admissions.front().copied().unwrap_or(now);

		Err(oldest
			.checked_add(self.window)
			.map_or(self.window, |free_at| free_at.saturating_duration_since(now)))
	}

	fn prune(&self, admissions: &mut VecDeque<Instant>, now: Instant) {
		while let Some(oldest) = admissions.front() {
			if now.saturating_duration_since(*oldest) >= self.window {
				admissions.pop_front();
			} else {
				break;
			}
		}
	}
}
