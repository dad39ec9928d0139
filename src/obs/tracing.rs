// self
use crate::{
	_prelude::*,
	obs::{CallKind, RetryReason},
	resilience::RateLimitInfo,
};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedCall<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedCall<F> = F;

/// A span builder used by API calls and credential exchanges.
#[derive(Clone, Debug)]
pub struct CallSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl CallSpan {
	/// Creates a new span tagged with the provided call kind + stage.
	pub fn new(kind: CallKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("realm_client.call", kind = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedCall<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits a `warn` event for a scheduled retry.
pub fn trace_retry(reason: RetryReason, attempt: u32, delay: Duration) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(
			reason = reason.as_str(),
			attempt,
			delay_ms = delay.whole_milliseconds() as u64,
			"Retrying realm API call."
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (reason, attempt, delay);
	}
}

/// Emits a `warn` event for a rate-limited response.
pub fn trace_rate_limited(info: &RateLimitInfo) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(
			method = info.method.as_str(),
			path = %info.path,
			attempt = info.attempt,
			retry_after_ms = info.retry_after.whole_milliseconds() as u64,
			server_directed = info.is_server_directed(),
			correlation_id = info.correlation.primary(),
			"Realm API rate limited the call."
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = info;
	}
}

/// Emits a `debug` event for a credential recovery cycle.
pub fn trace_recovery(scope: Option<&str>, recovered: bool) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(scope, recovered, "Credential recovery cycle finished.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (scope, recovered);
	}
}

/// Emits a `debug` event when a fresh credential is cached; only the fingerprint is logged.
pub fn trace_credential_issued(kind: CallKind, scope: &str, fingerprint: &str) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(kind = kind.as_str(), scope, fingerprint, "Credential acquired.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (kind, scope, fingerprint);
	}
}

/// Emits a `debug` event when the throttle makes a caller wait.
pub fn trace_throttle_wait(wait: std::time::Duration) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(wait_ms = wait.as_millis() as u64, "Throttle window full; waiting.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = wait;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn events_noop_without_tracing() {
		trace_retry(RetryReason::Server, 1, Duration::milliseconds(100));
		trace_recovery(Some("bq7xz3"), true);
		trace_throttle_wait(std::time::Duration::from_millis(5));
	}

	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = CallSpan::new(CallKind::Api, "instrument_wraps_future");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
