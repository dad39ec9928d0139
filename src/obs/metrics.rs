// self
use crate::obs::{CallKind, CallOutcome, RetryReason};

/// Records a call outcome via the global metrics recorder (when enabled).
pub fn record_call_outcome(kind: CallKind, outcome: CallOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"realm_client_call_total",
			"kind" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Records a scheduled retry via the global metrics recorder (when enabled).
pub fn record_retry(reason: RetryReason) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("realm_client_retry_total", "reason" => reason.as_str()).increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = reason;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recorders_noop_without_metrics() {
		record_call_outcome(CallKind::TempTokenExchange, CallOutcome::Failure);
		record_retry(RetryReason::RateLimited);
	}
}
