//! Retry state machine for one logical call.
//!
//! Each attempt walks `Authorizing -> Throttled -> InFlight`. A 401 gets exactly one recovery
//! cycle through the strategy; rate limits, 5xx, and transport timeouts back off and retry;
//! everything else is final. Every transport attempt, including the one after a recovery,
//! spends one unit of `max_attempts`. Dropping the returned future stops further attempts.

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::Credential,
	client::{
		Client,
		classify::{self, AttemptContext},
	},
	http::{TransportRequest, TransportResponse},
	obs::{self, CallKind, CallOutcome, CallSpan, RetryReason},
	request::RequestDescription,
	resilience::{self, RateLimitInfo},
	scope,
};

impl Client {
	/// Executes `request`, retrying per the configured policy, and returns the 2xx response.
	pub async fn execute(&self, request: RequestDescription) -> Result<TransportResponse> {
		const KIND: CallKind = CallKind::Api;

		let span = CallSpan::new(KIND, "execute");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let result = span.instrument(self.run(&request)).await;

		match &result {
			Ok(_) => {
				self.metrics.record_success();
				obs::record_call_outcome(KIND, CallOutcome::Success);
			},
			Err(_) => {
				self.metrics.record_failure();
				obs::record_call_outcome(KIND, CallOutcome::Failure);
			},
		}

		result
	}

	/// Executes `request` and deserializes the JSON body of the 2xx response.
	pub async fn execute_json<T>(&self, request: RequestDescription) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let response = self.execute(request).await?;

		response.json().map_err(|e| Error::Decode {
			path: e.path().to_string(),
			source: e.into_inner(),
			correlation: response.headers.correlation(&self.ctx.correlation_headers),
		})
	}

	async fn run(&self, request: &RequestDescription) -> Result<TransportResponse> {
		let scope = scope::extract_scope_key(request);
		let url = request.url(&self.ctx.base_url)?;
		let max_attempts = self.max_attempts.max(1);
		let mut attempt = 0;

		loop {
			attempt += 1;

			let credential = self.auth.token(scope.as_ref()).await?;

			self.throttle.acquire().await;
			self.metrics.record_attempt();

			let transport_request = self.transport_request(request, &url, &credential)?;
			let outcome = match self.ctx.transport.send(transport_request).await {
				Ok(response) => classify::classify_response(response, &AttemptContext {
					method: request.method,
					path: &request.path,
					scope: scope.as_ref(),
					attempt,
					backoff: &self.backoff,
					correlation_headers: &self.ctx.correlation_headers,
				}),
				Err(e) => Err(classify::classify_transport(e)),
			};
			let error = match outcome {
				Ok(response) => return Ok(response),
				Err(error) => error,
			};

			if let Error::RateLimited { info, .. } = &error {
				self.notify_rate_limited(info);
			}
			if attempt >= max_attempts {
				return Err(error);
			}

			match &error {
				Error::Authentication(_) => {
					// Only a rejection of the first attempt is recoverable.
					if attempt > 1 {
						return Err(error);
					}

					self.metrics.record_recovery();

					if !self.auth.handle_rejected(scope.as_ref(), &credential).await {
						return Err(error);
					}

					self.note_retry(RetryReason::Recovery, attempt, Duration::ZERO);
				},
				Error::RateLimited { info, .. } => {
					let delay = info.retry_after;

					self.note_retry(RetryReason::RateLimited, attempt, delay);

					tokio::time::sleep(resilience::to_std(delay)).await;
				},
				Error::Server(_) | Error::Timeout(_) => {
					let reason = RetryReason::of(&error).unwrap_or(RetryReason::Server);
					let delay = resilience::compute_delay(attempt, &self.backoff);

					self.note_retry(reason, attempt, delay);

					tokio::time::sleep(resilience::to_std(delay)).await;
				},
				_ => return Err(error),
			}
		}
	}

	fn transport_request(
		&self,
		request: &RequestDescription,
		url: &Url,
		credential: &Credential,
	) -> Result<TransportRequest, ConfigError> {
		let mut transport_request = self
			.ctx
			.request(request.method, url.clone())
			.with_header("Authorization", self.auth.authorization_header_value(credential));

		if let Some(cookie) = self.auth.session_cookie() {
			transport_request = transport_request.with_header("Cookie", cookie);
		}

		for (name, value) in &request.headers {
			transport_request = transport_request.with_header(name.as_str(), value.as_str());
		}

		match &request.body {
			Some(body) => transport_request.with_json(body),
			None => Ok(transport_request),
		}
	}

	fn notify_rate_limited(&self, info: &RateLimitInfo) {
		self.metrics.record_rate_limited();

		obs::trace_rate_limited(info);

		if let Some(observer) = &self.rate_limit_observer {
			observer(info);
		}
	}

	fn note_retry(&self, reason: RetryReason, attempt: u32, delay: Duration) {
		self.metrics.record_retry();

		obs::record_retry(reason);
		obs::trace_retry(reason, attempt, delay);
	}
}
