//! Resilient client core for realm-scoped REST APIs: scoped temporary credentials with
//! singleflight acquisition, retry with backoff, and sliding-window self-throttling.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod obs;
pub mod request;
pub mod resilience;
pub mod scope;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::{collections::VecDeque, sync::atomic::AtomicUsize};
	// self
	use crate::{
		auth::{Realm, TokenSecret},
		client::Client,
		config::{AuthConfig, ClientConfig},
		http::{HttpTransport, ResponseHeaders, TransportFuture, TransportRequest, TransportResponse},
	};

	/// Realm used by every test fixture.
	pub const TEST_REALM: &str = "acme.realm.example";

	/// Builds a config pointed at `base_url` with the temp-token strategy and fast retries.
	pub fn test_config(base_url: &str) -> ClientConfig {
		let realm = Realm::new(TEST_REALM).expect("Test realm should be valid.");
		let base_url = Url::parse(base_url).expect("Test base URL should parse.");

		ClientConfig::new(realm, AuthConfig::TempToken {
			user_token: Some(TokenSecret::new("bootstrap-user-token")),
		})
		.with_base_url(base_url)
		.with_initial_delay(Duration::milliseconds(10))
		.with_max_delay(Duration::milliseconds(50))
	}

	/// Builds a reqwest-backed client for `config`.
	#[cfg(feature = "reqwest")]
	pub fn build_reqwest_test_client(config: ClientConfig) -> Client {
		Client::builder(config).build().expect("Test client should build.")
	}

	/// One canned reply served by [`ScriptedTransport`].
	#[derive(Debug)]
	pub enum Scripted {
		/// Respond with the given status, headers, and body.
		Respond {
			/// HTTP status code.
			status: u16,
			/// Response headers.
			headers: Vec<(String, String)>,
			/// Response body.
			body: String,
		},
		/// Fail with a transport timeout.
		Timeout,
	}
	impl Scripted {
		/// JSON reply with no extra headers.
		pub fn json(status: u16, body: impl Into<String>) -> Self {
			Self::Respond { status, headers: Vec::new(), body: body.into() }
		}

		/// Adds a response header.
		pub fn header(mut self, name: &str, value: &str) -> Self {
			if let Self::Respond { headers, .. } = &mut self {
				headers.push((name.to_owned(), value.to_owned()));
			}

			self
		}
	}

	/// In-memory transport that replays scripted replies per path and records every request.
	///
	/// Exchange requests (`/auth/...`) and API requests use separate queues so tests can script
	/// them independently. When a queue runs dry the last reply for that queue is repeated.
	#[derive(Debug, Default)]
	pub struct ScriptedTransport {
		exchange: Mutex<VecDeque<Scripted>>,
		api: Mutex<VecDeque<Scripted>>,
		requests: Mutex<Vec<TransportRequest>>,
		exchange_calls: AtomicUsize,
		api_calls: AtomicUsize,
	}
	impl ScriptedTransport {
		/// Queues a reply for credential exchange endpoints.
		pub fn push_exchange(&self, reply: Scripted) -> &Self {
			self.exchange.lock().push_back(reply);

			self
		}

		/// Queues a reply for API endpoints.
		pub fn push_api(&self, reply: Scripted) -> &Self {
			self.api.lock().push_back(reply);

			self
		}

		/// Number of exchange requests served.
		pub fn exchange_calls(&self) -> usize {
			self.exchange_calls.load(std::sync::atomic::Ordering::SeqCst)
		}

		/// Number of API requests served.
		pub fn api_calls(&self) -> usize {
			self.api_calls.load(std::sync::atomic::Ordering::SeqCst)
		}

		/// Snapshot of every request received so far.
		pub fn requests(&self) -> Vec<TransportRequest> {
			self.requests.lock().clone()
		}

		fn next(queue: &Mutex<VecDeque<Scripted>>) -> Option<Scripted> {
			let mut queue = queue.lock();

			if queue.len() > 1 {
				return queue.pop_front();
			}

			queue.front().map(|reply| match reply {
				Scripted::Respond { status, headers, body } => Scripted::Respond {
					status: *status,
					headers: headers.clone(),
					body: body.clone(),
				},
				Scripted::Timeout => Scripted::Timeout,
			})
		}
	}
	impl HttpTransport for ScriptedTransport {
		fn send(&self, request: TransportRequest) -> TransportFuture<'_> {
			Box::pin(async move {
				let is_exchange = request.url.path().contains("/auth/");
				let reply = if is_exchange {
					self.exchange_calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);

					Self::next(&self.exchange)
				} else {
					self.api_calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);

					Self::next(&self.api)
				};

				self.requests.lock().push(request);

				// Let concurrent callers interleave before the reply lands.
				tokio::task::yield_now().await;

				match reply {
					Some(Scripted::Respond { status, headers, body }) => Ok(TransportResponse {
						status,
						headers: ResponseHeaders::from_pairs(headers),
						body: body.into_bytes(),
					}),
					Some(Scripted::Timeout) => Err(TransportError::timeout(std::io::Error::new(
						std::io::ErrorKind::TimedOut,
						"scripted timeout",
					))),
					None => Ok(TransportResponse {
						status: 500,
						headers: ResponseHeaders::default(),
						body: b"{\"message\":\"No scripted reply.\"}".to_vec(),
					}),
				}
			})
		}
	}

	/// Builds a client over `transport` using [`test_config`].
	pub fn build_scripted_client(transport: Arc<ScriptedTransport>, config: ClientConfig) -> Client {
		let transport: Arc<dyn HttpTransport> = transport;

		Client::builder(config).transport(transport).build().expect("Scripted client should build.")
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::OnceCell;
	pub use parking_lot::Mutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use tokio::time::Instant;
	pub use url::Url;

	pub use crate::error::{ApiFailure, ConfigError, Error, Result, TransportError};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
