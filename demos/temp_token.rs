//! Demonstrates the temp-token strategy against a mock realm. Three listings of the same table
//! share one token exchange, and each response is decoded into typed fields.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde::Deserialize;
use time::Duration;
use url::Url;
// self
use realm_client::{
	auth::{Realm, TokenSecret},
	client::Client,
	config::{AuthConfig, ClientConfig, ThrottlePolicy},
	request::RequestDescription,
};

#[derive(Debug, Deserialize)]
struct Field {
	id: u32,
	label: String,
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let exchange = server
		.mock_async(|when, then| {
			when.method(GET).path("/auth/temporaryToken/bq7xz3");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"temporaryAuthorization":"tmp-demo","expiresIn":290}"#);
		})
		.await;
	let fields = server
		.mock_async(|when, then| {
			when.method(GET).path("/fields").query_param("tableId", "bq7xz3");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"[{"id":3,"label":"Record ID#"},{"id":6,"label":"Status"}]"#);
		})
		.await;
	let config = ClientConfig::new(Realm::new("demo.realm.example")?, AuthConfig::TempToken {
		user_token: Some(TokenSecret::new("demo-user-token")),
	})
	.with_base_url(Url::parse(&server.base_url())?)
	.with_max_attempts(4)
	.with_initial_delay(Duration::milliseconds(200))
	.with_throttle(ThrottlePolicy::sliding_window(100, 10));
	let client = Client::builder(config)
		.rate_limit_observer(|info| {
			println!("rate limited on {} {}, retrying in {}", info.method, info.path, info.retry_after);
		})
		.build()?;

	for _ in 0..3 {
		let listed = client
			.execute_json::<Vec<Field>>(RequestDescription::get("/fields").with_query("tableId", "bq7xz3"))
			.await?;

		for field in &listed {
			println!("field {}: {}", field.id, field.label);
		}
	}

	exchange.assert_calls_async(1).await;
	fields.assert_calls_async(3).await;

	let metrics = client.metrics();

	println!(
		"attempts={} retries={} successes={} throttle_remaining={}",
		metrics.attempts(),
		metrics.retries(),
		metrics.successes(),
		client.throttle().remaining()
	);

	Ok(())
}
