mod common;

// std
use std::{sync::Arc, time::Duration};
// crates.io
use fga_credentials::{
	ApiClient, ClientConfiguration, CredentialConfig, CredentialMethod, Credentials,
	FetchContext, ReqwestTransport, RetryParams, TransportSettings,
	credentials::build_token_url,
	error::{Error, TransientError},
	oauth::{ClientCredentialsConfig, OAuth2Transport, TokenSource, oauth2::http::Method},
};
use httpmock::prelude::*;
use tokio_util::sync::CancellationToken;
// self
use common::RecordingTransport;

fn credentials(server: &MockServer, context: FetchContext) -> Credentials {
	Credentials::new(
		CredentialMethod::ClientCredentials,
		CredentialConfig::client_credentials("cid", "sec", server.base_url())
			.with_audience("https://api.fga.example/")
			.with_scopes("read write"),
	)
	.expect("Client credentials should validate.")
	.with_context(context)
}

fn client(server: &MockServer, context: FetchContext) -> ApiClient {
	ApiClient::from_configuration(
		ClientConfiguration::new(server.base_url())
			.with_credentials(credentials(server, context))
			.with_retry_params(RetryParams::disabled()),
	)
	.expect("Client should compose.")
}

fn token_source(server: &MockServer, context: FetchContext) -> Arc<TokenSource> {
	let token_url = build_token_url(&server.base_url()).expect("Mock issuer should normalize.");
	let transport = OAuth2Transport::wrap(
		ClientCredentialsConfig::new("cid", "sec", token_url).with_context(context),
		Arc::new(ReqwestTransport::with_defaults().expect("Transport should build.")),
	);

	Arc::clone(transport.token_source())
}

#[tokio::test]
async fn bearer_token_is_fetched_once_and_attached() {
	let server = MockServer::start_async().await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth/token")
				.form_urlencoded_tuple("grant_type", "client_credentials")
				.form_urlencoded_tuple("client_id", "cid")
				.form_urlencoded_tuple("client_secret", "sec")
				.form_urlencoded_tuple("audience", "https://api.fga.example/")
				.form_urlencoded_tuple("scope", "read write");
			then.status(200)
				.header("content-type", "application/json")
				.body(common::token_body("live-token", Some(3600)));
		})
		.await;
	let api = server
		.mock_async(|when, then| {
			when.method(GET).path("/stores").header("authorization", "Bearer live-token");
			then.status(200).header("content-type", "application/json").body("{}");
		})
		.await;
	let client = client(&server, FetchContext::new());

	for _ in 0..2 {
		let request = client
			.request(Method::GET, "/stores", Vec::new())
			.expect("Request should build.");
		let response = client.send(request).await.expect("Authorized request should succeed.");

		assert_eq!(response.status().as_u16(), 200);
	}

	token.assert_calls_async(1).await;
	api.assert_calls_async(2).await;
}

#[tokio::test]
async fn concurrent_requests_share_one_token_fetch() {
	let server = MockServer::start_async().await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200)
				.header("content-type", "application/json")
				.delay(Duration::from_millis(100))
				.body(common::token_body("shared-token", Some(3600)));
		})
		.await;
	let api = server
		.mock_async(|when, then| {
			when.method(GET).path("/stores").header("authorization", "Bearer shared-token");
			then.status(200).body("{}");
		})
		.await;
	let client = client(&server, FetchContext::new());
	let first = client.request(Method::GET, "stores", Vec::new()).expect("Request should build.");
	let second = client.request(Method::GET, "stores", Vec::new()).expect("Request should build.");
	let (first, second) = tokio::join!(client.send(first), client.send(second));

	first.expect("First concurrent request should succeed.");
	second.expect("Second concurrent request should succeed.");
	token.assert_calls_async(1).await;
	api.assert_calls_async(2).await;
}

#[tokio::test]
async fn invalid_client_is_reported_without_retries() {
	let server = MockServer::start_async().await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(401)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_client\",\"error_description\":\"bad secret\"}");
		})
		.await;
	let client = ApiClient::from_configuration(
		ClientConfiguration::new(server.base_url())
			.with_credentials(credentials(&server, FetchContext::new())),
	)
	.expect("Client should compose.");
	let request = client.request(Method::GET, "stores", Vec::new()).expect("Request should build.");
	let err = client.send(request).await.expect_err("Rejected credentials must fail the request.");

	assert!(matches!(err, Error::InvalidClient { ref reason } if reason.contains("bad secret")));
	token.assert_calls_async(1).await;
}

#[tokio::test]
async fn transient_failures_are_retried() {
	let server = MockServer::start_async().await;
	let failing = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token").form_urlencoded_tuple("client_id", "cid");
			then.status(503)
				.header("content-type", "application/json")
				.body("{\"error\":\"temporarily_unavailable\"}");
		})
		.await;
	let client = ApiClient::from_configuration(
		ClientConfiguration::new(server.base_url())
			.with_credentials(credentials(&server, FetchContext::new()))
			.with_retry_params(RetryParams::new(2, Duration::from_millis(1))),
	)
	.expect("Client should compose.");
	let request = client.request(Method::GET, "stores", Vec::new()).expect("Request should build.");
	let err = client.send(request).await.expect_err("A failing issuer must fail the request.");

	assert!(matches!(err, Error::Transient(TransientError::TokenEndpoint { status: Some(503), .. })));
	failing.assert_calls_async(3).await;
}

#[tokio::test]
async fn cancelled_context_aborts_the_token_fetch() {
	let server = MockServer::start_async().await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(common::token_body("never-used", None));
		})
		.await;
	let cancellation = CancellationToken::new();
	let client = client(&server, FetchContext::new().with_cancellation(cancellation.clone()));

	cancellation.cancel();

	let request = client.request(Method::GET, "stores", Vec::new()).expect("Request should build.");
	let err = client.send(request).await.expect_err("Cancelled fetches must fail the request.");

	assert!(matches!(err, Error::Cancelled));
	token.assert_calls_async(0).await;
}

#[tokio::test]
async fn invalidated_tokens_are_fetched_again() {
	let server = MockServer::start_async().await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(common::token_body("rotating", None));
		})
		.await;
	let source = token_source(&server, FetchContext::new());

	source.token().await.expect("First fetch should succeed.");
	source.token().await.expect("Cached token should be reused.");
	token.assert_calls_async(1).await;

	source.invalidate().await;
	source.token().await.expect("Second fetch should succeed.");
	token.assert_calls_async(2).await;
}

#[tokio::test]
async fn wrapper_timeout_bounds_the_whole_exchange() {
	let slow = RecordingTransport::slow(
		TransportSettings::default().with_timeout(Duration::from_millis(50)),
		Duration::from_millis(500),
	);
	let credentials = Credentials::new(
		CredentialMethod::ClientCredentials,
		CredentialConfig::client_credentials("cid", "sec", "issuer.test"),
	)
	.expect("Client credentials should validate.");
	let client = ApiClient::from_configuration(
		ClientConfiguration::new("https://api.fga.example")
			.with_transport(common::shared(&slow))
			.with_credentials(credentials),
	)
	.expect("Client should compose.");
	let request = client.request(Method::GET, "stores", Vec::new()).expect("Request should build.");
	let err = client.send(request).await.expect_err("A slow issuer must hit the timeout.");

	assert!(matches!(
		err,
		Error::Transient(TransientError::Timeout { timeout }) if timeout == Duration::from_millis(50)
	));

	let recorded = slow.requests();

	assert_eq!(recorded.len(), 1);
	assert_eq!(recorded[0].uri, "https://issuer.test/oauth/token");
	assert!(recorded[0].body_text().contains("grant_type=client_credentials"));
}

#[tokio::test]
async fn cached_token_survives_cancellation() {
	let server = MockServer::start_async().await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(common::token_body("long-lived", Some(3600)));
		})
		.await;
	let cancellation = CancellationToken::new();
	let source =
		token_source(&server, FetchContext::new().with_cancellation(cancellation.clone()));
	let first = source.token().await.expect("First fetch should succeed.");

	cancellation.cancel();

	let second = source.token().await.expect("Fresh cached token must not need the context.");

	assert_eq!(second.secret.expose(), first.secret.expose());
	token.assert_calls_async(1).await;

	source.invalidate().await;

	let err = source.token().await.expect_err("A new fetch must honor the cancellation.");

	assert!(matches!(err, Error::Cancelled));
	token.assert_calls_async(1).await;
}

#[tokio::test]
async fn tokens_inside_the_preemptive_window_are_refreshed() {
	let server = MockServer::start_async().await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(common::token_body("short-lived", Some(5)));
		})
		.await;
	let source = token_source(&server, FetchContext::new());

	source.token().await.expect("First fetch should succeed.");
	source.token().await.expect("Refresh should succeed.");
	token.assert_calls_async(2).await;
}

#[tokio::test]
async fn tokens_outside_the_preemptive_window_are_reused() {
	let server = MockServer::start_async().await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(common::token_body("hour-long", Some(3600)));
		})
		.await;
	let source = token_source(&server, FetchContext::new());

	source.token().await.expect("First fetch should succeed.");
	source.token().await.expect("Cached token should be reused.");
	token.assert_calls_async(1).await;
}
