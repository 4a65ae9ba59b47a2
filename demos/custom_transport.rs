//! Demonstrates composing client configurations over a caller-supplied transport.
//!
//! 1. Implement [`Transport`] for your HTTP stack and report its [`TransportSettings`].
//! 2. Pass the transport and [`Credentials`] to [`ClientConfiguration`].
//! 3. Compose: static API tokens keep your transport, client credentials wrap it and keep its
//!    timeout, redirect policy, and cookie jar.
//!
//! The transport below answers token and API requests in-process, so the demo needs no network.

// std
use std::{sync::Arc, time::Duration};
// crates.io
use color_eyre::Result;
// self
use fga_credentials::{
	ApiClient, ClientConfiguration, CredentialConfig, CredentialMethod, Credentials,
	SharedTransport, Transport, TransportSettings,
	http::{HttpRequest, HttpResponse, TransportFuture},
	oauth::oauth2::http::{
		HeaderValue, Method, StatusCode,
		header::{AUTHORIZATION, CONTENT_TYPE},
	},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let custom: SharedTransport = Arc::new(InProcessTransport {
		settings: TransportSettings::default().with_timeout(Duration::from_secs(30)),
	});

	println!("=== Client credentials only ===");

	let resolved = ClientConfiguration::new("http://localhost:8080")
		.with_credentials(client_credentials()?)
		.compose()?;

	println!("transport settings: {:?}", resolved.transport.settings());

	println!("\n=== Custom transport + client credentials ===");

	let client = ApiClient::from_configuration(
		ClientConfiguration::new("http://localhost:8080")
			.with_transport(Arc::clone(&custom))
			.with_credentials(client_credentials()?),
	)?;
	let transport = &client.configuration().transport;

	println!("wrapped: {}", !Arc::ptr_eq(transport, &custom));
	println!("timeout kept: {:?}", transport.settings().timeout);

	let response = client.send(client.request(Method::GET, "stores", Vec::new())?).await?;

	println!("response: {}", String::from_utf8_lossy(response.body()));

	println!("\n=== Custom transport only ===");

	let resolved = ClientConfiguration::new("http://localhost:8080")
		.with_transport(Arc::clone(&custom))
		.compose()?;

	println!("same transport: {}", Arc::ptr_eq(&resolved.transport, &custom));

	println!("\n=== API token + custom transport ===");

	let resolved = ClientConfiguration::new("http://localhost:8080")
		.with_transport(Arc::clone(&custom))
		.with_credentials(Credentials::api_token("some-api-token")?)
		.compose()?;

	println!("same transport: {}", Arc::ptr_eq(&resolved.transport, &custom));
	println!("authorization header set: {}", resolved.default_header("Authorization").is_some());

	Ok(())
}

fn client_credentials() -> Result<Credentials> {
	Ok(Credentials::new(
		CredentialMethod::ClientCredentials,
		CredentialConfig::client_credentials(
			"some-client-id",
			"some-client-secret",
			"issuer.fga.example",
		)
		.with_audience("https://api.fga.example/"),
	)?)
}

/// Answers token requests with a fixed token and echoes the `Authorization` header otherwise.
struct InProcessTransport {
	settings: TransportSettings,
}
impl Transport for InProcessTransport {
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			let body = if request.uri().path().ends_with("/oauth/token") {
				"{\"access_token\":\"demo-token\",\"token_type\":\"bearer\",\"expires_in\":3600}"
					.to_owned()
			} else {
				let authorization = request
					.headers()
					.get(AUTHORIZATION)
					.and_then(|value| value.to_str().ok())
					.unwrap_or("<none>");

				format!("{{\"seen_authorization\":\"{authorization}\"}}")
			};
			let mut response = HttpResponse::new(body.into_bytes());

			*response.status_mut() = StatusCode::OK;
			response
				.headers_mut()
				.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

			Ok(response)
		})
	}

	fn settings(&self) -> &TransportSettings {
		&self.settings
	}
}
