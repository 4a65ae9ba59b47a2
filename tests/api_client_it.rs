mod common;

// crates.io
use fga_credentials::{
	ApiClient, ClientConfiguration, Credentials, TransportSettings,
	oauth::oauth2::http::{HeaderValue, Method, header::AUTHORIZATION},
};
// self
use common::RecordingTransport;

#[tokio::test]
async fn default_headers_fill_in_without_clobbering() {
	let transport = RecordingTransport::new(TransportSettings::default());
	let credentials = Credentials::api_token("tok").expect("Token credentials should validate.");
	let client = ApiClient::from_configuration(
		ClientConfiguration::new("https://api.fga.example/v1")
			.with_transport(common::shared(&transport))
			.with_credentials(credentials)
			.with_default_header("X-Tenant", "acme"),
	)
	.expect("Client should compose.");
	let plain = client
		.request(Method::POST, "stores", b"{}".to_vec())
		.expect("Request should build.");
	let mut overridden =
		client.request(Method::GET, "/stores/01", Vec::new()).expect("Request should build.");

	overridden.headers_mut().insert(AUTHORIZATION, HeaderValue::from_static("Bearer per-call"));

	client.send(plain).await.expect("Plain request should succeed.");
	client.send(overridden).await.expect("Overridden request should succeed.");

	let recorded = transport.requests();

	assert_eq!(recorded.len(), 2);
	assert_eq!(recorded[0].uri, "https://api.fga.example/v1/stores");
	assert_eq!(recorded[0].header("authorization"), Some("Bearer tok"));
	assert_eq!(recorded[0].header("x-tenant"), Some("acme"));
	assert!(recorded[0].header("user-agent").is_some_and(|ua| ua.starts_with("fga-credentials/")));
	assert_eq!(recorded[0].body, b"{}");
	assert_eq!(recorded[1].uri, "https://api.fga.example/v1/stores/01");
	assert_eq!(recorded[1].header("authorization"), Some("Bearer per-call"));
}

#[tokio::test]
async fn serde_loaded_credentials_drive_the_client() {
	let transport = RecordingTransport::new(TransportSettings::default());
	let credentials: Credentials =
		serde_json::from_str(r#"{"method":"api_token","config":{"apiToken":"from-json"}}"#)
			.expect("JSON credentials should deserialize.");
	let client = ApiClient::from_configuration(
		ClientConfiguration::new("http://localhost:8080")
			.with_transport(common::shared(&transport))
			.with_credentials(credentials),
	)
	.expect("Client should compose.");
	let endpoint = client.endpoint("stores").expect("Endpoint should resolve.");

	assert_eq!(endpoint.as_str(), "http://localhost:8080/stores");

	let request = client.request(Method::GET, "stores", Vec::new()).expect("Request should build.");

	client.send(request).await.expect("Request should succeed.");

	assert_eq!(transport.requests()[0].header("authorization"), Some("Bearer from-json"));
}

#[test]
fn malformed_json_credentials_are_rejected() {
	let err = serde_json::from_str::<Credentials>(
		r#"{"method":"client_credentials","config":{"clientId":"cid","apiTokenIssuer":"issuer.test"}}"#,
	)
	.expect_err("Incomplete client credentials must fail to deserialize.");

	assert!(err.to_string().contains("client_secret"));
}
