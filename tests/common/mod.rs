#![allow(dead_code)]

// std
use std::{sync::Arc, time::Duration};
// crates.io
use fga_credentials::{
	SharedTransport, Transport, TransportSettings,
	http::{HttpRequest, HttpResponse, TransportFuture},
	oauth::oauth2::http::{HeaderMap, StatusCode},
};
use parking_lot::Mutex;

/// Request observed by [`RecordingTransport`].
#[derive(Clone, Debug)]
pub struct RecordedRequest {
	pub uri: String,
	pub headers: HeaderMap,
	pub body: Vec<u8>,
}
impl RecordedRequest {
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.get(name).and_then(|value| value.to_str().ok())
	}

	pub fn body_text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}
}

/// In-process transport that records requests and answers with a canned response.
pub struct RecordingTransport {
	settings: TransportSettings,
	status: StatusCode,
	body: Vec<u8>,
	delay: Option<Duration>,
	requests: Mutex<Vec<RecordedRequest>>,
}
impl RecordingTransport {
	pub fn new(settings: TransportSettings) -> Arc<Self> {
		Self::responding(settings, StatusCode::OK, b"{}".to_vec())
	}

	pub fn responding(settings: TransportSettings, status: StatusCode, body: Vec<u8>) -> Arc<Self> {
		Arc::new(Self { settings, status, body, delay: None, requests: Mutex::new(Vec::new()) })
	}

	pub fn slow(settings: TransportSettings, delay: Duration) -> Arc<Self> {
		Arc::new(Self {
			settings,
			status: StatusCode::OK,
			body: b"{}".to_vec(),
			delay: Some(delay),
			requests: Mutex::new(Vec::new()),
		})
	}

	pub fn requests(&self) -> Vec<RecordedRequest> {
		self.requests.lock().clone()
	}
}
impl Transport for RecordingTransport {
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			let (parts, body) = request.into_parts();

			self.requests.lock().push(RecordedRequest {
				uri: parts.uri.to_string(),
				headers: parts.headers,
				body,
			});

			if let Some(delay) = self.delay {
				tokio::time::sleep(delay).await;
			}

			let mut response = HttpResponse::new(self.body.clone());

			*response.status_mut() = self.status;
			response
				.headers_mut()
				.insert("content-type", "application/json".parse().expect("Static header is valid."));

			Ok(response)
		})
	}

	fn settings(&self) -> &TransportSettings {
		&self.settings
	}
}

pub fn shared(transport: &Arc<RecordingTransport>) -> SharedTransport {
	transport.clone()
}

pub fn token_body(token: &str, expires_in: Option<u64>) -> String {
	match expires_in {
		Some(secs) => format!(
			"{{\"access_token\":\"{token}\",\"token_type\":\"bearer\",\"expires_in\":{secs}}}"
		),
		None => format!("{{\"access_token\":\"{token}\",\"token_type\":\"bearer\"}}"),
	}
}
