//! Minimal request-layer client over a composed configuration.

// crates.io
use oauth2::http::{HeaderMap, Method, Request};
// self
use crate::{
	_prelude::*,
	config::{ClientConfiguration, ResolvedConfiguration},
	error::{TransportError, ValidationError},
	http::{HttpRequest, HttpResponse},
};

/// Sends requests through the composed transport with the composed default headers.
#[derive(Clone, Debug)]
pub struct ApiClient {
	configuration: ResolvedConfiguration,
	default_headers: HeaderMap,
}
impl ApiClient {
	/// Wraps an already composed configuration.
	pub fn new(configuration: ResolvedConfiguration) -> Result<Self> {
		let default_headers = configuration.header_map()?;

		Ok(Self { configuration, default_headers })
	}

	/// Composes `configuration` and wraps the result.
	pub fn from_configuration(configuration: ClientConfiguration) -> Result<Self> {
		Self::new(configuration.compose()?)
	}

	/// Composed configuration in use.
	pub fn configuration(&self) -> &ResolvedConfiguration {
		&self.configuration
	}

	/// Resolves `path` against the API URL.
	pub fn endpoint(&self, path: &str) -> Result<Url> {
		let base = &self.configuration.api_url;

		base.join(path.trim_start_matches('/'))
			.map_err(|_| ValidationError::InvalidApiUrl { url: format!("{base}{path}") }.into())
	}

	/// Builds a request for `path` with the given method and body.
	pub fn request(&self, method: Method, path: &str, body: Vec<u8>) -> Result<HttpRequest> {
		let url = self.endpoint(path)?;

		Request::builder()
			.method(method)
			.uri(url.as_str())
			.body(body)
			.map_err(|e| TransportError::from(e).into())
	}

	/// Applies default headers the request does not already carry and sends it.
	pub async fn send(&self, mut request: HttpRequest) -> Result<HttpResponse> {
		let headers = request.headers_mut();

		for (name, value) in &self.default_headers {
			if !headers.contains_key(name) {
				headers.insert(name.clone(), value.clone());
			}
		}

		self.configuration.transport.execute(request).await
	}
}
