//! Client configuration and the composer that finalizes it for the request layer.

// crates.io
use oauth2::http::{
	HeaderMap, HeaderName, HeaderValue,
	header::{AUTHORIZATION, USER_AGENT},
};
// self
use crate::{
	_prelude::*,
	credentials::{Credentials, Resolution},
	error::{ConstructionError, ValidationError},
	http::{ReqwestTransport, SharedTransport, TransportSettings},
	obs::{self, OpKind, OpOutcome, OpSpan},
	retry::RetryParams,
};

/// `User-Agent` sent when the caller does not provide one.
pub const DEFAULT_USER_AGENT: &str =
	concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Caller-facing client configuration, consumed once by [`ClientConfiguration::compose`].
#[derive(Clone)]
pub struct ClientConfiguration {
	api_url: String,
	transport: Option<SharedTransport>,
	credentials: Option<Credentials>,
	default_headers: Option<HashMap<String, String>>,
	retry: RetryParams,
	user_agent: Option<String>,
}
impl ClientConfiguration {
	/// Starts a configuration for the API served at `api_url`.
	pub fn new(api_url: impl Into<String>) -> Self {
		Self {
			api_url: api_url.into(),
			transport: None,
			credentials: None,
			default_headers: None,
			retry: RetryParams::default(),
			user_agent: None,
		}
	}

	/// Uses the caller's transport as the outbound channel (or as the inner layer of the
	/// token-refreshing transport).
	pub fn with_transport(mut self, transport: SharedTransport) -> Self {
		self.transport = Some(transport);

		self
	}

	/// Authenticates requests with `credentials`.
	pub fn with_credentials(mut self, credentials: Credentials) -> Self {
		self.credentials = Some(credentials);

		self
	}

	/// Adds one default header, replacing an earlier value under the same key.
	pub fn with_default_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		let headers = self.default_headers.get_or_insert_with(HashMap::new);

		merge_header(headers, key.into(), value.into());

		self
	}

	/// Replaces the default header map.
	pub fn with_default_headers(mut self, headers: HashMap<String, String>) -> Self {
		self.default_headers = Some(headers);

		self
	}

	/// Overrides the retry parameters handed to the token-refreshing transport.
	pub fn with_retry_params(mut self, retry: RetryParams) -> Self {
		self.retry = retry;

		self
	}

	/// Overrides the `User-Agent` header.
	pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
		self.user_agent = Some(user_agent.into());

		self
	}

	/// API URL as supplied by the caller.
	pub fn api_url(&self) -> &str {
		&self.api_url
	}

	/// Credentials, if any.
	pub fn credentials(&self) -> Option<&Credentials> {
		self.credentials.as_ref()
	}

	/// Finalizes the configuration.
	///
	/// The API URL is validated first. Without credentials the caller's transport is kept (or a
	/// default one is built); with credentials the resolver decides the transport and its header
	/// overrides win over existing default headers. Every header must be encodable. On success
	/// the transport is always present.
	pub fn compose(self) -> Result<ResolvedConfiguration> {
		const KIND: OpKind = OpKind::Compose;

		let method = self.credentials.as_ref().map_or("none", |c| c.method().as_str());
		let _span = OpSpan::new(KIND, method).entered();

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = self.compose_inner();

		obs::record_op_outcome(KIND, OpOutcome::of(&result));

		result
	}

	fn compose_inner(self) -> Result<ResolvedConfiguration> {
		let api_url = parse_api_url(&self.api_url)?;
		let mut default_headers = self.default_headers.unwrap_or_default();
		let transport = match &self.credentials {
			None => match self.transport {
				Some(transport) => transport,
				None => ReqwestTransport::shared(TransportSettings::default())?,
			},
			Some(credentials) => {
				let Resolution { transport, header_overrides } =
					credentials.resolve(&self.retry, self.transport)?;

				for header in header_overrides {
					merge_header(&mut default_headers, header.key, header.value);
				}

				transport
			},
		};

		if let Some(user_agent) = self.user_agent {
			merge_header(&mut default_headers, USER_AGENT.as_str().to_owned(), user_agent);
		} else if find_key(&default_headers, USER_AGENT.as_str()).is_none() {
			default_headers.insert(USER_AGENT.as_str().to_owned(), DEFAULT_USER_AGENT.to_owned());
		}

		header_map(&default_headers)?;

		Ok(ResolvedConfiguration { api_url, transport, default_headers, retry: self.retry })
	}
}
impl Debug for ClientConfiguration {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientConfiguration")
			.field("api_url", &self.api_url)
			.field("transport_settings", &self.transport.as_ref().map(|t| t.settings()))
			.field("credentials", &self.credentials)
			.field("default_headers", &self.default_headers.as_ref().map(RedactedHeaders))
			.field("retry", &self.retry)
			.field("user_agent", &self.user_agent)
			.finish()
	}
}

/// Finalized configuration handed to the request layer.
#[derive(Clone)]
pub struct ResolvedConfiguration {
	/// Absolute API URL whose path ends with `/`.
	pub api_url: Url,
	/// Outbound transport; never absent.
	pub transport: SharedTransport,
	/// Headers applied to every outbound request.
	pub default_headers: HashMap<String, String>,
	/// Retry parameters in effect.
	pub retry: RetryParams,
}
impl ResolvedConfiguration {
	/// Looks up a default header case-insensitively.
	pub fn default_header(&self, key: &str) -> Option<&str> {
		find_key(&self.default_headers, key).map(|k| self.default_headers[k].as_str())
	}

	/// Converts the default headers into a [`HeaderMap`].
	pub fn header_map(&self) -> Result<HeaderMap, ConstructionError> {
		header_map(&self.default_headers)
	}
}
impl Debug for ResolvedConfiguration {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ResolvedConfiguration")
			.field("api_url", &self.api_url.as_str())
			.field("transport_settings", self.transport.settings())
			.field("default_headers", &RedactedHeaders(&self.default_headers))
			.field("retry", &self.retry)
			.finish()
	}
}

struct RedactedHeaders<'a>(&'a HashMap<String, String>);
impl Debug for RedactedHeaders<'_> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let mut entries = self.0.iter().collect::<Vec<_>>();

		entries.sort();

		f.debug_map()
			.entries(entries.into_iter().map(|(key, value)| {
				let value = if key.eq_ignore_ascii_case(AUTHORIZATION.as_str()) {
					"<redacted>"
				} else {
					value.as_str()
				};

				(key, value)
			}))
			.finish()
	}
}

fn parse_api_url(raw: &str) -> Result<Url, ValidationError> {
	let invalid = || ValidationError::InvalidApiUrl { url: raw.to_owned() };
	let mut url = Url::parse(raw).map_err(|_| invalid())?;

	if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
		return Err(invalid());
	}
	if !url.path().ends_with('/') {
		let path = format!("{}/", url.path());

		url.set_path(&path);
	}

	Ok(url)
}

fn find_key<'a>(headers: &'a HashMap<String, String>, key: &str) -> Option<&'a String> {
	headers.keys().find(|existing| existing.eq_ignore_ascii_case(key))
}

/// Inserts `key`, dropping any entry whose name differs only in case.
fn merge_header(headers: &mut HashMap<String, String>, key: String, value: String) {
	headers.retain(|existing, _| !existing.eq_ignore_ascii_case(&key));
	headers.insert(key, value);
}

pub(crate) fn header_map(
	headers: &HashMap<String, String>,
) -> Result<HeaderMap, ConstructionError> {
	let mut map = HeaderMap::with_capacity(headers.len());

	for (key, value) in headers {
		let invalid = || ConstructionError::InvalidHeader { key: key.clone() };
		let name = HeaderName::from_bytes(key.as_bytes()).map_err(|_| invalid())?;
		let mut value = HeaderValue::from_str(value).map_err(|_| invalid())?;

		if name == AUTHORIZATION {
			value.set_sensitive(true);
		}

		map.insert(name, value);
	}

	Ok(map)
}
