//! OAuth 2.0 client-credentials token source and the token-refreshing transport.
//!
//! [`TokenSource`] exchanges the client id and secret for access tokens through a caller
//! supplied [`Transport`], caches the latest token, and lets at most one exchange run at a time:
//! concurrent callers queue on the cache lock and reuse the token the first caller fetched.
//! [`OAuth2Transport`] attaches that token to every outbound request before handing it to the
//! wrapped transport.

pub use oauth2;

// crates.io
use oauth2::{
	AuthType, ClientId, ClientSecret, EndpointNotSet, EndpointSet, HttpClientError,
	RequestTokenError, Scope, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError, BasicTokenResponse},
	http::{HeaderValue, header::AUTHORIZATION},
};
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, ScopeSet, TokenSecret},
	credentials::{API_TOKEN_HEADER_VALUE_PREFIX, FetchContext},
	error::{TransientError, TransportError},
	http::{
		HttpRequest, HttpResponse, ReqwestTransport, ResponseMetadata, ResponseMetadataSlot,
		SharedTransport, Transport, TransportFuture, TransportHandle, TransportSettings,
	},
	obs::{self, OpKind, OpOutcome, OpSpan},
	retry::RetryParams,
};

type ConfiguredBasicClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Form parameter carrying the requested audience.
pub const AUDIENCE_PARAM: &str = "audience";

/// Parameters of a client-credentials token exchange.
#[derive(Clone, Debug)]
pub struct ClientCredentialsConfig {
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret, sent in the request body.
	pub client_secret: TokenSecret,
	/// Fully qualified token endpoint.
	pub token_url: Url,
	/// Optional `audience` form parameter.
	pub audience: Option<String>,
	/// Scopes requested with every exchange.
	pub scopes: ScopeSet,
	/// Retry budget for transient exchange failures.
	pub retry: RetryParams,
	/// Cancellation and deadline bounding every exchange.
	pub context: FetchContext,
	/// Tokens this close to expiry are replaced before use.
	pub preemptive_window: Duration,
}
impl ClientCredentialsConfig {
	/// Default window before expiry in which cached tokens are replaced.
	pub const DEFAULT_PREEMPTIVE_WINDOW: Duration = Duration::seconds(10);

	/// Creates a configuration with no audience, no scopes, and default retries.
	pub fn new(
		client_id: impl Into<String>,
		client_secret: impl Into<TokenSecret>,
		token_url: Url,
	) -> Self {
		Self {
			client_id: client_id.into(),
			client_secret: client_secret.into(),
			token_url,
			audience: None,
			scopes: ScopeSet::default(),
			retry: RetryParams::default(),
			context: FetchContext::default(),
			preemptive_window: Self::DEFAULT_PREEMPTIVE_WINDOW,
		}
	}

	/// Sets the `audience` form parameter.
	pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
		self.audience = Some(audience.into());

		self
	}

	/// Sets the requested scopes.
	pub fn with_scopes(mut self, scopes: ScopeSet) -> Self {
		self.scopes = scopes;

		self
	}

	/// Overrides the retry budget.
	pub fn with_retry(mut self, retry: RetryParams) -> Self {
		self.retry = retry;

		self
	}

	/// Bounds every exchange with `context`.
	pub fn with_context(mut self, context: FetchContext) -> Self {
		self.context = context;

		self
	}

	/// Overrides the preemptive window; negative values disable early replacement.
	pub fn with_preemptive_window(mut self, window: Duration) -> Self {
		self.preemptive_window = if window.is_negative() { Duration::ZERO } else { window };

		self
	}
}

/// Caching, single-flight source of client-credentials access tokens.
pub struct TokenSource {
	oauth_client: ConfiguredBasicClient,
	transport: SharedTransport,
	audience: Option<String>,
	scopes: ScopeSet,
	retry: RetryParams,
	context: FetchContext,
	preemptive_window: Duration,
	cache: AsyncMutex<Option<AccessToken>>,
}
impl TokenSource {
	/// Creates a source that calls the token endpoint through `transport`.
	pub fn new(config: ClientCredentialsConfig, transport: SharedTransport) -> Self {
		let oauth_client = BasicClient::new(ClientId::new(config.client_id))
			.set_client_secret(ClientSecret::new(config.client_secret.expose().to_owned()))
			.set_auth_type(AuthType::RequestBody)
			.set_token_uri(TokenUrl::from_url(config.token_url));

		Self {
			oauth_client,
			transport,
			audience: config.audience,
			scopes: config.scopes,
			retry: config.retry,
			context: config.context,
			preemptive_window: config.preemptive_window,
			cache: AsyncMutex::new(None),
		}
	}

	/// Returns a usable access token, fetching a new one when the cache is empty or stale.
	///
	/// The cache lock is held for the whole exchange, so concurrent callers wait for the
	/// in-flight fetch instead of starting their own. The fetch context bounds only that wait
	/// and the exchange itself; a fresh cached token is returned even after cancellation.
	pub async fn token(&self) -> Result<AccessToken> {
		let mut cached = match self.cache.try_lock() {
			Some(guard) => guard,
			None => self.context.run(async { Ok(self.cache.lock().await) }).await?,
		};
		let now = OffsetDateTime::now_utc();

		if let Some(token) =
			cached.as_ref().filter(|token| !token.should_refresh(now, self.preemptive_window))
		{
			return Ok(token.clone());
		}

		let token = self.fetch().await?;

		*cached = Some(token.clone());

		Ok(token)
	}

	/// Drops the cached token so the next call fetches a new one.
	pub async fn invalidate(&self) {
		self.cache.lock().await.take();
	}

	async fn fetch(&self) -> Result<AccessToken> {
		const KIND: OpKind = OpKind::TokenFetch;

		let span = OpSpan::new(KIND, "client_credentials");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span.instrument(self.context.run(self.fetch_with_retry())).await;

		obs::record_op_outcome(KIND, OpOutcome::of(&result));

		result
	}

	async fn fetch_with_retry(&self) -> Result<AccessToken> {
		let mut attempt = 0;

		loop {
			match self.fetch_once().await {
				Ok(token) => return Ok(token),
				Err(e) if e.is_retryable() && self.retry.allows(attempt) => {
					let wait = self.retry.backoff(attempt, e.retry_after());

					attempt += 1;

					tokio::time::sleep(wait).await;
				},
				Err(e) => return Err(e),
			}
		}
	}

	async fn fetch_once(&self) -> Result<AccessToken> {
		let meta = ResponseMetadataSlot::default();
		let handle = TransportHandle::new(Arc::clone(&self.transport), meta.clone());
		let mut request = self.oauth_client.exchange_client_credentials();

		for scope in self.scopes.iter() {
			request = request.add_scope(Scope::new(scope.to_owned()));
		}
		if let Some(audience) = &self.audience {
			request = request.add_extra_param(AUDIENCE_PARAM, audience.as_str());
		}

		let response = request
			.request_async(&handle)
			.await
			.map_err(|e| map_request_error(meta.take(), e))?;

		map_token_response(response, OffsetDateTime::now_utc())
	}
}
impl Debug for TokenSource {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenSource")
			.field("token_url", self.oauth_client.token_uri())
			.field("audience", &self.audience)
			.field("scopes", &self.scopes)
			.field("retry", &self.retry)
			.field("preemptive_window", &self.preemptive_window)
			.finish()
	}
}

/// Transport that attaches a client-credentials access token to every request.
///
/// The wrapper carries the timeout, redirect policy, and cookie jar of the transport it wraps;
/// the timeout bounds the token fetch and the wrapped call together.
#[derive(Clone)]
pub struct OAuth2Transport {
	inner: SharedTransport,
	settings: TransportSettings,
	source: Arc<TokenSource>,
}
impl OAuth2Transport {
	/// Wraps a new default transport.
	pub fn new(config: ClientCredentialsConfig) -> Result<Self> {
		let inner = ReqwestTransport::shared(TransportSettings::default())?;

		Ok(Self::wrap(config, inner))
	}

	/// Wraps `base`; token exchanges and authorized requests both go through it.
	pub fn wrap(config: ClientCredentialsConfig, base: SharedTransport) -> Self {
		let settings = TransportSettings::inherit_from(base.settings());
		let source = Arc::new(TokenSource::new(config, Arc::clone(&base)));

		Self { inner: base, settings, source }
	}

	/// Transport receiving the authorized requests.
	pub fn inner(&self) -> &SharedTransport {
		&self.inner
	}

	/// Token source shared by every request sent through this transport.
	pub fn token_source(&self) -> &Arc<TokenSource> {
		&self.source
	}

	async fn authorize_and_send(&self, mut request: HttpRequest) -> Result<HttpResponse> {
		let token = self.source.token().await?;
		let mut value = HeaderValue::from_str(&format!(
			"{API_TOKEN_HEADER_VALUE_PREFIX} {}",
			token.secret.expose()
		))
		.map_err(TransportError::from)?;

		value.set_sensitive(true);
		request.headers_mut().insert(AUTHORIZATION, value);

		self.inner.execute(request).await
	}
}
impl Debug for OAuth2Transport {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuth2Transport")
			.field("settings", &self.settings)
			.field("source", &self.source)
			.finish()
	}
}
impl Transport for OAuth2Transport {
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			match self.settings.timeout {
				Some(timeout) => tokio::time::timeout(timeout, self.authorize_and_send(request))
					.await
					.map_err(|_| Error::from(TransientError::Timeout { timeout }))?,
				None => self.authorize_and_send(request).await,
			}
		})
	}

	fn settings(&self) -> &TransportSettings {
		&self.settings
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FailureKind {
	InvalidGrant,
	InvalidClient,
	InsufficientScope,
	Transient,
}

fn map_token_response(
	response: BasicTokenResponse,
	issued_at: OffsetDateTime,
) -> Result<AccessToken> {
	let invalid = |reason: &str| Error::InvalidTokenResponse { reason: reason.into() };
	let mut builder = AccessToken::builder().issued_at(issued_at);
	let secret = response.access_token().secret();

	if secret.is_empty() {
		return Err(invalid("access_token is empty"));
	}

	builder = builder.access_token(secret.to_owned());

	if let Some(expires_in) = response.expires_in() {
		let expires_in = i64::try_from(expires_in.as_secs())
			.ok()
			.map(Duration::seconds)
			.filter(|delta| issued_at.checked_add(*delta).is_some())
			.ok_or_else(|| invalid("expires_in is out of range"))?;

		if !expires_in.is_positive() {
			return Err(invalid("expires_in must be positive"));
		}

		builder = builder.expires_in(expires_in);
	}

	builder.build().map_err(|e| invalid(&e.to_string()))
}

fn map_request_error(
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<Error>>,
) -> Error {
	let meta = meta.as_ref();

	match err {
		RequestTokenError::ServerResponse(response) => map_server_response_error(response, meta),
		RequestTokenError::Request(error) => map_transport_error(meta, error),
		RequestTokenError::Parse(error, _body) =>
			TransientError::TokenResponseParse { source: error, status: meta_status(meta) }.into(),
		RequestTokenError::Other(message) => TransientError::TokenEndpoint {
			message,
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into(),
	}
}

fn map_server_response_error(
	response: BasicErrorResponse,
	meta: Option<&ResponseMetadata>,
) -> Error {
	let code: &str = response.error().as_ref();
	let description = response.error_description().map(String::as_str);
	let message = match description {
		Some(description) => format!("{code}: {description}"),
		None => code.to_owned(),
	};

	match classify_failure(code, description, meta_status(meta)) {
		FailureKind::InvalidGrant => Error::InvalidGrant { reason: message },
		FailureKind::InvalidClient => Error::InvalidClient { reason: message },
		FailureKind::InsufficientScope => Error::InsufficientScope { reason: message },
		FailureKind::Transient => TransientError::TokenEndpoint {
			message,
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into(),
	}
}

fn map_transport_error(meta: Option<&ResponseMetadata>, err: HttpClientError<Error>) -> Error {
	match err {
		// Errors raised by our own transports travel in the boxed variant.
		HttpClientError::Reqwest(inner) => *inner,
		HttpClientError::Http(inner) => TransportError::Http(inner).into(),
		HttpClientError::Io(inner) => TransportError::Io(inner).into(),
		HttpClientError::Other(message) => TransientError::TokenEndpoint {
			message: format!("HTTP client error occurred while calling the token endpoint: {message}"),
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into(),
		_ => TransientError::TokenEndpoint {
			message: "HTTP client error occurred while calling the token endpoint".into(),
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into(),
	}
}

fn classify_failure(code: &str, description: Option<&str>, status: Option<u16>) -> FailureKind {
	classify_code(code)
		.or_else(|| description.and_then(classify_code))
		.unwrap_or_else(|| classify_status(status))
}

fn classify_code(value: &str) -> Option<FailureKind> {
	let matches = |candidates: &[&str]| candidates.iter().any(|c| value.eq_ignore_ascii_case(c));

	if matches(&["invalid_grant", "access_denied"]) {
		Some(FailureKind::InvalidGrant)
	} else if matches(&["invalid_client", "unauthorized_client"]) {
		Some(FailureKind::InvalidClient)
	} else if matches(&["invalid_scope", "insufficient_scope"]) {
		Some(FailureKind::InsufficientScope)
	} else if matches(&["temporarily_unavailable", "server_error", "slow_down"]) {
		Some(FailureKind::Transient)
	} else {
		None
	}
}

fn classify_status(status: Option<u16>) -> FailureKind {
	match status {
		Some(400 | 404 | 410) => FailureKind::InvalidGrant,
		Some(401) => FailureKind::InvalidClient,
		Some(403) => FailureKind::InsufficientScope,
		_ => FailureKind::Transient,
	}
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

fn meta_retry_after(meta: Option<&ResponseMetadata>) -> Option<Duration> {
	meta.and_then(|value| value.retry_after)
}
