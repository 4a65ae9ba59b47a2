//! Crate-level error types shared by validation, transport construction, and token fetches.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn StdError + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Credential or client configuration failed validation.
	#[error(transparent)]
	Validation(#[from] ValidationError),
	/// A transport could not be built or wrapped.
	#[error(transparent)]
	Construction(#[from] ConstructionError),
	/// Temporary upstream failure; retry with backoff.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Token endpoint rejected the requested scopes.
	#[error("Token endpoint rejected the requested scopes: {reason}.")]
	InsufficientScope {
		/// Issuer-supplied reason string.
		reason: String,
	},
	/// Token endpoint rejected the grant.
	#[error("Token endpoint rejected the grant: {reason}.")]
	InvalidGrant {
		/// Issuer-supplied reason string.
		reason: String,
	},
	/// Client authentication failed or credentials are malformed.
	#[error("Client authentication failed: {reason}.")]
	InvalidClient {
		/// Issuer-supplied reason string.
		reason: String,
	},
	/// Token endpoint answered successfully but the token cannot be used.
	#[error("Token endpoint returned an unusable token: {reason}.")]
	InvalidTokenResponse {
		/// Why the token was rejected.
		reason: String,
	},
	/// The caller cancelled the token fetch.
	#[error("Token fetch was cancelled.")]
	Cancelled,
}
impl Error {
	/// Returns `true` when retrying the same call may succeed.
	pub fn is_retryable(&self) -> bool {
		match self {
			Self::Transient(TransientError::DeadlineExceeded) => false,
			Self::Transient(_) => true,
			Self::Transport(TransportError::Network { .. } | TransportError::Io(_)) => true,
			_ => false,
		}
	}

	/// Retry-After hint carried by the error, if any.
	pub fn retry_after(&self) -> Option<Duration> {
		match self {
			Self::Transient(TransientError::TokenEndpoint { retry_after, .. }) => *retry_after,
			_ => None,
		}
	}
}

/// Configuration validation failures, raised before any network code runs.
#[derive(Debug, ThisError)]
pub enum ValidationError {
	/// The `api_token` method was selected without a token.
	#[error(
		"CredentialConfig.api_token is required when the credential method is `api_token`."
	)]
	MissingApiToken,
	/// The `client_credentials` method was selected without id, secret, or issuer.
	#[error(
		"All of CredentialConfig.client_id, CredentialConfig.client_secret and CredentialConfig.token_issuer are required when the credential method is `client_credentials`."
	)]
	MissingClientCredentialsFields,
	/// The token issuer cannot be parsed as a URL.
	#[error("Token issuer `{issuer}` is not a valid URL.")]
	InvalidIssuerUrl {
		/// Issuer as supplied by the caller.
		issuer: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// The token issuer uses a scheme other than `http` or `https`.
	#[error("Invalid issuer scheme `{scheme}` (must be http or https).")]
	UnsupportedScheme {
		/// Offending scheme.
		scheme: String,
	},
	/// The configured scopes cannot be normalized.
	#[error("Configured scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
	/// The API URL is unparseable or not HTTP(S).
	#[error("API URL `{url}` must be an absolute http or https URL.")]
	InvalidApiUrl {
		/// URL as supplied by the caller.
		url: String,
	},
}

/// Failures while building or wrapping a transport.
#[derive(Debug, ThisError)]
pub enum ConstructionError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// A header override cannot be encoded as an HTTP header.
	#[error("Header `{key}` cannot be encoded as an HTTP header.")]
	InvalidHeader {
		/// Offending header name.
		key: String,
	},
}
impl ConstructionError {
	/// Wraps a transport's builder failure inside [`ConstructionError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConstructionError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary failure variants (safe to retry, except for an elapsed deadline).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Token endpoint returned an unexpected but non-fatal response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// The transport's timeout elapsed before the exchange completed.
	#[error("Request timed out after {timeout:?}.")]
	Timeout {
		/// Timeout that elapsed.
		timeout: StdDuration,
	},
	/// The fetch context's deadline elapsed before a token was issued.
	#[error("Token fetch deadline exceeded.")]
	DeadlineExceeded,
}

/// Transport-level failures (network, IO, request assembly).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while sending the request.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while sending the request.")]
	Io(#[from] std::io::Error),
	/// The request could not be assembled.
	#[error(transparent)]
	Http(#[from] oauth2::http::Error),
	/// The access token cannot be encoded into an `Authorization` header.
	#[error("Access token cannot be encoded into an Authorization header.")]
	InvalidToken(#[from] oauth2::http::header::InvalidHeaderValue),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
