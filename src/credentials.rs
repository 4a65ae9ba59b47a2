//! Credential methods, their validated configuration, and the credential resolver.
//!
//! [`Credentials`] can only be obtained through validation, either with [`Credentials::new`] or
//! by deserializing `{ "method": ..., "config": { ... } }`. [`Credentials::resolve`] then
//! decides which transport and header overrides the request layer must use:
//!
//! | Method | Transport | Header overrides |
//! |---|---|---|
//! | `none` | caller's transport, or a new default one | none |
//! | `api_token` | caller's transport, or a new default one | `Authorization: Bearer <token>` |
//! | `client_credentials` | new [`OAuth2Transport`] wrapping the caller's (or a default) transport | none |

pub mod context;
pub mod issuer;

pub use context::*;
pub use issuer::*;

// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenSecret},
	error::ValidationError,
	http::{ReqwestTransport, SharedTransport, TransportSettings},
	oauth::{ClientCredentialsConfig, OAuth2Transport},
	obs::{self, OpKind, OpOutcome, OpSpan},
	retry::RetryParams,
};

/// Header carrying credentials on every outbound request.
pub const API_TOKEN_HEADER_KEY: &str = "Authorization";
/// Scheme prefix for bearer credentials; joined to the token with a single space.
pub const API_TOKEN_HEADER_VALUE_PREFIX: &str = "Bearer";

/// Authentication strategy selected by the caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialMethod {
	/// No credentials are attached.
	#[default]
	None,
	/// A static token sent as `Authorization: Bearer <token>`.
	ApiToken,
	/// OAuth 2.0 client-credentials flow; the issued token is attached per request.
	ClientCredentials,
}
impl CredentialMethod {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CredentialMethod::None => "none",
			CredentialMethod::ApiToken => "api_token",
			CredentialMethod::ClientCredentials => "client_credentials",
		}
	}
}
impl Display for CredentialMethod {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Parameters for every credential method; the active method decides which are required.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CredentialConfig {
	/// Static token for [`CredentialMethod::ApiToken`].
	#[serde(skip_serializing_if = "Option::is_none")]
	pub api_token: Option<TokenSecret>,
	/// Token issuer (bare host or URL) for [`CredentialMethod::ClientCredentials`].
	///
	/// Validation replaces it with the normalized token endpoint URL.
	#[serde(rename = "apiTokenIssuer", skip_serializing_if = "Option::is_none")]
	pub token_issuer: Option<String>,
	/// Optional `audience` parameter sent to the token endpoint.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub api_audience: Option<String>,
	/// OAuth client identifier.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub client_id: Option<String>,
	/// OAuth client secret.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub client_secret: Option<TokenSecret>,
	/// Space-separated scopes requested from the token endpoint.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub scopes: Option<String>,
}
impl CredentialConfig {
	/// Configuration for [`CredentialMethod::ApiToken`].
	pub fn api_token(token: impl Into<TokenSecret>) -> Self {
		Self { api_token: Some(token.into()), ..Default::default() }
	}

	/// Configuration for [`CredentialMethod::ClientCredentials`].
	pub fn client_credentials(
		client_id: impl Into<String>,
		client_secret: impl Into<TokenSecret>,
		token_issuer: impl Into<String>,
	) -> Self {
		Self {
			client_id: Some(client_id.into()),
			client_secret: Some(client_secret.into()),
			token_issuer: Some(token_issuer.into()),
			..Default::default()
		}
	}

	/// Sets the `audience` parameter.
	pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
		self.api_audience = Some(audience.into());

		self
	}

	/// Sets the space-separated scope string.
	pub fn with_scopes(mut self, scopes: impl Into<String>) -> Self {
		self.scopes = Some(scopes.into());

		self
	}
}

/// A single header merged into the default outbound headers.
#[derive(Clone, PartialEq, Eq)]
pub struct HeaderOverride {
	/// Header name.
	pub key: String,
	/// Header value.
	pub value: String,
}
impl HeaderOverride {
	/// Creates a new override.
	pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
		Self { key: key.into(), value: value.into() }
	}

	/// Builds the `Authorization: Bearer <token>` override.
	pub fn bearer(token: &TokenSecret) -> Self {
		Self::new(
			API_TOKEN_HEADER_KEY,
			format!("{API_TOKEN_HEADER_VALUE_PREFIX} {}", token.expose()),
		)
	}
}
impl Debug for HeaderOverride {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let value = if self.key.eq_ignore_ascii_case(API_TOKEN_HEADER_KEY) {
			"<redacted>"
		} else {
			self.value.as_str()
		};

		f.debug_struct("HeaderOverride").field("key", &self.key).field("value", &value).finish()
	}
}

/// Outcome of [`Credentials::resolve`].
#[derive(Clone)]
pub struct Resolution {
	/// Transport the request layer must install.
	pub transport: SharedTransport,
	/// Headers to merge into the default headers.
	pub header_overrides: Vec<HeaderOverride>,
}
impl Debug for Resolution {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Resolution")
			.field("transport_settings", self.transport.settings())
			.field("header_overrides", &self.header_overrides)
			.finish()
	}
}

/// Validated credential method, configuration, and token-fetch context.
///
/// Values only exist once validation succeeded; they are never re-validated.
#[derive(Clone, Deserialize)]
#[serde(try_from = "CredentialsDef")]
pub struct Credentials {
	method: CredentialMethod,
	config: CredentialConfig,
	context: FetchContext,
	grant: Grant,
}
impl Credentials {
	/// Validates `config` against `method`.
	///
	/// For [`CredentialMethod::ClientCredentials`] the issuer is normalized into a token
	/// endpoint URL and stored back into the configuration.
	pub fn new(
		method: CredentialMethod,
		mut config: CredentialConfig,
	) -> Result<Self, ValidationError> {
		let grant = match method {
			CredentialMethod::None => Grant::None,
			CredentialMethod::ApiToken => match config.api_token.as_ref().filter(|t| !t.is_empty()) {
				Some(token) => Grant::ApiToken(token.clone()),
				None => return Err(ValidationError::MissingApiToken),
			},
			CredentialMethod::ClientCredentials => {
				let grant = ClientCredentialsGrant::validate(&config)?;

				config.token_issuer = Some(grant.token_url.to_string());

				Grant::ClientCredentials(grant)
			},
		};

		Ok(Self { method, config, context: FetchContext::default(), grant })
	}

	/// Credentials that attach nothing.
	pub fn none() -> Self {
		Self {
			method: CredentialMethod::None,
			config: CredentialConfig::default(),
			context: FetchContext::default(),
			grant: Grant::None,
		}
	}

	/// Validated [`CredentialMethod::ApiToken`] credentials.
	pub fn api_token(token: impl Into<TokenSecret>) -> Result<Self, ValidationError> {
		Self::new(CredentialMethod::ApiToken, CredentialConfig::api_token(token))
	}

	/// Attaches the context that bounds token fetches.
	pub fn with_context(mut self, context: FetchContext) -> Self {
		self.context = context;

		self
	}

	/// Active credential method.
	pub fn method(&self) -> CredentialMethod {
		self.method
	}

	/// Validated configuration (with the normalized token endpoint, if any).
	pub fn config(&self) -> &CredentialConfig {
		&self.config
	}

	/// Context that bounds token fetches.
	pub fn context(&self) -> &FetchContext {
		&self.context
	}

	/// The `Authorization` override for [`CredentialMethod::ApiToken`], otherwise `None`.
	pub fn api_token_header(&self) -> Option<HeaderOverride> {
		match &self.grant {
			Grant::ApiToken(token) => Some(HeaderOverride::bearer(token)),
			Grant::None | Grant::ClientCredentials(_) => None,
		}
	}

	/// Decides the final transport and header overrides for these credentials.
	///
	/// `base` is the caller's transport, if any. Static tokens never replace it; the
	/// client-credentials method always wraps it (or a new default transport) in an
	/// [`OAuth2Transport`] that carries the base's timeout, redirect policy, and cookie jar.
	/// No network I/O happens here.
	pub fn resolve(&self, retry: &RetryParams, base: Option<SharedTransport>) -> Result<Resolution> {
		const KIND: OpKind = OpKind::Resolve;

		let _span = OpSpan::new(KIND, self.method.as_str()).entered();

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = match &self.grant {
			Grant::None => transport_or_default(base)
				.map(|transport| Resolution { transport, header_overrides: Vec::new() }),
			Grant::ApiToken(token) => transport_or_default(base).map(|transport| Resolution {
				transport,
				header_overrides: vec![HeaderOverride::bearer(token)],
			}),
			Grant::ClientCredentials(grant) => {
				let config = grant.to_config(*retry, self.context.clone());
				let transport = match base {
					Some(base) => Ok(OAuth2Transport::wrap(config, base)),
					None => OAuth2Transport::new(config),
				};

				transport.map(|transport| Resolution {
					transport: Arc::new(transport),
					header_overrides: Vec::new(),
				})
			},
		};

		obs::record_op_outcome(KIND, OpOutcome::of(&result));

		result
	}
}
impl Debug for Credentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credentials")
			.field("method", &self.method)
			.field("config", &self.config)
			.field("context", &self.context)
			.finish()
	}
}
impl TryFrom<CredentialsDef> for Credentials {
	type Error = ValidationError;

	fn try_from(def: CredentialsDef) -> Result<Self, Self::Error> {
		Self::new(def.method, def.config.unwrap_or_default())
	}
}

#[derive(Deserialize)]
struct CredentialsDef {
	#[serde(default)]
	method: CredentialMethod,
	#[serde(default)]
	config: Option<CredentialConfig>,
}

#[derive(Clone)]
enum Grant {
	None,
	ApiToken(TokenSecret),
	ClientCredentials(ClientCredentialsGrant),
}

#[derive(Clone)]
struct ClientCredentialsGrant {
	client_id: String,
	client_secret: TokenSecret,
	token_url: Url,
	audience: Option<String>,
	scopes: ScopeSet,
}
impl ClientCredentialsGrant {
	fn validate(config: &CredentialConfig) -> Result<Self, ValidationError> {
		let (Some(client_id), Some(client_secret), Some(issuer)) = (
			non_empty(config.client_id.as_deref()),
			config.client_secret.as_ref().filter(|s| !s.is_empty()),
			non_empty(config.token_issuer.as_deref()),
		) else {
			return Err(ValidationError::MissingClientCredentialsFields);
		};
		let token_url = build_token_url(issuer)?;
		let scopes = match non_empty(config.scopes.as_deref().map(str::trim)) {
			Some(scopes) => ScopeSet::from_str(scopes)?,
			None => ScopeSet::default(),
		};

		Ok(Self {
			client_id: client_id.to_owned(),
			client_secret: client_secret.clone(),
			token_url,
			audience: non_empty(config.api_audience.as_deref()).map(str::to_owned),
			scopes,
		})
	}

	fn to_config(&self, retry: RetryParams, context: FetchContext) -> ClientCredentialsConfig {
		let mut config = ClientCredentialsConfig::new(
			self.client_id.clone(),
			self.client_secret.clone(),
			self.token_url.clone(),
		)
		.with_scopes(self.scopes.clone())
		.with_retry(retry)
		.with_context(context);

		if let Some(audience) = &self.audience {
			config = config.with_audience(audience.clone());
		}

		config
	}
}

fn non_empty(value: Option<&str>) -> Option<&str> {
	value.filter(|v| !v.is_empty())
}

fn transport_or_default(base: Option<SharedTransport>) -> Result<SharedTransport> {
	match base {
		Some(base) => Ok(base),
		None => ReqwestTransport::shared(TransportSettings::default()),
	}
}
