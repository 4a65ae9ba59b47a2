//! Transport primitives shared by the request layer and the token-refreshing transport.
//!
//! The module exposes [`Transport`], the crate's only dependency on an HTTP stack, together
//! with [`TransportSettings`] (the caller-level behavior a transport carries: timeout, redirect
//! policy, cookie jar) and [`ReqwestTransport`], the default reqwest-backed implementation.
//! [`ResponseMetadata`] and [`ResponseMetadataSlot`] let token exchanges classify failures with
//! the HTTP status and `Retry-After` hint of the most recent response.

pub use oauth2::{HttpRequest, HttpResponse};

// crates.io
use oauth2::{
	AsyncHttpClient, HttpClientError,
	http::{HeaderMap, header::RETRY_AFTER},
};
use reqwest::{
	cookie::Jar,
	redirect::{Action, Attempt, Policy},
};
use time::format_description::well_known::Rfc2822;
// self
use crate::{
	_prelude::*,
	error::{ConstructionError, TransientError, TransportError},
};

/// Boxed future returned by [`Transport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<HttpResponse>> + 'a + Send + Sync>>;

/// Reference-counted transport handle installed as the SDK's outbound channel.
///
/// Identity matters: composing a configuration either hands back the caller's `Arc` untouched
/// or a new one that wraps it, and [`Arc::ptr_eq`] tells the two apart.
pub type SharedTransport = Arc<dyn Transport>;

/// Abstraction over HTTP transports capable of sending a request and returning its response.
///
/// Implementations must be `Send + Sync + 'static` so a single handle can be shared by every
/// request issued through a client. The futures they return must be `Send + Sync` because token
/// exchanges drive them through `oauth2`'s async client contract.
pub trait Transport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and resolves to the full response (status, headers, body).
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_>;

	/// Caller-level behavior this transport was configured with.
	fn settings(&self) -> &TransportSettings;
}

/// Custom redirect hook accepted by [`RedirectPolicy::Custom`].
pub type RedirectHook = Arc<dyn Fn(Attempt) -> Action + Send + Sync>;

/// Redirect behavior carried by a transport.
#[derive(Clone, Default)]
pub enum RedirectPolicy {
	/// The HTTP client's default (follow up to ten redirects).
	#[default]
	Default,
	/// Never follow redirects.
	None,
	/// Follow at most the given number of redirects.
	Limited(usize),
	/// Decide each redirect with a caller-supplied hook.
	Custom(RedirectHook),
}
impl RedirectPolicy {
	/// Wraps a closure as a [`RedirectPolicy::Custom`] policy.
	pub fn custom<F>(hook: F) -> Self
	where
		F: 'static + Fn(Attempt) -> Action + Send + Sync,
	{
		Self::Custom(Arc::new(hook))
	}

	/// Returns `true` for [`RedirectPolicy::Default`].
	pub fn is_default(&self) -> bool {
		matches!(self, Self::Default)
	}

	/// Builds the equivalent reqwest redirect policy.
	pub fn to_reqwest(&self) -> Policy {
		match self {
			Self::Default => Policy::default(),
			Self::None => Policy::none(),
			Self::Limited(max) => Policy::limited(*max),
			Self::Custom(hook) => {
				let hook = Arc::clone(hook);

				Policy::custom(move |attempt| hook(attempt))
			},
		}
	}
}
impl PartialEq for RedirectPolicy {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Self::Default, Self::Default) | (Self::None, Self::None) => true,
			(Self::Limited(lhs), Self::Limited(rhs)) => lhs == rhs,
			(Self::Custom(lhs), Self::Custom(rhs)) => Arc::ptr_eq(lhs, rhs),
			_ => false,
		}
	}
}
impl Debug for RedirectPolicy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Default => f.write_str("Default"),
			Self::None => f.write_str("None"),
			Self::Limited(max) => f.debug_tuple("Limited").field(max).finish(),
			Self::Custom(_) => f.write_str("Custom(..)"),
		}
	}
}

/// Caller-level behavior a transport carries and a wrapping transport must preserve.
#[derive(Clone, Default)]
pub struct TransportSettings {
	/// Whole-request timeout; `None` waits indefinitely.
	pub timeout: Option<StdDuration>,
	/// Redirect behavior.
	pub redirect: RedirectPolicy,
	/// Cookie jar shared with every request, if any.
	pub cookie_jar: Option<Arc<Jar>>,
}
impl TransportSettings {
	/// Sets the whole-request timeout; a zero duration means no timeout.
	pub fn with_timeout(mut self, timeout: StdDuration) -> Self {
		self.timeout = if timeout.is_zero() { None } else { Some(timeout) };

		self
	}

	/// Sets the redirect policy.
	pub fn with_redirect(mut self, redirect: RedirectPolicy) -> Self {
		self.redirect = redirect;

		self
	}

	/// Shares a cookie jar with every request.
	pub fn with_cookie_jar(mut self, jar: Arc<Jar>) -> Self {
		self.cookie_jar = Some(jar);

		self
	}

	/// Returns `true` when no setting differs from its default.
	pub fn is_default(&self) -> bool {
		self.timeout.is_none() && self.redirect.is_default() && self.cookie_jar.is_none()
	}

	/// Copies the settings a wrapping transport must carry forward from `base`.
	///
	/// Exactly three settings survive wrapping (timeout, redirect policy, cookie jar), and each
	/// only when it differs from its default on `base`.
	pub fn inherit_from(base: &TransportSettings) -> Self {
		let mut settings = Self::default();

		if base.timeout.is_some() {
			settings.timeout = base.timeout;
		}
		if !base.redirect.is_default() {
			settings.redirect = base.redirect.clone();
		}
		if let Some(jar) = &base.cookie_jar {
			settings.cookie_jar = Some(Arc::clone(jar));
		}

		settings
	}

	fn apply(&self, mut builder: reqwest::ClientBuilder) -> reqwest::ClientBuilder {
		if let Some(timeout) = self.timeout {
			builder = builder.timeout(timeout);
		}
		if let Some(jar) = &self.cookie_jar {
			builder = builder.cookie_provider(Arc::clone(jar));
		}

		builder.redirect(self.redirect.to_reqwest())
	}
}
impl PartialEq for TransportSettings {
	fn eq(&self, other: &Self) -> bool {
		let same_jar = match (&self.cookie_jar, &other.cookie_jar) {
			(None, None) => true,
			(Some(lhs), Some(rhs)) => Arc::ptr_eq(lhs, rhs),
			_ => false,
		};

		self.timeout == other.timeout && self.redirect == other.redirect && same_jar
	}
}
impl Debug for TransportSettings {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TransportSettings")
			.field("timeout", &self.timeout)
			.field("redirect", &self.redirect)
			.field("cookie_jar_set", &self.cookie_jar.is_some())
			.finish()
	}
}

/// Default transport backed by a [`ReqwestClient`] built from [`TransportSettings`].
#[derive(Clone)]
pub struct ReqwestTransport {
	client: ReqwestClient,
	settings: TransportSettings,
}
impl ReqwestTransport {
	/// Builds a reqwest client that honors `settings`.
	pub fn new(settings: TransportSettings) -> Result<Self> {
		let client = settings.apply(ReqwestClient::builder()).build().map_err(ConstructionError::from)?;

		Ok(Self { client, settings })
	}

	/// Builds a transport with default settings.
	pub fn with_defaults() -> Result<Self> {
		Self::new(TransportSettings::default())
	}

	/// Builds a transport from `settings` and returns it as a [`SharedTransport`].
	pub fn shared(settings: TransportSettings) -> Result<SharedTransport> {
		Ok(Arc::new(Self::new(settings)?))
	}
}
impl Debug for ReqwestTransport {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ReqwestTransport").field("settings", &self.settings).finish()
	}
}
impl Transport for ReqwestTransport {
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			let request = reqwest::Request::try_from(request).map_err(TransportError::from)?;
			let response =
				self.client.execute(request).await.map_err(|e| self.map_send_error(e))?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body = response.bytes().await.map_err(|e| self.map_send_error(e))?;
			let mut response_new = HttpResponse::new(body.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}

	fn settings(&self) -> &TransportSettings {
		&self.settings
	}
}
impl ReqwestTransport {
	fn map_send_error(&self, err: ReqwestError) -> Error {
		match self.settings.timeout {
			Some(timeout) if err.is_timeout() => TransientError::Timeout { timeout }.into(),
			_ => TransportError::from(err).into(),
		}
	}
}

/// Captures metadata from the most recent HTTP response for downstream error mapping.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseMetadata {
	/// HTTP status code returned by the token endpoint, if available.
	pub status: Option<u16>,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
}

/// Thread-safe slot for sharing [`ResponseMetadata`] between transport and error layers.
///
/// A token fetch creates a fresh slot per attempt and reads the captured metadata as soon as
/// the `oauth2` exchange resolves.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Stores new metadata for the current request.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Returns the captured metadata, if any, consuming it from the slot.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// [`AsyncHttpClient`] adapter that routes `oauth2` token exchanges through a [`Transport`]
/// and records response metadata.
pub(crate) struct TransportHandle {
	transport: SharedTransport,
	slot: ResponseMetadataSlot,
}
impl TransportHandle {
	pub(crate) fn new(transport: SharedTransport, slot: ResponseMetadataSlot) -> Self {
		Self { transport, slot }
	}
}
impl<'c> AsyncHttpClient<'c> for TransportHandle {
	type Error = HttpClientError<Error>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		Box::pin(async move {
			self.slot.take();

			let response = self.transport.execute(request).await.map_err(Box::new)?;

			self.slot.store(ResponseMetadata {
				status: Some(response.status().as_u16()),
				retry_after: parse_retry_after(response.headers()),
			});

			Ok(response)
		})
	}
}

pub(crate) fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u32>() {
		return Some(Duration::seconds(i64::from(secs)));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}

#[cfg(test)]
mod tests {
	// crates.io
	use oauth2::http::HeaderValue;
	// self
	use super::*;

	#[test]
	fn inherit_copies_only_non_default_settings() {
		let jar = Arc::new(Jar::default());
		let base = TransportSettings::default()
			.with_timeout(StdDuration::from_secs(30))
			.with_redirect(RedirectPolicy::None)
			.with_cookie_jar(Arc::clone(&jar));
		let inherited = TransportSettings::inherit_from(&base);

		assert_eq!(inherited, base);
		assert!(
			inherited.cookie_jar.as_ref().is_some_and(|copied| Arc::ptr_eq(copied, &jar)),
			"The cookie jar must be shared, not cloned."
		);
		assert!(TransportSettings::inherit_from(&TransportSettings::default()).is_default());
	}

	#[test]
	fn zero_timeout_means_no_timeout() {
		let settings = TransportSettings::default().with_timeout(StdDuration::ZERO);

		assert_eq!(settings.timeout, None);
		assert!(settings.is_default());
	}

	#[test]
	fn custom_redirect_policies_compare_by_identity() {
		let hook = RedirectPolicy::custom(|attempt| attempt.stop());

		assert_eq!(hook, hook.clone());
		assert_ne!(hook, RedirectPolicy::custom(|attempt| attempt.stop()));
		assert_eq!(RedirectPolicy::Limited(3), RedirectPolicy::Limited(3));
		assert_eq!(format!("{hook:?}"), "Custom(..)");
	}

	#[test]
	fn reqwest_transport_reports_its_settings() {
		let settings = TransportSettings::default()
			.with_timeout(StdDuration::from_secs(5))
			.with_redirect(RedirectPolicy::Limited(2));
		let transport =
			ReqwestTransport::new(settings.clone()).expect("Reqwest transport should build.");

		assert_eq!(transport.settings(), &settings);
	}

	#[test]
	fn retry_after_parses_seconds_and_ignores_garbage() {
		let mut headers = HeaderMap::new();

		headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));

		assert_eq!(parse_retry_after(&headers), Some(Duration::seconds(7)));

		headers.insert(RETRY_AFTER, HeaderValue::from_static("soon"));

		assert_eq!(parse_retry_after(&headers), None);
		assert_eq!(parse_retry_after(&HeaderMap::new()), None);
	}
}
