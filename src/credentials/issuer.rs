//! Token-issuer normalization.

// self
use crate::{_prelude::*, error::ValidationError};

/// Path appended to issuers that do not name a token endpoint themselves.
pub const DEFAULT_TOKEN_ENDPOINT_PATH: &str = "oauth/token";

/// Turns a user-supplied issuer into a fully qualified token endpoint URL.
///
/// Bare hosts default to HTTPS, only `http` and `https` are accepted, and an empty (or `/`)
/// path becomes [`DEFAULT_TOKEN_ENDPOINT_PATH`].
pub fn build_token_url(issuer: &str) -> Result<Url, ValidationError> {
	let invalid = |source| ValidationError::InvalidIssuerUrl { issuer: issuer.to_owned(), source };
	let with_https = || Url::parse(&format!("https://{issuer}")).map_err(invalid);
	let mut url = match Url::parse(issuer) {
		Ok(url) if !url.cannot_be_a_base() => url,
		// `host:port` parses as an opaque URL whose "scheme" is the host.
		Ok(_) if is_host_and_port(issuer) => with_https()?,
		Ok(url) =>
			return Err(ValidationError::UnsupportedScheme { scheme: url.scheme().to_owned() }),
		Err(url::ParseError::RelativeUrlWithoutBase) => with_https()?,
		Err(e) => return Err(invalid(e)),
	};

	if url.scheme() != "http" && url.scheme() != "https" {
		return Err(ValidationError::UnsupportedScheme { scheme: url.scheme().to_owned() });
	}
	if url.path().is_empty() || url.path() == "/" {
		url.set_path(DEFAULT_TOKEN_ENDPOINT_PATH);
	}

	Ok(url)
}

fn is_host_and_port(issuer: &str) -> bool {
	issuer
		.split_once(':')
		.is_some_and(|(_, rest)| rest.as_bytes().first().is_some_and(u8::is_ascii_digit))
}
