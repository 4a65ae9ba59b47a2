//! Cached access-token records, lifecycle helpers, and builders.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Current lifecycle status for an access token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenStatus {
	/// Token is currently valid.
	Active,
	/// Token exceeded its expiry instant.
	Expired,
}

/// Errors produced by [`AccessTokenBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum AccessTokenBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
}

/// Access token issued by the token endpoint and cached by a token source.
#[derive(Clone)]
pub struct AccessToken {
	/// Access token secret; callers must avoid logging it.
	pub secret: TokenSecret,
	/// Issued-at instant recorded when the response arrived.
	pub issued_at: OffsetDateTime,
	/// Expiry instant, or `None` when the issuer omitted `expires_in`.
	pub expires_at: Option<OffsetDateTime>,
}
impl AccessToken {
	/// Returns a builder for constructing token records.
	pub fn builder() -> AccessTokenBuilder {
		AccessTokenBuilder::default()
	}

	/// Computes the lifecycle status at a given instant.
	pub fn status_at(&self, instant: OffsetDateTime) -> TokenStatus {
		match self.expires_at {
			Some(expires_at) if instant >= expires_at => TokenStatus::Expired,
			_ => TokenStatus::Active,
		}
	}

	/// Returns `true` if the token has expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		matches!(self.status_at(instant), TokenStatus::Expired)
	}

	/// Determines whether the token must be replaced before use at `now`.
	///
	/// Tokens inside the preemptive window are treated as stale so requests never carry a
	/// token that expires mid-flight.
	pub fn should_refresh(&self, now: OffsetDateTime, preemptive_window: Duration) -> bool {
		let Some(expires_at) = self.expires_at else {
			return false;
		};

		if self.is_expired_at(now) {
			return true;
		}
		if preemptive_window.is_positive() {
			return expires_at - now <= preemptive_window;
		}

		false
	}
}
impl Debug for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AccessToken")
			.field("secret", &"<redacted>")
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Builder for [`AccessToken`].
#[derive(Clone, Debug, Default)]
pub struct AccessTokenBuilder {
	secret: Option<TokenSecret>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
}
impl AccessTokenBuilder {
	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.secret = Some(TokenSecret::new(token));

		self
	}

	/// Sets the issued-at instant.
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry duration from the issued instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Consumes the builder and produces an [`AccessToken`].
	pub fn build(self) -> Result<AccessToken, AccessTokenBuilderError> {
		let secret = self.secret.ok_or(AccessTokenBuilderError::MissingAccessToken)?;
		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at = self.expires_at.or_else(|| self.expires_in.map(|delta| issued_at + delta));

		Ok(AccessToken { secret, issued_at, expires_at })
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn status_transitions_at_expiry() {
		let token = AccessToken::builder()
			.access_token("access")
			.issued_at(macros::datetime!(2025-01-01 00:00 UTC))
			.expires_in(Duration::hours(1))
			.build()
			.expect("Token builder should succeed for status transitions.");

		assert_eq!(token.expires_at, Some(macros::datetime!(2025-01-01 01:00 UTC)));
		assert_eq!(token.status_at(macros::datetime!(2025-01-01 00:30 UTC)), TokenStatus::Active);
		assert_eq!(token.status_at(macros::datetime!(2025-01-01 01:00 UTC)), TokenStatus::Expired);
	}

	#[test]
	fn preemptive_window_marks_tokens_stale_early() {
		let token = AccessToken::builder()
			.access_token("access")
			.issued_at(macros::datetime!(2025-01-01 00:00 UTC))
			.expires_at(macros::datetime!(2025-01-01 00:10 UTC))
			.build()
			.expect("Token builder should succeed for window checks.");
		let now = macros::datetime!(2025-01-01 00:09:55 UTC);

		assert!(token.should_refresh(now, Duration::seconds(10)));
		assert!(!token.should_refresh(now, Duration::ZERO));
		assert!(!token.should_refresh(macros::datetime!(2025-01-01 00:05 UTC), Duration::seconds(10)));
	}

	#[test]
	fn tokens_without_expiry_never_refresh() {
		let token = AccessToken::builder()
			.access_token("forever")
			.build()
			.expect("Token builder should accept a missing expiry.");

		assert_eq!(token.expires_at, None);
		assert!(!token.should_refresh(OffsetDateTime::now_utc(), Duration::seconds(10)));
		assert!(format!("{token:?}").contains("<redacted>"));
	}

	#[test]
	fn builder_requires_access_token() {
		assert_eq!(
			AccessToken::builder().build().expect_err("Missing token must be rejected."),
			AccessTokenBuilderError::MissingAccessToken
		);
	}
}
