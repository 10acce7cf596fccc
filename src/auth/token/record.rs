//! Issued token values and their builder.

// self
use crate::{_prelude::*, auth::token::secret::TokenSecret};

/// Errors produced by [`TokenBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum TokenBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when no expiry (absolute or relative) was configured.
	#[error("Expiry must be supplied via expires_at or expires_in.")]
	MissingExpiry,
}

/// Secondary token pair minted by another backend in the same exchange, e.g. the UAA token
/// returned by IAM when the `uaa` response type is requested.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanionToken {
	/// Companion access token.
	pub access_token: TokenSecret,
	/// Companion refresh token, when issued.
	pub refresh_token: Option<TokenSecret>,
}
impl CompanionToken {
	/// Wraps a companion pair, treating an empty refresh token as absent.
	pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
		Self { access_token: TokenSecret::new(access_token), refresh_token: non_empty(refresh_token) }
	}
}
impl Debug for CompanionToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CompanionToken")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.finish()
	}
}

/// Credential issued by a successful exchange.
///
/// Tokens are values: a refresh produces a new [`Token`] rather than mutating the old one.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Refresh token secret, absent for non-refreshable grants.
	pub refresh_token: Option<TokenSecret>,
	/// Token type reported by the backend, usually `Bearer`.
	pub token_type: String,
	/// Granted scope string, when reported.
	pub scope: Option<String>,
	/// Instant the token was received.
	pub issued_at: OffsetDateTime,
	/// Absolute expiry instant.
	pub expires_at: OffsetDateTime,
	/// Companion UAA token pair, when requested from IAM.
	pub uaa: Option<CompanionToken>,
	/// Delegated refresh token, when requested from IAM.
	pub delegated_refresh_token: Option<TokenSecret>,
}
impl Token {
	/// Returns a builder with `Bearer` as the default token type.
	pub fn builder() -> TokenBuilder {
		TokenBuilder::default()
	}

	/// Refresh token as a plain string, empty when none was issued.
	pub fn refresh_token_str(&self) -> &str {
		self.refresh_token.as_ref().map(TokenSecret::expose).unwrap_or_default()
	}

	/// Returns `true` if the token has expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_at
	}

	/// Returns `true` if the token is expired relative to the current clock.
	pub fn is_expired(&self) -> bool {
		self.is_expired_at(OffsetDateTime::now_utc())
	}

	/// Time left before expiry at `instant`, negative once expired.
	pub fn remaining_at(&self, instant: OffsetDateTime) -> Duration {
		self.expires_at - instant
	}

	/// Value for an `Authorization` header, e.g. `Bearer eyJ...`.
	pub fn authorization_header(&self) -> String {
		if self.token_type.eq_ignore_ascii_case("bearer") {
			format!("Bearer {}", self.access_token.expose())
		} else {
			format!("{} {}", self.token_type, self.access_token.expose())
		}
	}
}
impl Debug for Token {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Token")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("token_type", &self.token_type)
			.field("scope", &self.scope)
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.field("uaa", &self.uaa)
			.field("delegated_refresh_token", &self.delegated_refresh_token.as_ref().map(|_| "<redacted>"))
			.finish()
	}
}

/// Builder for [`Token`].
#[derive(Clone, Debug, Default)]
pub struct TokenBuilder {
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	token_type: Option<String>,
	scope: Option<String>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
	uaa: Option<CompanionToken>,
	delegated_refresh_token: Option<TokenSecret>,
}
impl TokenBuilder {
	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides the refresh token value; an empty string means none was issued.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = non_empty(token);

		self
	}

	/// Overrides the token type.
	pub fn token_type(mut self, token_type: impl Into<String>) -> Self {
		let token_type = token_type.into();

		if !token_type.is_empty() {
			self.token_type = Some(token_type);
		}

		self
	}

	/// Records the granted scope.
	pub fn scope(mut self, scope: impl Into<String>) -> Self {
		let scope = scope.into();

		self.scope = (!scope.is_empty()).then_some(scope);

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

	/// Attaches a companion UAA pair; ignored when the access token is empty.
	pub fn uaa_token(mut self, access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
		let companion = CompanionToken::new(access_token, refresh_token);

		self.uaa = (!companion.access_token.is_empty()).then_some(companion);

		self
	}

	/// Attaches a delegated refresh token; ignored when empty.
	pub fn delegated_refresh_token(mut self, token: impl Into<String>) -> Self {
		self.delegated_refresh_token = non_empty(token);

		self
	}

	/// Consumes the builder and produces a [`Token`].
	pub fn build(self) -> Result<Token, TokenBuilderError> {
		let access_token = self.access_token.ok_or(TokenBuilderError::MissingAccessToken)?;
		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => instant,
			(None, Some(delta)) => issued_at + delta,
			(None, None) => return Err(TokenBuilderError::MissingExpiry),
		};

		Ok(Token {
			access_token,
			refresh_token: self.refresh_token,
			token_type: self.token_type.unwrap_or_else(|| "Bearer".into()),
			scope: self.scope,
			issued_at,
			expires_at,
			uaa: self.uaa,
			delegated_refresh_token: self.delegated_refresh_token,
		})
	}
}

fn non_empty(value: impl Into<String>) -> Option<TokenSecret> {
	let value = value.into();

	(!value.is_empty()).then(|| TokenSecret::new(value))
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn builder_prefers_absolute_expiry() {
		let token = Token::builder()
			.access_token("access")
			.issued_at(macros::datetime!(2025-01-01 00:00 UTC))
			.expires_in(Duration::minutes(30))
			.expires_at(macros::datetime!(2025-01-01 01:00 UTC))
			.build()
			.expect("Token builder should accept both expiry forms.");

		assert_eq!(token.expires_at, macros::datetime!(2025-01-01 01:00 UTC));
		assert_eq!(token.token_type, "Bearer");
	}

	#[test]
	fn builder_handles_relative_expiry() {
		let token = Token::builder()
			.access_token("secret")
			.issued_at(macros::datetime!(2025-01-01 00:00 UTC))
			.expires_in(Duration::minutes(30))
			.build()
			.expect("Token builder should support relative expiry.");

		assert_eq!(token.expires_at, macros::datetime!(2025-01-01 00:30 UTC));
		assert!(token.is_expired_at(macros::datetime!(2025-01-01 00:30 UTC)));
		assert!(!token.is_expired_at(macros::datetime!(2025-01-01 00:29 UTC)));
	}

	#[test]
	fn builder_rejects_missing_fields() {
		assert_eq!(
			Token::builder().expires_in(Duration::minutes(1)).build().unwrap_err(),
			TokenBuilderError::MissingAccessToken
		);
		assert_eq!(
			Token::builder().access_token("a").build().unwrap_err(),
			TokenBuilderError::MissingExpiry
		);
	}

	#[test]
	fn empty_optional_secrets_are_dropped() {
		let token = Token::builder()
			.access_token("access")
			.refresh_token("")
			.uaa_token("", "uaa-refresh")
			.delegated_refresh_token("")
			.scope("")
			.token_type("")
			.expires_in(Duration::hours(1))
			.build()
			.expect("Token builder should succeed.");

		assert!(token.refresh_token.is_none());
		assert_eq!(token.refresh_token_str(), "");
		assert!(token.uaa.is_none());
		assert!(token.delegated_refresh_token.is_none());
		assert!(token.scope.is_none());
		assert_eq!(token.token_type, "Bearer");
	}

	#[test]
	fn authorization_header_normalizes_bearer() {
		let token = Token::builder()
			.access_token("abc")
			.token_type("bearer")
			.expires_in(Duration::hours(1))
			.build()
			.expect("Token builder should succeed.");

		assert_eq!(token.authorization_header(), "Bearer abc");
	}

	#[test]
	fn debug_output_redacts_secrets() {
		let token = Token::builder()
			.access_token("top-secret")
			.refresh_token("also-secret")
			.uaa_token("uaa-secret", "uaa-refresh-secret")
			.expires_in(Duration::hours(1))
			.build()
			.expect("Token builder should succeed.");
		let rendered = format!("{token:?}");

		assert!(!rendered.contains("top-secret"));
		assert!(!rendered.contains("uaa-refresh-secret"));
		assert!(rendered.contains("<redacted>"));
	}
}
