//! Unverified JWT payload decoding for stored IAM access tokens.
//!
//! The CLI only inspects its own tokens (account, identity, expiry) to decide what to show and
//! when to refresh; signatures are checked by the backend that consumes the token.

// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
// self
use crate::_prelude::*;

/// Failures decoding a JWT payload.
#[derive(Debug, ThisError)]
pub enum ClaimsError {
	/// Token does not have the `header.payload.signature` shape.
	#[error("Token is not a JWT.")]
	Malformed,
	/// Payload segment is not valid base64url.
	#[error("Token payload is not valid base64url.")]
	Encoding(#[from] base64::DecodeError),
	/// Payload is not the expected JSON object.
	#[error("Token payload is not valid JSON.")]
	Json(#[from] serde_json::Error),
}

/// Account section of an IAM access token.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountClaims {
	/// Billing account identifier.
	#[serde(default)]
	pub bss: String,
	/// Classic infrastructure account identifier.
	#[serde(default)]
	pub ims: String,
	/// Whether the account is in good standing.
	#[serde(default)]
	pub valid: bool,
}

/// Claims carried by IAM access tokens.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenClaims {
	/// IAM identity of the principal.
	pub iam_id: String,
	/// Principal identifier.
	pub id: String,
	/// Identity realm.
	pub realmid: String,
	/// Server-side session identifier.
	pub session_id: String,
	/// Login identifier (user name or API key id).
	pub identifier: String,
	/// Subject.
	pub sub: String,
	/// Subject type, e.g. `ServiceId` or `Profile`.
	pub sub_type: String,
	/// Email address of a user principal.
	pub email: String,
	/// Account scoping.
	pub account: AccountClaims,
	/// Issued-at, unix seconds.
	pub iat: i64,
	/// Expiry, unix seconds.
	pub exp: i64,
}
impl TokenClaims {
	/// Decodes the payload of `token`, accepting an optional `Bearer ` prefix.
	pub fn parse(token: &str) -> Result<Self, ClaimsError> {
		let token = token.trim();
		let token = token
			.strip_prefix("Bearer ")
			.or_else(|| token.strip_prefix("bearer "))
			.unwrap_or(token);
		let mut segments = token.split('.');
		let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
			(Some(_), Some(payload), Some(_), None) if !payload.is_empty() => payload,
			_ => return Err(ClaimsError::Malformed),
		};
		let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('='))?;

		Ok(serde_json::from_slice(&bytes)?)
	}

	/// Expiry instant, when the token carries one.
	pub fn expires_at(&self) -> Option<OffsetDateTime> {
		if self.exp <= 0 {
			return None;
		}

		OffsetDateTime::from_unix_timestamp(self.exp).ok()
	}

	/// Returns `true` when the token has expired at `instant`; tokens without an expiry never
	/// expire.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		self.expires_at().is_some_and(|expires_at| instant >= expires_at)
	}
}

/// Unsigned JWT carrying `payload`, good enough for claim parsing.
#[cfg(any(test, feature = "test"))]
#[doc(hidden)]
pub fn test_jwt(payload: &serde_json::Value) -> String {
	format!("eyJhbGciOiJub25lIn0.{}.c2ln", URL_SAFE_NO_PAD.encode(payload.to_string()))
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn parses_prefixed_token() {
		let jwt = test_jwt(&serde_json::json!({
			"iam_id": "IBMid-1",
			"sub": "user@example.com",
			"email": "user@example.com",
			"account": { "bss": "acct", "valid": true },
			"iat": 1_735_689_600,
			"exp": 1_735_693_200
		}));
		let claims = TokenClaims::parse(&format!("Bearer {jwt}")).expect("Claims should parse.");

		assert_eq!(claims.iam_id, "IBMid-1");
		assert_eq!(claims.account.bss, "acct");
		assert_eq!(claims.account.ims, "");
		assert!(claims.account.valid);
		assert_eq!(claims.expires_at(), Some(macros::datetime!(2025-01-01 01:00 UTC)));
		assert!(claims.is_expired_at(macros::datetime!(2025-01-01 01:00 UTC)));
		assert!(!claims.is_expired_at(macros::datetime!(2025-01-01 00:59 UTC)));
	}

	#[test]
	fn rejects_non_jwt_input() {
		assert!(matches!(TokenClaims::parse("opaque-token"), Err(ClaimsError::Malformed)));
		assert!(matches!(TokenClaims::parse("a..c"), Err(ClaimsError::Malformed)));
		assert!(matches!(TokenClaims::parse("a.!!!.c"), Err(ClaimsError::Encoding(_))));
	}

	#[test]
	fn missing_expiry_never_expires() {
		let claims = TokenClaims::parse(&test_jwt(&serde_json::json!({ "sub": "x" })))
			.expect("Claims should parse.");

		assert_eq!(claims.expires_at(), None);
		assert!(!claims.is_expired_at(OffsetDateTime::now_utc()));
	}
}
