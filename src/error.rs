//! Typed error taxonomy shared by backend clients, the token refresher, and configuration
//! persistence.
//!
//! Backend clients translate every failed exchange into exactly one [`Error`] variant so
//! callers branch on kind instead of message text. [`Error::requires_login`] groups the
//! variants whose only remedy is an interactive login.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// The presented token was rejected by the backend.
	#[error("Backend rejected the token: {message}")]
	InvalidToken {
		/// Backend-supplied message text.
		message: String,
	},
	/// The grant itself was rejected (malformed or unknown credential).
	#[error("Backend rejected the grant: {message}")]
	InvalidGrant {
		/// Backend-supplied message text.
		message: String,
	},
	/// The refresh token expired; the user must log in again.
	#[error("Refresh token has expired: {message}")]
	RefreshTokenExpired {
		/// Backend-supplied message text.
		message: String,
	},
	/// The backend demands an out-of-band authentication step first.
	#[error("External authentication is required ({code}): {message}")]
	ExternalAuthenticationRequired {
		/// Requirement code describing the missing step.
		code: String,
		/// Requirement message describing the missing step.
		message: String,
	},
	/// The server-side session timed out.
	#[error("Session is no longer active: {message}")]
	SessionInactive {
		/// Backend-supplied message text.
		message: String,
	},
	/// Catch-all for unrecognized or undecodable backend failures.
	#[error(transparent)]
	Server(#[from] ServerError),

	/// Local configuration or caller mistake, raised before any network call.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Successful response whose body does not match the expected schema.
	#[error(transparent)]
	Decode(#[from] DecodeError),
	/// Transport failure (DNS, TCP, TLS, IO).
	#[error(transparent)]
	Transport(#[from] TransportError),
}
impl Error {
	/// Returns `true` when the only remedy is prompting the user for a fresh login.
	pub fn requires_login(&self) -> bool {
		matches!(
			self,
			Error::InvalidToken { .. }
				| Error::RefreshTokenExpired { .. }
				| Error::SessionInactive { .. }
		)
	}

	/// HTTP status attached to the failure, when the backend answered at all.
	pub fn status(&self) -> Option<u16> {
		match self {
			Error::Server(err) => Some(err.status),
			Error::Decode(err) => err.status(),
			_ => None,
		}
	}
}

/// Generic backend failure carrying the raw status, optional backend code, and message.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Backend returned HTTP {status}: {message}")]
pub struct ServerError {
	/// HTTP status code of the failed response.
	pub status: u16,
	/// Backend-specific error code, when the error body carried one.
	pub code: Option<String>,
	/// Backend message, or the literal response text when no message was decoded.
	pub message: String,
}

/// Configuration and caller-input failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Backend descriptor is invalid.
	#[error(transparent)]
	Descriptor(#[from] crate::provider::DescriptorError),
	/// JSON request body could not be encoded.
	#[error("Request body could not be encoded.")]
	RequestBody(#[from] serde_json::Error),
	/// Token builder validation failed.
	#[error("Unable to build token.")]
	TokenBuild(#[from] crate::auth::TokenBuilderError),

	/// Both trusted-profile selectors were supplied to the VPC exchange.
	#[error("A Profile ID and Profile CRN cannot both be specified.")]
	ConflictingTrustedProfile,
	/// Stored configuration holds no refresh token for the requested slot.
	#[error("No refresh token is stored for the {slot} session.")]
	MissingRefreshToken {
		/// Token slot label.
		slot: &'static str,
	},
	/// Stored configuration holds no compute-resource login to renew.
	#[error("No compute-resource login is stored in the configuration.")]
	MissingComputeResourceLogin,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Failures decoding a successful backend response.
#[derive(Debug, ThisError)]
pub enum DecodeError {
	/// Response body is not valid JSON for the expected schema.
	#[error("Backend returned malformed JSON at `{}`.", .source.path())]
	Json {
		/// Structured parsing failure including the offending field path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code of the response.
		status: u16,
	},
	/// Response body was empty.
	#[error("Backend returned an empty response body.")]
	EmptyBody {
		/// HTTP status code of the response.
		status: u16,
	},
	/// Token response carried neither an absolute nor a relative expiry.
	#[error("Token response is missing an expiry.")]
	MissingExpiry,
	/// Expiry value could not be converted into a timestamp.
	#[error("Token response carries an invalid expiry: {value}.")]
	InvalidExpiry {
		/// Raw expiry value.
		value: String,
	},
}
impl DecodeError {
	/// HTTP status of the undecodable response, when known.
	pub fn status(&self) -> Option<u16> {
		match self {
			DecodeError::Json { status, .. } | DecodeError::EmptyBody { status } => Some(*status),
			_ => None,
		}
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the backend.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the backend.")]
	Io(#[from] std::io::Error),
	/// Transport reported a failure without a structured source.
	#[error("HTTP client error occurred while calling the backend: {message}.")]
	Other {
		/// Transport-supplied description.
		message: String,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn login_remedy_covers_expected_variants() {
		assert!(Error::InvalidToken { message: "bad".into() }.requires_login());
		assert!(Error::RefreshTokenExpired { message: "old".into() }.requires_login());
		assert!(Error::SessionInactive { message: "idle".into() }.requires_login());
		assert!(!Error::InvalidGrant { message: "malformed".into() }.requires_login());
		assert!(
			!Error::from(ServerError { status: 500, code: None, message: "boom".into() })
				.requires_login()
		);
	}

	#[test]
	fn server_error_exposes_status() {
		let err = Error::from(ServerError {
			status: 503,
			code: Some("unavailable".into()),
			message: "try later".into(),
		});

		assert_eq!(err.status(), Some(503));
		assert_eq!(err.to_string(), "Backend returned HTTP 503: try later");
	}

	#[test]
	fn conflicting_profile_message_is_fixed() {
		let err = Error::from(ConfigError::ConflictingTrustedProfile);

		assert_eq!(err.to_string(), "A Profile ID and Profile CRN cannot both be specified.");
	}
}
