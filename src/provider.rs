//! Backend token clients and the shared exchange plumbing.
//!
//! Each backend (IAM, UAA, VPC instance metadata) has its own client that turns a request into
//! one HTTP call, decodes the success schema into a [`Token`], and classifies error bodies
//! into the crate's [`Error`] taxonomy. [`TokenExchange`] is the capability shared by the
//! clients that accept a generic [`TokenRequest`].

pub mod descriptor;
pub mod iam;
pub mod uaa;
pub mod vpc;

pub use descriptor::*;
pub use iam::*;
pub use uaa::*;
pub use vpc::*;

// crates.io
use oauth2::http::{
	Method,
	header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::{Token, TokenRequest},
	error::{ConfigError, DecodeError, ServerError, TransportError},
	http::{HttpClientError, HttpRequest, TokenHttpClient},
};

/// Boxed future returned by [`TokenExchange::exchange`].
pub type ExchangeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Capability shared by backends that exchange a [`TokenRequest`] for a [`Token`].
pub trait TokenExchange
where
	Self: Send + Sync,
{
	/// Performs exactly one exchange; failures are reported once and never retried.
	fn exchange(&self, request: TokenRequest) -> ExchangeFuture<'_, Token>;
}
impl<T> TokenExchange for Arc<T>
where
	T: ?Sized + TokenExchange,
{
	fn exchange(&self, request: TokenRequest) -> ExchangeFuture<'_, Token> {
		(**self).exchange(request)
	}
}

/// Backend error schema that knows how to classify itself.
pub(crate) trait BackendErrorBody
where
	Self: DeserializeOwned,
{
	/// Maps the decoded body to a typed error; `raw` is the response text.
	fn into_error(self, status: u16, raw: &str) -> Error;
}

/// Builds the catch-all error, falling back to the response text when no message decoded.
pub(crate) fn server_error(status: u16, code: String, message: String, raw: &str) -> Error {
	let message = if message.trim().is_empty() { raw.to_owned() } else { message };

	ServerError { status, code: (!code.is_empty()).then_some(code), message }.into()
}

/// Form POST authenticated with the backend's client pair.
pub(crate) fn form_post(
	url: &Url,
	client: &ClientCredentials,
	form: String,
) -> Result<HttpRequest, ConfigError> {
	Ok(oauth2::http::Request::builder()
		.method(Method::POST)
		.uri(url.as_str())
		.header(ACCEPT, "application/json")
		.header(CONTENT_TYPE, "application/x-www-form-urlencoded")
		.header(AUTHORIZATION, client.basic_auth_header())
		.body(form.into_bytes())?)
}

/// Executes `request` and decodes either the success schema `S` or the error schema `E`.
pub(crate) async fn send<C, S, E>(http_client: &C, request: HttpRequest) -> Result<S>
where
	C: ?Sized + TokenHttpClient,
	S: DeserializeOwned,
	E: BackendErrorBody,
{
	let response = http_client.perform(request).await.map_err(map_transport_error)?;
	let status = response.status();

	if status.is_success() {
		Ok(decode_success(status.as_u16(), response.body())?)
	} else {
		Err(decode_failure::<E>(status.as_u16(), response.body()))
	}
}

fn decode_success<S>(status: u16, body: &[u8]) -> Result<S, DecodeError>
where
	S: DeserializeOwned,
{
	if body.iter().all(u8::is_ascii_whitespace) {
		return Err(DecodeError::EmptyBody { status });
	}

	let mut deserializer = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| DecodeError::Json { source, status })
}

fn decode_failure<E>(status: u16, body: &[u8]) -> Error
where
	E: BackendErrorBody,
{
	let raw = String::from_utf8_lossy(body);
	let raw = raw.trim();

	match serde_json::from_str::<E>(raw) {
		Ok(decoded) => decoded.into_error(status, raw),
		Err(_) => ServerError { status, code: None, message: raw.to_owned() }.into(),
	}
}

fn map_transport_error<E>(err: HttpClientError<E>) -> Error
where
	E: 'static + Send + Sync + StdError,
{
	match err {
		HttpClientError::Reqwest(inner) => TransportError::network(*inner).into(),
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(inner) => TransportError::Io(inner).into(),
		HttpClientError::Other(message) => TransportError::Other { message }.into(),
		_ => TransportError::Other { message: "unknown transport failure".into() }.into(),
	}
}

/// Converts the backend's absolute (`expiration`, unix seconds) or relative (`expires_in`)
/// expiry into an instant; the absolute form wins when both are present.
pub(crate) fn resolve_expiry(
	issued_at: OffsetDateTime,
	expiration: Option<i64>,
	expires_in: Option<i64>,
) -> Result<OffsetDateTime, DecodeError> {
	match (expiration.filter(|value| *value > 0), expires_in) {
		(Some(expiration), _) => OffsetDateTime::from_unix_timestamp(expiration)
			.map_err(|_| DecodeError::InvalidExpiry { value: expiration.to_string() }),
		(None, Some(expires_in)) => issued_at
			.checked_add(Duration::seconds(expires_in))
			.ok_or_else(|| DecodeError::InvalidExpiry { value: expires_in.to_string() }),
		(None, None) => Err(DecodeError::MissingExpiry),
	}
}

/// Finishes a token build, surfacing builder validation failures as configuration errors.
pub(crate) fn build_token(builder: crate::auth::TokenBuilder) -> Result<Token> {
	builder.build().map_err(|err| ConfigError::from(err).into())
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[derive(Deserialize)]
	struct PlainError {
		#[serde(default)]
		code: String,
		#[serde(default)]
		message: String,
	}
	impl BackendErrorBody for PlainError {
		fn into_error(self, status: u16, raw: &str) -> Error {
			server_error(status, self.code, self.message, raw)
		}
	}

	#[test]
	fn empty_decoded_error_keeps_raw_text() {
		let err = decode_failure::<PlainError>(500, b"{}");

		match err {
			Error::Server(ServerError { status, code, message }) => {
				assert_eq!(status, 500);
				assert_eq!(code, None);
				assert_eq!(message, "{}");
			},
			other => panic!("Unexpected error: {other:?}."),
		}
	}

	#[test]
	fn undecodable_error_body_becomes_server_error() {
		let err = decode_failure::<PlainError>(502, b"<html>Bad gateway</html>\n");

		assert!(matches!(
			err,
			Error::Server(ServerError { status: 502, ref message, .. }) if message == "<html>Bad gateway</html>"
		));
	}

	#[test]
	fn empty_success_body_is_a_decode_error() {
		let err = decode_success::<serde_json::Value>(200, b"  ").unwrap_err();

		assert!(matches!(err, DecodeError::EmptyBody { status: 200 }));
	}

	#[test]
	fn malformed_success_body_reports_path() {
		#[derive(Debug, Deserialize)]
		struct Body {
			#[allow(dead_code)]
			expires_in: i64,
		}

		let err = decode_success::<Body>(200, br#"{"expires_in":"soon"}"#).unwrap_err();

		assert!(err.to_string().contains("expires_in"));
	}

	#[test]
	fn absolute_expiry_wins() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);

		assert_eq!(
			resolve_expiry(issued, Some(1_735_693_200), Some(60)).expect("Expiry should resolve."),
			macros::datetime!(2025-01-01 01:00 UTC)
		);
		assert_eq!(
			resolve_expiry(issued, None, Some(60)).expect("Expiry should resolve."),
			macros::datetime!(2025-01-01 00:01 UTC)
		);
		assert!(matches!(resolve_expiry(issued, Some(0), None), Err(DecodeError::MissingExpiry)));
	}
}
