//! Transport seam for backend token exchanges.
//!
//! The module exposes [`TokenHttpClient`], the crate's only dependency on an HTTP stack.
//! Backend clients build fully-formed [`HttpRequest`] values (method, URL, headers, body),
//! hand them to the transport, and decode the returned [`HttpResponse`] themselves. Timeouts,
//! TLS, and retry policy belong to the transport implementation.

pub use oauth2::{HttpClientError, HttpRequest, HttpResponse};

// std
#[cfg(feature = "reqwest")] use std::{ops::Deref, time::Duration as StdDuration};
// self
use crate::_prelude::*;
#[cfg(feature = "reqwest")] use crate::error::ConfigError;

/// Boxed future returned by [`TokenHttpClient::perform`].
pub type HttpFuture<'a, E> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, HttpClientError<E>>> + 'a + Send>>;

/// Abstraction over HTTP transports capable of executing backend token exchanges.
///
/// Implementations must be `Send + Sync + 'static` so a single transport can be shared by
/// every backend client behind an `Arc`, and the futures they return must be `Send` so the
/// clients' boxed exchange futures inherit the same guarantee. Any HTTP status, including
/// 4xx/5xx, must be returned as a successful [`HttpResponse`]; only failures to obtain a
/// response at all are reported through [`HttpClientError`].
pub trait TokenHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// Executes the request and returns the raw response.
	fn perform(&self, request: HttpRequest) -> HttpFuture<'_, Self::TransportError>;
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Token endpoints answer directly, so [`ReqwestHttpClient::with_timeout`] builds a client
/// that never follows redirects. A client supplied through
/// [`ReqwestHttpClient::with_client`] is used as-is.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a non-redirecting client with an optional per-request timeout, typically the
	/// persisted `HTTPTimeout` setting.
	pub fn with_timeout(timeout: Option<StdDuration>) -> Result<Self, ConfigError> {
		let mut builder = ReqwestClient::builder().redirect(reqwest::redirect::Policy::none());

		if let Some(timeout) = timeout {
			builder = builder.timeout(timeout);
		}

		Ok(Self(builder.build()?))
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Debug for ReqwestHttpClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("ReqwestHttpClient(..)")
	}
}
#[cfg(feature = "reqwest")]
impl TokenHttpClient for ReqwestHttpClient {
	type TransportError = ReqwestError;

	fn perform(&self, request: HttpRequest) -> HttpFuture<'_, Self::TransportError> {
		let client = self.0.clone();

		Box::pin(async move {
			let response =
				client.execute(request.try_into().map_err(Box::new)?).await.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let mut response_new =
				HttpResponse::new(response.bytes().await.map_err(Box::new)?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}

#[cfg(all(test, feature = "reqwest"))]
mod tests {
	// self
	use super::*;

	#[test]
	fn builds_timeout_client() {
		let client = ReqwestHttpClient::with_timeout(Some(StdDuration::from_secs(30)))
			.expect("Timeout client should build.");

		assert_eq!(format!("{client:?}"), "ReqwestHttpClient(..)");
	}
}
