//! Credential lifecycle core for cloud CLIs: exchange passwords, API keys, passcodes, and
//! instance identities for short-lived bearer tokens, refresh them transparently, and persist
//! them in a configuration file shared safely by every CLI process.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod config;
pub mod error;
pub mod flows;
pub mod http;
pub mod obs;
pub mod provider;
pub mod store;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
#[doc(hidden)]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::{_prelude::*, auth::claims::test_jwt};

	// std
	use std::{collections::VecDeque, io};
	// self
	use crate::{
		config::CoreConfig,
		http::{HttpClientError, HttpFuture, HttpRequest, ReqwestHttpClient, TokenHttpClient},
		provider::{IamClient, IamDescriptor, UaaClient, UaaDescriptor, VpcClient, VpcDescriptor},
		store::{ConfigStore, MemoryStore},
	};

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Parses a mock server base URL.
	pub fn mock_url(base: &str) -> Url {
		Url::parse(base).expect("Mock server base URL should parse.")
	}

	/// IAM client pointed at a mock backend with the default client credentials.
	pub fn test_iam_client(base: &str) -> IamClient<ReqwestHttpClient> {
		let descriptor =
			IamDescriptor::new(mock_url(base)).expect("IAM descriptor should accept mock URL.");

		IamClient::new(descriptor, test_reqwest_http_client())
	}

	/// UAA client pointed at a mock backend with the default client credentials.
	pub fn test_uaa_client(base: &str) -> UaaClient<ReqwestHttpClient> {
		let descriptor =
			UaaDescriptor::new(mock_url(base)).expect("UAA descriptor should accept mock URL.");

		UaaClient::new(descriptor, test_reqwest_http_client())
	}

	/// VPC metadata client pointed at a mock backend.
	pub fn test_vpc_client(base: &str) -> VpcClient<ReqwestHttpClient> {
		let descriptor =
			VpcDescriptor::new(mock_url(base)).expect("VPC descriptor should accept mock URL.");

		VpcClient::new(descriptor, test_reqwest_http_client())
	}

	/// Core configuration backed by a fresh in-memory store.
	pub fn memory_core_config() -> (Arc<CoreConfig>, MemoryStore) {
		let backend = MemoryStore::default();
		let store: Arc<dyn ConfigStore> = Arc::new(backend.clone());

		(Arc::new(CoreConfig::new(store)), backend)
	}

	/// Request captured by [`RecordingHttpClient`].
	#[derive(Clone, Debug)]
	pub struct RecordedRequest {
		/// HTTP method.
		pub method: String,
		/// Full request URI.
		pub uri: String,
		/// Headers with lowercase names.
		pub headers: Vec<(String, String)>,
		/// Body decoded as UTF-8.
		pub body: String,
	}
	impl RecordedRequest {
		/// First value of header `name`.
		pub fn header(&self, name: &str) -> Option<&str> {
			self.headers
				.iter()
				.find(|(key, _)| key.eq_ignore_ascii_case(name))
				.map(|(_, value)| value.as_str())
		}

		/// Decoded form fields of the body.
		pub fn form(&self) -> BTreeMap<String, String> {
			url::form_urlencoded::parse(self.body.as_bytes()).into_owned().collect()
		}
	}

	/// Transport that records every request and answers with queued canned responses.
	#[derive(Debug, Default)]
	pub struct RecordingHttpClient {
		responses: Mutex<VecDeque<(u16, String)>>,
		requests: Mutex<Vec<RecordedRequest>>,
	}
	impl RecordingHttpClient {
		/// Queues a response with `status` and JSON `body`.
		pub fn respond(self, status: u16, body: impl Into<String>) -> Self {
			self.responses.lock().push_back((status, body.into()));

			self
		}

		/// Requests seen so far.
		pub fn requests(&self) -> Vec<RecordedRequest> {
			self.requests.lock().clone()
		}
	}
	impl TokenHttpClient for RecordingHttpClient {
		type TransportError = io::Error;

		fn perform(&self, request: HttpRequest) -> HttpFuture<'_, Self::TransportError> {
			let recorded = RecordedRequest {
				method: request.method().to_string(),
				uri: request.uri().to_string(),
				headers: request
					.headers()
					.iter()
					.map(|(name, value)| {
						(name.as_str().to_owned(), value.to_str().unwrap_or_default().to_owned())
					})
					.collect(),
				body: String::from_utf8_lossy(request.body()).into_owned(),
			};
			let next = self.responses.lock().pop_front();

			self.requests.lock().push(recorded);

			Box::pin(async move {
				let (status, body) = next.ok_or_else(|| {
					HttpClientError::Other("No canned response is queued.".into())
				})?;

				oauth2::http::Response::builder()
					.status(status)
					.header(oauth2::http::header::CONTENT_TYPE, "application/json")
					.body(body.into_bytes())
					.map_err(HttpClientError::Http)
			})
		}
	}
}

mod _prelude {
	pub use std::{
		collections::BTreeMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {httpmock as _, tempfile as _, tokio as _};
