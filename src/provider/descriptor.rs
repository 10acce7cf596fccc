//! Validated backend descriptors: endpoints, fixed client credentials, and VPC metadata
//! settings.
//!
//! Descriptors are plain values built once at process start and handed to each backend
//! client, so no endpoint or credential lives in ambient state.

// crates.io
use base64::{Engine, engine::general_purpose::STANDARD};
// self
use crate::_prelude::*;

/// Default VPC instance metadata endpoint.
pub const DEFAULT_VPC_METADATA_ENDPOINT: &str = "http://169.254.169.254";
/// Default VPC metadata service API version.
pub const DEFAULT_VPC_METADATA_VERSION: &str = "2022-03-01";
/// Default lifetime requested for instance-identity tokens.
pub const DEFAULT_IDENTITY_TOKEN_LIFETIME: Duration = Duration::minutes(5);

/// Errors raised while constructing or validating descriptors.
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum DescriptorError {
	/// Endpoint URL could not be parsed.
	#[error("Endpoint URL is invalid.")]
	InvalidUrl(#[from] url::ParseError),
	/// Endpoints must use HTTP or HTTPS.
	#[error("The {endpoint} endpoint must use http or https: {url}.")]
	UnsupportedScheme {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Endpoints must name a host.
	#[error("The {endpoint} endpoint must include a host: {url}.")]
	MissingHost {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Metadata service version must be set.
	#[error("Metadata service version must not be empty.")]
	EmptyMetadataVersion,
	/// Instance-identity tokens need a positive lifetime.
	#[error("Instance identity token lifetime must be positive.")]
	NonPositiveLifetime,
}

/// Client ID/secret pair a CLI presents to a backend through HTTP Basic authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientCredentials {
	/// Client identifier.
	pub id: String,
	/// Client secret, possibly empty.
	pub secret: String,
}
impl ClientCredentials {
	/// Creates a credential pair.
	pub fn new(id: impl Into<String>, secret: impl Into<String>) -> Self {
		Self { id: id.into(), secret: secret.into() }
	}

	/// Default IAM client pair (`bx`/`bx`).
	pub fn iam_default() -> Self {
		Self::new("bx", "bx")
	}

	/// Default UAA client pair (`cf` with an empty secret).
	pub fn uaa_default() -> Self {
		Self::new("cf", "")
	}

	/// `Authorization` header value for HTTP Basic authentication.
	pub fn basic_auth_header(&self) -> String {
		format!("Basic {}", STANDARD.encode(format!("{}:{}", self.id, self.secret)))
	}
}
impl Debug for ClientCredentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientCredentials")
			.field("id", &self.id)
			.field("secret", &"<redacted>")
			.finish()
	}
}

/// IAM backend descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IamDescriptor {
	/// IAM base endpoint, e.g. `https://iam.cloud.ibm.com`.
	pub endpoint: Url,
	/// Client pair authenticating the CLI to IAM.
	pub client: ClientCredentials,
	/// Client pair forwarded when a companion UAA token is requested.
	pub uaa_client: ClientCredentials,
}
impl IamDescriptor {
	/// Creates a descriptor with the default client pairs.
	pub fn new(endpoint: Url) -> Result<Self, DescriptorError> {
		validate_endpoint("IAM", &endpoint)?;

		Ok(Self {
			endpoint,
			client: ClientCredentials::iam_default(),
			uaa_client: ClientCredentials::uaa_default(),
		})
	}

	/// Parses `endpoint` and creates a descriptor.
	pub fn parse(endpoint: &str) -> Result<Self, DescriptorError> {
		Self::new(Url::parse(endpoint)?)
	}

	/// Overrides the IAM client pair.
	pub fn with_client(mut self, client: ClientCredentials) -> Self {
		self.client = client;

		self
	}

	/// Overrides the companion UAA client pair.
	pub fn with_uaa_client(mut self, client: ClientCredentials) -> Self {
		self.uaa_client = client;

		self
	}

	/// Token endpoint URL.
	pub fn token_url(&self) -> Url {
		endpoint_url(&self.endpoint, &["identity", "token"])
	}

	/// OpenID discovery document URL.
	pub fn discovery_url(&self) -> Url {
		endpoint_url(&self.endpoint, &["identity", ".well-known", "openid-configuration"])
	}
}

/// UAA backend descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UaaDescriptor {
	/// UAA base endpoint.
	pub endpoint: Url,
	/// Client pair authenticating the CLI to UAA.
	pub client: ClientCredentials,
}
impl UaaDescriptor {
	/// Creates a descriptor with the default `cf` client.
	pub fn new(endpoint: Url) -> Result<Self, DescriptorError> {
		validate_endpoint("UAA", &endpoint)?;

		Ok(Self { endpoint, client: ClientCredentials::uaa_default() })
	}

	/// Parses `endpoint` and creates a descriptor.
	pub fn parse(endpoint: &str) -> Result<Self, DescriptorError> {
		Self::new(Url::parse(endpoint)?)
	}

	/// Overrides the client pair.
	pub fn with_client(mut self, client: ClientCredentials) -> Self {
		self.client = client;

		self
	}

	/// Token endpoint URL.
	pub fn token_url(&self) -> Url {
		endpoint_url(&self.endpoint, &["oauth", "token"])
	}
}

/// VPC instance metadata service descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VpcDescriptor {
	/// Metadata service base endpoint.
	pub endpoint: Url,
	/// Value of the `version` query parameter sent with every call.
	pub metadata_version: String,
	/// Lifetime requested for instance-identity tokens.
	pub identity_token_lifetime: Duration,
}
impl VpcDescriptor {
	/// Creates a descriptor for `endpoint` with the default version and token lifetime.
	pub fn new(endpoint: Url) -> Result<Self, DescriptorError> {
		validate_endpoint("metadata", &endpoint)?;

		Ok(Self {
			endpoint,
			metadata_version: DEFAULT_VPC_METADATA_VERSION.into(),
			identity_token_lifetime: DEFAULT_IDENTITY_TOKEN_LIFETIME,
		})
	}

	/// Descriptor for the link-local metadata service every VPC instance can reach.
	pub fn link_local() -> Result<Self, DescriptorError> {
		Self::new(Url::parse(DEFAULT_VPC_METADATA_ENDPOINT)?)
	}

	/// Overrides the metadata service version.
	pub fn with_metadata_version(
		mut self,
		version: impl Into<String>,
	) -> Result<Self, DescriptorError> {
		let version = version.into();

		if version.trim().is_empty() {
			return Err(DescriptorError::EmptyMetadataVersion);
		}

		self.metadata_version = version;

		Ok(self)
	}

	/// Overrides the default instance-identity token lifetime.
	pub fn with_identity_token_lifetime(
		mut self,
		lifetime: Duration,
	) -> Result<Self, DescriptorError> {
		if !lifetime.is_positive() {
			return Err(DescriptorError::NonPositiveLifetime);
		}

		self.identity_token_lifetime = lifetime;

		Ok(self)
	}

	/// Instance-identity token endpoint, versioned.
	pub fn instance_identity_url(&self) -> Url {
		self.versioned(&["instance_identity", "v1", "token"])
	}

	/// IAM token exchange endpoint, versioned.
	pub fn iam_token_url(&self) -> Url {
		self.versioned(&["instance_identity", "v1", "iam_token"])
	}

	fn versioned(&self, segments: &[&str]) -> Url {
		let mut url = endpoint_url(&self.endpoint, segments);

		url.query_pairs_mut().append_pair("version", &self.metadata_version);

		url
	}
}

/// Appends `segments` to the base endpoint path, keeping any path prefix already present.
pub(crate) fn endpoint_url(base: &Url, segments: &[&str]) -> Url {
	let mut url = base.clone();

	url.set_query(None);
	url.set_fragment(None);

	if let Ok(mut path) = url.path_segments_mut() {
		path.pop_if_empty().extend(segments);
	}

	url
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), DescriptorError> {
	if !matches!(url.scheme(), "http" | "https") {
		return Err(DescriptorError::UnsupportedScheme { endpoint: name, url: url.to_string() });
	}
	if url.host_str().is_none_or(str::is_empty) {
		return Err(DescriptorError::MissingHost { endpoint: name, url: url.to_string() });
	}

	Ok(())
}
