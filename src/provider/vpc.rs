//! VPC instance metadata client: instance-identity tokens and their exchange for IAM tokens.

// crates.io
use oauth2::http::{
	Method,
	header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderName},
};
use time::format_description::well_known::Rfc3339;
// self
use crate::{
	_prelude::*,
	auth::Token,
	error::{ConfigError, DecodeError},
	http::{HttpRequest, TokenHttpClient},
	obs::{self, FlowKind},
	provider::{self, BackendErrorBody, DescriptorError, VpcDescriptor},
};

/// Header the metadata service uses for origin attribution.
pub const METADATA_FLAVOR_HEADER: &str = "Metadata-Flavor";
/// Required value of [`METADATA_FLAVOR_HEADER`].
pub const METADATA_FLAVOR: &str = "ibm";

/// Trusted profile assumed when exchanging an instance-identity token.
///
/// At most one selector may be set; empty strings count as unset.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustedProfileRequest {
	/// Trusted profile identifier.
	pub id: Option<String>,
	/// Trusted profile CRN.
	pub crn: Option<String>,
}
impl TrustedProfileRequest {
	/// Selects a profile by identifier.
	pub fn by_id(id: impl Into<String>) -> Self {
		Self { id: Some(id.into()), crn: None }
	}

	/// Selects a profile by CRN.
	pub fn by_crn(crn: impl Into<String>) -> Self {
		Self { id: None, crn: Some(crn.into()) }
	}

	/// Fails when both selectors are present.
	pub fn validate(&self) -> Result<(), ConfigError> {
		match (self.id(), self.crn()) {
			(Some(_), Some(_)) => Err(ConfigError::ConflictingTrustedProfile),
			_ => Ok(()),
		}
	}

	fn id(&self) -> Option<&str> {
		self.id.as_deref().filter(|value| !value.is_empty())
	}

	fn crn(&self) -> Option<&str> {
		self.crn.as_deref().filter(|value| !value.is_empty())
	}

	fn body(&self) -> Option<serde_json::Value> {
		match (self.id(), self.crn()) {
			(Some(id), _) => Some(serde_json::json!({ "trusted_profile": { "id": id } })),
			(None, Some(crn)) => Some(serde_json::json!({ "trusted_profile": { "crn": crn } })),
			(None, None) => None,
		}
	}
}

/// Client for the VPC instance metadata service.
pub struct VpcClient<C>
where
	C: ?Sized + TokenHttpClient,
{
	descriptor: VpcDescriptor,
	http_client: Arc<C>,
}
impl<C> VpcClient<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Creates a client for the described metadata service.
	pub fn new(descriptor: VpcDescriptor, http_client: impl Into<Arc<C>>) -> Self {
		Self { descriptor, http_client: http_client.into() }
	}

	/// Descriptor this client was built with.
	pub fn descriptor(&self) -> &VpcDescriptor {
		&self.descriptor
	}

	/// Requests an instance-identity token, valid for `lifetime` or the descriptor default.
	pub async fn get_instance_identity_token(&self, lifetime: Option<Duration>) -> Result<Token> {
		let lifetime = lifetime.unwrap_or(self.descriptor.identity_token_lifetime);

		obs::observe_flow(FlowKind::InstanceIdentity, "instance_identity", async move {
			if !lifetime.is_positive() {
				return Err(ConfigError::from(DescriptorError::NonPositiveLifetime).into());
			}

			let body = serde_json::to_vec(&serde_json::json!({ "expires_in": lifetime.whole_seconds() }))
				.map_err(ConfigError::from)?;
			let request = self.request(Method::PUT, &self.descriptor.instance_identity_url(), None, body)?;
			let issued_at = OffsetDateTime::now_utc();
			let response = provider::send::<_, VpcTokenResponse, VpcErrorBody>(
				self.http_client.as_ref(),
				request,
			)
			.await?;

			response.into_token(issued_at)
		})
		.await
	}

	/// Exchanges an instance-identity token for an IAM access token, optionally assuming a
	/// trusted profile. Conflicting selectors are rejected before any network call.
	pub async fn get_iam_access_token(
		&self,
		instance_identity_token: &str,
		profile: &TrustedProfileRequest,
	) -> Result<Token> {
		obs::observe_flow(FlowKind::InstanceIamToken, "iam_token", async move {
			profile.validate()?;

			let body = match profile.body() {
				Some(body) => serde_json::to_vec(&body).map_err(ConfigError::from)?,
				None => Vec::new(),
			};
			let request = self.request(
				Method::POST,
				&self.descriptor.iam_token_url(),
				Some(instance_identity_token),
				body,
			)?;
			let issued_at = OffsetDateTime::now_utc();
			let response = provider::send::<_, VpcTokenResponse, VpcErrorBody>(
				self.http_client.as_ref(),
				request,
			)
			.await?;

			response.into_token(issued_at)
		})
		.await
	}

	fn request(
		&self,
		method: Method,
		url: &Url,
		bearer: Option<&str>,
		body: Vec<u8>,
	) -> Result<HttpRequest, ConfigError> {
		let mut builder = oauth2::http::Request::builder()
			.method(method)
			.uri(url.as_str())
			.header(ACCEPT, "application/json")
			.header(HeaderName::from_static("metadata-flavor"), METADATA_FLAVOR);

		if !body.is_empty() {
			builder = builder.header(CONTENT_TYPE, "application/json");
		}
		if let Some(token) = bearer {
			builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
		}

		Ok(builder.body(body)?)
	}
}
impl<C> Debug for VpcClient<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("VpcClient").field("descriptor", &self.descriptor).finish_non_exhaustive()
	}
}

#[derive(Deserialize)]
struct VpcTokenResponse {
	access_token: String,
	#[serde(default)]
	created_at: Option<String>,
	#[serde(default)]
	expires_at: Option<String>,
	#[serde(default)]
	expires_in: Option<i64>,
}
impl VpcTokenResponse {
	fn into_token(self, received_at: OffsetDateTime) -> Result<Token> {
		let issued_at = parse_timestamp(self.created_at.as_deref())?.unwrap_or(received_at);
		let expires_at = match parse_timestamp(self.expires_at.as_deref())? {
			Some(expires_at) => expires_at,
			None => provider::resolve_expiry(issued_at, None, self.expires_in)?,
		};

		provider::build_token(
			Token::builder()
				.access_token(self.access_token)
				.token_type("Bearer")
				.issued_at(issued_at)
				.expires_at(expires_at),
		)
	}
}

fn parse_timestamp(value: Option<&str>) -> Result<Option<OffsetDateTime>, DecodeError> {
	match value.filter(|value| !value.is_empty()) {
		Some(value) => OffsetDateTime::parse(value, &Rfc3339)
			.map(Some)
			.map_err(|_| DecodeError::InvalidExpiry { value: value.to_owned() }),
		None => Ok(None),
	}
}

#[derive(Deserialize)]
struct VpcErrorBody {
	#[serde(default)]
	errors: Vec<VpcErrorEntry>,
}
impl BackendErrorBody for VpcErrorBody {
	fn into_error(self, status: u16, raw: &str) -> Error {
		let (code, message) = self
			.errors
			.into_iter()
			.next()
			.map(|entry| (entry.code, entry.message))
			.unwrap_or_default();

		provider::server_error(status, code, message, raw)
	}
}

#[derive(Deserialize)]
struct VpcErrorEntry {
	#[serde(default)]
	code: String,
	#[serde(default)]
	message: String,
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::error::ServerError;

	#[test]
	fn profile_body_uses_single_selector() {
		assert_eq!(
			TrustedProfileRequest::by_id("Profile-1").body(),
			Some(serde_json::json!({ "trusted_profile": { "id": "Profile-1" } }))
		);
		assert_eq!(
			TrustedProfileRequest::by_crn("crn:v1:p").body(),
			Some(serde_json::json!({ "trusted_profile": { "crn": "crn:v1:p" } }))
		);
		assert_eq!(TrustedProfileRequest::default().body(), None);
		assert_eq!(
			TrustedProfileRequest { id: Some(String::new()), crn: Some("crn:v1:p".into()) }.validate().ok(),
			Some(())
		);
	}

	#[test]
	fn conflicting_profile_is_rejected() {
		let profile =
			TrustedProfileRequest { id: Some("Profile-1".into()), crn: Some("crn:v1:p".into()) };

		assert!(matches!(profile.validate(), Err(ConfigError::ConflictingTrustedProfile)));
	}

	#[test]
	fn token_response_reads_rfc3339_timestamps() {
		let response: VpcTokenResponse = serde_json::from_str(
			r#"{"access_token":"iit","created_at":"2025-01-01T00:00:00Z","expires_at":"2025-01-01T00:05:00Z","expires_in":300}"#,
		)
		.expect("VPC token fixture should parse.");
		let token = response.into_token(OffsetDateTime::now_utc()).expect("VPC token should convert.");

		assert_eq!(token.issued_at, macros::datetime!(2025-01-01 00:00 UTC));
		assert_eq!(token.expires_at, macros::datetime!(2025-01-01 00:05 UTC));
		assert!(token.refresh_token.is_none());
	}

	#[test]
	fn first_error_entry_is_reported() {
		let body = r#"{"errors":[{"code":"invalid_token","message":"IIT expired","more_info":"https://docs"},{"code":"other","message":"ignored"}],"trace":"abc"}"#;
		let decoded: VpcErrorBody = serde_json::from_str(body).expect("VPC error fixture should parse.");

		assert!(matches!(
			decoded.into_error(401, body),
			Error::Server(ServerError { status: 401, code: Some(ref code), ref message })
				if code == "invalid_token" && message == "IIT expired"
		));
	}
}
