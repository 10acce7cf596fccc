//! IAM token endpoint client.

// crates.io
use url::form_urlencoded::Serializer;
// self
use crate::{
	_prelude::*,
	auth::{ResponseType, Token, TokenRequest},
	error::ConfigError,
	http::TokenHttpClient,
	obs::{self, FlowKind},
	provider::{self, BackendErrorBody, ExchangeFuture, IamDescriptor, TokenExchange},
};

/// IAM error code for a rejected token.
pub const IAM_INVALID_TOKEN: &str = "BXNIM0407E";
/// IAM error code for an expired refresh token.
pub const IAM_REFRESH_TOKEN_EXPIRED: &str = "BXNIM0408E";
/// IAM error code carrying an external authentication requirement.
pub const IAM_EXTERNAL_AUTHENTICATION_REQUIRED: &str = "BXNIM0400E";
/// IAM error code for an inactive session.
pub const IAM_SESSION_INACTIVE: &str = "BXNIM0439E";

/// Endpoints advertised by the IAM OpenID discovery document.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct IamEndpoints {
	/// Token issuer.
	#[serde(default)]
	pub issuer: String,
	/// Browser authorization endpoint.
	#[serde(default)]
	pub authorization_endpoint: String,
	/// Token endpoint.
	#[serde(default)]
	pub token_endpoint: String,
	/// Endpoint that issues one-time passcodes.
	#[serde(default)]
	pub passcode_endpoint: String,
}

/// Client for the IAM token service.
pub struct IamClient<C>
where
	C: ?Sized + TokenHttpClient,
{
	descriptor: IamDescriptor,
	http_client: Arc<C>,
}
impl<C> IamClient<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Creates a client for the described IAM endpoint.
	pub fn new(descriptor: IamDescriptor, http_client: impl Into<Arc<C>>) -> Self {
		Self { descriptor, http_client: http_client.into() }
	}

	/// Descriptor this client was built with.
	pub fn descriptor(&self) -> &IamDescriptor {
		&self.descriptor
	}

	/// Exchanges `request` at `POST {endpoint}/identity/token`.
	///
	/// When the request asks for the `uaa` response type, the companion client pair is added
	/// to the form body so IAM can mint the UAA token in the same call.
	pub async fn get_token(&self, request: TokenRequest) -> Result<Token> {
		let stage = request.grant_type().as_str();

		obs::observe_flow(FlowKind::IamToken, stage, async move {
			let form = {
				let mut form = Serializer::new(String::new());

				request.serialize(&mut form);

				if request.wants(ResponseType::Uaa) {
					form.append_pair("uaa_client_id", &self.descriptor.uaa_client.id);
					form.append_pair("uaa_client_secret", &self.descriptor.uaa_client.secret);
				}

				form.finish()
			};
			let http_request =
				provider::form_post(&self.descriptor.token_url(), &self.descriptor.client, form)?;
			let issued_at = OffsetDateTime::now_utc();
			let response = provider::send::<_, IamTokenResponse, IamErrorBody>(
				self.http_client.as_ref(),
				http_request,
			)
			.await?;

			response.into_token(issued_at)
		})
		.await
	}

	/// Fetches the OpenID discovery document.
	pub async fn endpoints(&self) -> Result<IamEndpoints> {
		obs::observe_flow(FlowKind::IamDiscovery, "discovery", async move {
			let http_request = oauth2::http::Request::builder()
				.method(oauth2::http::Method::GET)
				.uri(self.descriptor.discovery_url().as_str())
				.header(oauth2::http::header::ACCEPT, "application/json")
				.body(Vec::new())
				.map_err(ConfigError::from)?;

			provider::send::<_, IamEndpoints, IamErrorBody>(self.http_client.as_ref(), http_request)
				.await
		})
		.await
	}
}
impl<C> TokenExchange for IamClient<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn exchange(&self, request: TokenRequest) -> ExchangeFuture<'_, Token> {
		Box::pin(self.get_token(request))
	}
}
impl<C> Debug for IamClient<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IamClient").field("descriptor", &self.descriptor).finish_non_exhaustive()
	}
}

#[derive(Deserialize)]
struct IamTokenResponse {
	access_token: String,
	#[serde(default)]
	refresh_token: String,
	#[serde(default)]
	token_type: String,
	#[serde(default)]
	scope: String,
	#[serde(default)]
	expiration: Option<i64>,
	#[serde(default)]
	expires_in: Option<i64>,
	#[serde(default)]
	uaa_token: String,
	#[serde(default)]
	uaa_refresh_token: String,
	#[serde(default)]
	delegated_refresh_token: String,
}
impl IamTokenResponse {
	fn into_token(self, issued_at: OffsetDateTime) -> Result<Token> {
		let expires_at = provider::resolve_expiry(issued_at, self.expiration, self.expires_in)?;

		provider::build_token(
			Token::builder()
				.access_token(self.access_token)
				.refresh_token(self.refresh_token)
				.token_type(self.token_type)
				.scope(self.scope)
				.issued_at(issued_at)
				.expires_at(expires_at)
				.uaa_token(self.uaa_token, self.uaa_refresh_token)
				.delegated_refresh_token(self.delegated_refresh_token),
		)
	}
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IamErrorBody {
	#[serde(default)]
	error_code: String,
	#[serde(default)]
	error_message: String,
	#[serde(default)]
	error_details: String,
	#[serde(default)]
	requirements: Option<IamRequirements>,
}
impl BackendErrorBody for IamErrorBody {
	fn into_error(self, status: u16, raw: &str) -> Error {
		let message = if self.error_message.is_empty() { self.error_details } else { self.error_message };

		match (self.error_code.as_str(), self.requirements) {
			(IAM_INVALID_TOKEN, _) => Error::InvalidToken { message },
			(IAM_REFRESH_TOKEN_EXPIRED, _) => Error::RefreshTokenExpired { message },
			(IAM_SESSION_INACTIVE, _) => Error::SessionInactive { message },
			(IAM_EXTERNAL_AUTHENTICATION_REQUIRED, Some(requirements)) =>
				Error::ExternalAuthenticationRequired {
					code: requirements.code,
					message: requirements.error,
				},
			_ => provider::server_error(status, self.error_code.clone(), message, raw),
		}
	}
}

#[derive(Deserialize)]
struct IamRequirements {
	#[serde(default)]
	code: String,
	#[serde(default)]
	error: String,
}
