//! UAA token endpoint client.

// self
use crate::{
	_prelude::*,
	auth::{Token, TokenRequest},
	http::TokenHttpClient,
	obs::{self, FlowKind},
	provider::{self, BackendErrorBody, ExchangeFuture, TokenExchange, UaaDescriptor},
};

/// UAA error for a rejected token.
pub const UAA_INVALID_TOKEN: &str = "invalid-token";
/// UAA error for a rejected grant.
pub const UAA_INVALID_GRANT: &str = "invalid_grant";

/// Client for the UAA token service.
pub struct UaaClient<C>
where
	C: ?Sized + TokenHttpClient,
{
	descriptor: UaaDescriptor,
	http_client: Arc<C>,
}
impl<C> UaaClient<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Creates a client for the described UAA endpoint.
	pub fn new(descriptor: UaaDescriptor, http_client: impl Into<Arc<C>>) -> Self {
		Self { descriptor, http_client: http_client.into() }
	}

	/// Descriptor this client was built with.
	pub fn descriptor(&self) -> &UaaDescriptor {
		&self.descriptor
	}

	/// Exchanges `request` at `POST {endpoint}/oauth/token`.
	pub async fn get_token(&self, request: TokenRequest) -> Result<Token> {
		let stage = request.grant_type().as_str();

		obs::observe_flow(FlowKind::UaaToken, stage, async move {
			let http_request = provider::form_post(
				&self.descriptor.token_url(),
				&self.descriptor.client,
				request.to_form(),
			)?;
			let issued_at = OffsetDateTime::now_utc();
			let response = provider::send::<_, UaaTokenResponse, UaaErrorBody>(
				self.http_client.as_ref(),
				http_request,
			)
			.await?;

			response.into_token(issued_at)
		})
		.await
	}
}
impl<C> TokenExchange for UaaClient<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn exchange(&self, request: TokenRequest) -> ExchangeFuture<'_, Token> {
		Box::pin(self.get_token(request))
	}
}
impl<C> Debug for UaaClient<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("UaaClient").field("descriptor", &self.descriptor).finish_non_exhaustive()
	}
}

#[derive(Deserialize)]
struct UaaTokenResponse {
	access_token: String,
	#[serde(default)]
	refresh_token: String,
	#[serde(default)]
	token_type: String,
	#[serde(default)]
	scope: String,
	#[serde(default)]
	expires_in: Option<i64>,
}
impl UaaTokenResponse {
	fn into_token(self, issued_at: OffsetDateTime) -> Result<Token> {
		let expires_at = provider::resolve_expiry(issued_at, None, self.expires_in)?;

		provider::build_token(
			Token::builder()
				.access_token(self.access_token)
				.refresh_token(self.refresh_token)
				.token_type(self.token_type)
				.scope(self.scope)
				.issued_at(issued_at)
				.expires_at(expires_at),
		)
	}
}

#[derive(Deserialize)]
struct UaaErrorBody {
	#[serde(default)]
	error: String,
	#[serde(default)]
	error_description: String,
}
impl BackendErrorBody for UaaErrorBody {
	fn into_error(self, status: u16, raw: &str) -> Error {
		let message = self.error_description;

		match self.error.as_str() {
			UAA_INVALID_TOKEN => Error::InvalidToken { message },
			UAA_INVALID_GRANT => Error::InvalidGrant { message },
			_ => provider::server_error(status, self.error.clone(), message, raw),
		}
	}
}
