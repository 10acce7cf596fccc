//! Compute-resource login and renewal on VPC instances.
//!
//! Compute-resource sessions carry no refresh token. They are renewed by requesting a new
//! instance-identity token from the metadata service and exchanging it again for an IAM
//! token under the trusted profile recorded at login.

// self
use crate::{
	_prelude::*,
	auth::Token,
	config::{CoreConfig, TokenSlot},
	error::ConfigError,
	http::TokenHttpClient,
	obs::{self, FlowKind},
	provider::{TrustedProfileRequest, VpcClient},
};

/// Establishes and renews VPC compute-resource sessions.
pub struct ComputeResourceRenewer<C>
where
	C: ?Sized + TokenHttpClient,
{
	vpc: VpcClient<C>,
	config: Arc<CoreConfig>,
}
impl<C> ComputeResourceRenewer<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Creates a renewer over `vpc` that stores sessions into `config`.
	pub fn new(vpc: VpcClient<C>, config: Arc<CoreConfig>) -> Self {
		Self { vpc, config }
	}

	/// Logs in under `profile` and records the profile for later renewals.
	pub async fn login(&self, profile: TrustedProfileRequest) -> Result<Token> {
		obs::observe_flow(FlowKind::ComputeResourceRenewal, "login", async {
			let token = self.fetch(&profile).await?;

			self.config.store_compute_resource_session(&profile, &token);

			Ok(token)
		})
		.await
	}

	/// Renews the stored compute-resource session.
	pub async fn renew(&self) -> Result<Token> {
		obs::observe_flow(FlowKind::ComputeResourceRenewal, "renew", async {
			let profile = self
				.config
				.compute_resource_login()
				.ok_or(ConfigError::MissingComputeResourceLogin)?;
			let token = self.fetch(&profile).await?;

			self.config.store_token(TokenSlot::Iam, &token);

			Ok(token)
		})
		.await
	}

	async fn fetch(&self, profile: &TrustedProfileRequest) -> Result<Token> {
		profile.validate()?;

		let identity = self.vpc.get_instance_identity_token(None).await?;

		self.vpc.get_iam_access_token(identity.access_token.expose(), profile).await
	}
}
impl<C> Debug for ComputeResourceRenewer<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ComputeResourceRenewer").field("vpc", &self.vpc).finish_non_exhaustive()
	}
}
