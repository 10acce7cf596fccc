//! Refresh-token rotation for a stored session, with a singleflight guard and metrics.
//!
//! [`TokenRefresher::refresh`] reads the stored refresh token, performs one
//! `grant_type=refresh_token` exchange with no configuration lock held, and stores the
//! issued pair in a single write. Failed exchanges surface unchanged and leave the stored
//! session untouched. [`TokenRefresher::valid_access_token`] refreshes only when the stored
//! access token is inside the preemptive window.

mod metrics;

pub use metrics::{RefreshMetrics, RefreshMetricsSnapshot};

// self
use crate::{
	_prelude::*,
	auth::{ResponseType, Token, TokenClaims, TokenRequest},
	config::{CoreConfig, TokenSlot},
	error::ConfigError,
	obs::{self, FlowKind},
	provider::TokenExchange,
};

/// Default margin before expiry at which a stored access token is refreshed.
pub const DEFAULT_PREEMPTIVE_WINDOW: Duration = Duration::seconds(60);

/// Rotates the tokens of one [`TokenSlot`] through a backend exchange.
pub struct TokenRefresher<X>
where
	X: ?Sized + TokenExchange,
{
	backend: Arc<X>,
	config: Arc<CoreConfig>,
	slot: TokenSlot,
	response_types: Vec<ResponseType>,
	preemptive_window: Duration,
	metrics: Arc<RefreshMetrics>,
	singleflight: AsyncMutex<()>,
}
impl<X> TokenRefresher<X>
where
	X: ?Sized + TokenExchange,
{
	/// Creates a refresher for `slot` backed by `backend`.
	pub fn new(backend: impl Into<Arc<X>>, config: Arc<CoreConfig>, slot: TokenSlot) -> Self {
		Self {
			backend: backend.into(),
			config,
			slot,
			response_types: Vec::new(),
			preemptive_window: DEFAULT_PREEMPTIVE_WINDOW,
			metrics: Default::default(),
			singleflight: AsyncMutex::new(()),
		}
	}

	/// Also requests a companion UAA pair, stored alongside the IAM pair.
	pub fn with_companion_uaa(mut self) -> Self {
		self.response_types = vec![ResponseType::CloudIam, ResponseType::Uaa];

		self
	}

	/// Overrides the preemptive window; negative values are treated as zero.
	pub fn with_preemptive_window(mut self, window: Duration) -> Self {
		self.preemptive_window = window.max(Duration::ZERO);

		self
	}

	/// Shares an existing metrics recorder.
	pub fn with_metrics(mut self, metrics: Arc<RefreshMetrics>) -> Self {
		self.metrics = metrics;

		self
	}

	/// Slot this refresher maintains.
	pub fn slot(&self) -> TokenSlot {
		self.slot
	}

	/// Refresh counters.
	pub fn metrics(&self) -> &Arc<RefreshMetrics> {
		&self.metrics
	}

	/// Exchanges the stored refresh token for a new pair and stores it.
	pub async fn refresh(&self) -> Result<Token> {
		obs::observe_flow(FlowKind::Refresh, "refresh", async {
			let _singleflight = self.singleflight.lock().await;

			self.refresh_locked().await
		})
		.await
	}

	/// Returns the stored access token, refreshing it first when it is missing, unparsable,
	/// or expires within the preemptive window.
	pub async fn valid_access_token(&self) -> Result<String> {
		if let Some(access) = self.usable_access_token(OffsetDateTime::now_utc()) {
			self.metrics.record_reuse();

			return Ok(access);
		}

		obs::observe_flow(FlowKind::Refresh, "valid_access_token", async {
			let _singleflight = self.singleflight.lock().await;

			// A concurrent caller may have refreshed while this one waited.
			if let Some(access) = self.usable_access_token(OffsetDateTime::now_utc()) {
				self.metrics.record_reuse();

				return Ok(access);
			}

			let token = self.refresh_locked().await?;

			Ok(token.access_token.expose().to_owned())
		})
		.await
	}

	async fn refresh_locked(&self) -> Result<Token> {
		self.metrics.record_attempt();

		let (_, refresh_token) = self.config.tokens(self.slot);

		if refresh_token.is_empty() {
			self.metrics.record_failure();

			return Err(ConfigError::MissingRefreshToken { slot: self.slot.label() }.into());
		}

		let request = TokenRequest::refresh_token(refresh_token)
			.with_response_types(self.response_types.iter().copied());
		let token = self.backend.exchange(request).await.inspect_err(|_| {
			self.metrics.record_failure();
		})?;

		self.config.store_token(self.slot, &token);
		self.metrics.record_success();

		Ok(token)
	}

	fn usable_access_token(&self, now: OffsetDateTime) -> Option<String> {
		let (access, _) = self.config.tokens(self.slot);

		if access.is_empty() {
			return None;
		}

		let claims = TokenClaims::parse(&access).ok()?;

		match claims.expires_at() {
			Some(expires_at) if expires_at - now <= self.preemptive_window => None,
			_ => Some(access),
		}
	}
}
impl<X> Debug for TokenRefresher<X>
where
	X: ?Sized + TokenExchange,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenRefresher")
			.field("slot", &self.slot)
			.field("response_types", &self.response_types)
			.field("preemptive_window", &self.preemptive_window)
			.finish_non_exhaustive()
	}
}
