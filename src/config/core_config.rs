//! Core CLI configuration: endpoints, session tokens, plugin repositories, and feature flags.

// std
use std::time::Duration as StdDuration;
// self
use crate::{
	_prelude::*,
	auth::{ClaimsError, Token, TokenClaims},
	config::ConfigPaths,
	provider::TrustedProfileRequest,
	store::{ConfigPersistenceError, ConfigRepository, ConfigStore, DiskStore},
};

/// Name of the plugin repository seeded into a fresh configuration.
pub const DEFAULT_PLUGIN_REPO_NAME: &str = "IBM Cloud";
/// URL of the plugin repository seeded into a fresh configuration.
pub const DEFAULT_PLUGIN_REPO_URL: &str = "https://plugins.cloud.ibm.com";
/// Compute-resource type recorded for VPC instance logins.
pub const COMPUTE_RESOURCE_TYPE_VPC: &str = "VPC";

const MESSAGE_OF_THE_DAY_INTERVAL: Duration = Duration::hours(24);

/// Which token pair an operation targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenSlot {
	/// IAM access/refresh pair.
	Iam,
	/// UAA access/refresh pair.
	Uaa,
}
impl TokenSlot {
	/// Stable label used in messages.
	pub const fn label(self) -> &'static str {
		match self {
			TokenSlot::Iam => "IAM",
			TokenSlot::Uaa => "UAA",
		}
	}
}
impl Display for TokenSlot {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.label())
	}
}

/// Account the session is targeted at.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct AccountMeta {
	/// Account identifier.
	#[serde(rename = "GUID")]
	pub guid: String,
	/// Display name.
	pub name: String,
	/// Owner user identifier.
	pub owner: String,
}

/// Named plugin repository.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PluginRepo {
	/// Repository name, unique ignoring ASCII case.
	pub name: String,
	/// Repository URL.
	#[serde(rename = "URL")]
	pub url: String,
}
impl PluginRepo {
	/// Creates a repository entry.
	pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
		Self { name: name.into(), url: url.into() }
	}
}

/// Persisted core configuration document.
///
/// Keys this crate does not model are kept in [`extra`](Self::extra) and written back
/// untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct CoreConfigData {
	/// Cloud Foundry API endpoint.
	#[serde(rename = "APIEndpoint")]
	pub api_endpoint: String,
	/// Console endpoint.
	pub console_endpoint: String,
	/// IAM endpoint.
	#[serde(rename = "IAMEndpoint")]
	pub iam_endpoint: String,
	/// UAA endpoint.
	#[serde(rename = "UAAEndpoint")]
	pub uaa_endpoint: String,
	/// Targeted region name.
	pub region: String,
	/// Targeted region identifier.
	#[serde(rename = "RegionID")]
	pub region_id: String,
	/// Targeted account.
	pub account: AccountMeta,
	/// IAM access token.
	#[serde(rename = "IAMToken")]
	pub iam_token: String,
	/// IAM refresh token.
	#[serde(rename = "IAMRefreshToken")]
	pub iam_refresh_token: String,
	/// UAA access token.
	#[serde(rename = "UAAToken")]
	pub uaa_token: String,
	/// UAA refresh token.
	#[serde(rename = "UAARefreshToken")]
	pub uaa_refresh_token: String,
	/// Whether the session was established from a compute resource identity.
	#[serde(rename = "IsLoggedInAsCRI")]
	pub is_logged_in_as_cri: bool,
	/// Compute-resource type, e.g. `VPC`.
	#[serde(rename = "CRIType")]
	pub cri_type: String,
	/// Trusted profile identifier used by compute-resource logins.
	#[serde(rename = "IAMTrustedProfileID")]
	pub trusted_profile_id: String,
	/// Trusted profile CRN used by compute-resource logins.
	#[serde(rename = "IAMTrustedProfileCRN")]
	pub trusted_profile_crn: String,
	/// Plugin repositories.
	pub plugin_repos: Vec<PluginRepo>,
	/// HTTP timeout in seconds; zero means none.
	#[serde(rename = "HTTPTimeout")]
	pub http_timeout: u64,
	/// Suppresses the CLI version check.
	pub check_cli_version_disabled: bool,
	/// Suppresses usage statistics collection.
	pub usage_stats_disabled: bool,
	/// Last time the message of the day was shown, unix seconds.
	pub message_of_the_day_time: i64,
	/// Last time the session tokens were written, unix seconds.
	pub last_session_update_time: i64,
	/// Keys not modeled above.
	#[serde(flatten)]
	pub extra: BTreeMap<String, serde_json::Value>,
}
impl Default for CoreConfigData {
	fn default() -> Self {
		Self {
			api_endpoint: String::new(),
			console_endpoint: String::new(),
			iam_endpoint: String::new(),
			uaa_endpoint: String::new(),
			region: String::new(),
			region_id: String::new(),
			account: AccountMeta::default(),
			iam_token: String::new(),
			iam_refresh_token: String::new(),
			uaa_token: String::new(),
			uaa_refresh_token: String::new(),
			is_logged_in_as_cri: false,
			cri_type: String::new(),
			trusted_profile_id: String::new(),
			trusted_profile_crn: String::new(),
			plugin_repos: vec![PluginRepo::new(DEFAULT_PLUGIN_REPO_NAME, DEFAULT_PLUGIN_REPO_URL)],
			http_timeout: 0,
			check_cli_version_disabled: false,
			usage_stats_disabled: false,
			message_of_the_day_time: 0,
			last_session_update_time: 0,
			extra: BTreeMap::new(),
		}
	}
}
impl CoreConfigData {
	fn token_fields_mut(&mut self, slot: TokenSlot) -> (&mut String, &mut String) {
		match slot {
			TokenSlot::Iam => (&mut self.iam_token, &mut self.iam_refresh_token),
			TokenSlot::Uaa => (&mut self.uaa_token, &mut self.uaa_refresh_token),
		}
	}

	fn token_fields(&self, slot: TokenSlot) -> (&str, &str) {
		match slot {
			TokenSlot::Iam => (&self.iam_token, &self.iam_refresh_token),
			TokenSlot::Uaa => (&self.uaa_token, &self.uaa_refresh_token),
		}
	}
}

/// Typed accessors over the core configuration repository.
#[derive(Debug)]
pub struct CoreConfig {
	repository: ConfigRepository<CoreConfigData>,
}
impl CoreConfig {
	/// Wraps a store; nothing is read until first access.
	pub fn new(store: Arc<dyn ConfigStore>) -> Self {
		Self { repository: ConfigRepository::new(store) }
	}

	/// Opens the core document under `paths`.
	pub fn open(paths: &ConfigPaths) -> Self {
		Self::new(Arc::new(DiskStore::new(paths.core_config())))
	}

	/// Routes persistence failures to `handler`.
	pub fn with_error_handler<F>(self, handler: F) -> Self
	where
		F: 'static + Send + Sync + Fn(&ConfigPersistenceError),
	{
		Self { repository: self.repository.with_error_handler(handler) }
	}

	/// Underlying repository for reads and writes not covered by typed accessors.
	pub fn repository(&self) -> &ConfigRepository<CoreConfigData> {
		&self.repository
	}

	/// Clone of the whole document.
	pub fn snapshot(&self) -> CoreConfigData {
		self.repository.snapshot()
	}

	/// Cloud Foundry API endpoint.
	pub fn api_endpoint(&self) -> String {
		self.repository.read(|c| c.api_endpoint.clone())
	}

	/// Sets the Cloud Foundry API endpoint.
	pub fn set_api_endpoint(&self, endpoint: impl Into<String>) {
		let endpoint = endpoint.into();

		self.repository.write(|c| c.api_endpoint = endpoint);
	}

	/// Console endpoint.
	pub fn console_endpoint(&self) -> String {
		self.repository.read(|c| c.console_endpoint.clone())
	}

	/// Sets the console endpoint.
	pub fn set_console_endpoint(&self, endpoint: impl Into<String>) {
		let endpoint = endpoint.into();

		self.repository.write(|c| c.console_endpoint = endpoint);
	}

	/// IAM endpoint.
	pub fn iam_endpoint(&self) -> String {
		self.repository.read(|c| c.iam_endpoint.clone())
	}

	/// Sets the IAM endpoint.
	pub fn set_iam_endpoint(&self, endpoint: impl Into<String>) {
		let endpoint = endpoint.into();

		self.repository.write(|c| c.iam_endpoint = endpoint);
	}

	/// UAA endpoint.
	pub fn uaa_endpoint(&self) -> String {
		self.repository.read(|c| c.uaa_endpoint.clone())
	}

	/// Sets the UAA endpoint.
	pub fn set_uaa_endpoint(&self, endpoint: impl Into<String>) {
		let endpoint = endpoint.into();

		self.repository.write(|c| c.uaa_endpoint = endpoint);
	}

	/// Targeted region name.
	pub fn region(&self) -> String {
		self.repository.read(|c| c.region.clone())
	}

	/// Targets a region by name and identifier.
	pub fn set_region(&self, name: impl Into<String>, id: impl Into<String>) {
		let (name, id) = (name.into(), id.into());

		self.repository.write(|c| {
			c.region = name;
			c.region_id = id;
		});
	}

	/// Targeted account.
	pub fn account(&self) -> AccountMeta {
		self.repository.read(|c| c.account.clone())
	}

	/// Targets an account.
	pub fn set_account(&self, account: AccountMeta) {
		self.repository.write(|c| c.account = account);
	}

	/// Stored `(access, refresh)` pair for `slot`; empty strings when absent.
	pub fn tokens(&self, slot: TokenSlot) -> (String, String) {
		self.repository.read(|c| {
			let (access, refresh) = c.token_fields(slot);

			(access.to_owned(), refresh.to_owned())
		})
	}

	/// Replaces both tokens of `slot` in one write.
	pub fn set_tokens(&self, slot: TokenSlot, access: impl Into<String>, refresh: impl Into<String>) {
		let (access, refresh) = (access.into(), refresh.into());

		self.repository.write(|c| {
			let (access_field, refresh_field) = c.token_fields_mut(slot);

			*access_field = access;
			*refresh_field = refresh;
		});
	}

	/// Stores an issued token into `slot` in one write.
	///
	/// Both tokens are replaced, including with an empty refresh token. A companion UAA pair
	/// carried by an IAM token is stored alongside it.
	pub fn store_token(&self, slot: TokenSlot, token: &Token) {
		let access = token.access_token.expose().to_owned();
		let refresh = token.refresh_token_str().to_owned();
		let companion = match (slot, &token.uaa) {
			(TokenSlot::Iam, Some(uaa)) => Some((
				uaa.access_token.expose().to_owned(),
				uaa.refresh_token.as_ref().map(|t| t.expose().to_owned()).unwrap_or_default(),
			)),
			_ => None,
		};
		let updated_at = token.issued_at.unix_timestamp();

		self.repository.write(|c| {
			let (access_field, refresh_field) = c.token_fields_mut(slot);

			*access_field = access;
			*refresh_field = refresh;

			if let Some((uaa_access, uaa_refresh)) = companion {
				c.uaa_token = uaa_access;
				c.uaa_refresh_token = uaa_refresh;
			}

			c.last_session_update_time = updated_at;
		});
	}

	/// Drops every credential and the targeted account, keeping endpoints and settings.
	pub fn clear_session(&self) {
		self.repository.write(|c| {
			c.iam_token.clear();
			c.iam_refresh_token.clear();
			c.uaa_token.clear();
			c.uaa_refresh_token.clear();
			c.account = AccountMeta::default();
			c.is_logged_in_as_cri = false;
			c.cri_type.clear();
			c.trusted_profile_id.clear();
			c.trusted_profile_crn.clear();
			c.last_session_update_time = 0;
		});
	}

	/// Returns `true` when any access token is stored.
	pub fn is_logged_in(&self) -> bool {
		self.repository.read(|c| !c.iam_token.is_empty() || !c.uaa_token.is_empty())
	}

	/// Claims of the stored IAM access token; `None` when no token is stored.
	pub fn iam_token_claims(&self) -> Option<Result<TokenClaims, ClaimsError>> {
		let token = self.repository.read(|c| c.iam_token.clone());

		(!token.is_empty()).then(|| TokenClaims::parse(&token))
	}

	/// Trusted profile of a VPC compute-resource login, if the session is one.
	pub fn compute_resource_login(&self) -> Option<TrustedProfileRequest> {
		self.repository.read(|c| {
			(c.is_logged_in_as_cri && c.cri_type == COMPUTE_RESOURCE_TYPE_VPC).then(|| {
				TrustedProfileRequest {
					id: (!c.trusted_profile_id.is_empty()).then(|| c.trusted_profile_id.clone()),
					crn: (!c.trusted_profile_crn.is_empty()).then(|| c.trusted_profile_crn.clone()),
				}
			})
		})
	}

	/// Records a VPC compute-resource login for later renewal.
	pub fn set_compute_resource_login(&self, profile: &TrustedProfileRequest) {
		let id = profile.id.clone().unwrap_or_default();
		let crn = profile.crn.clone().unwrap_or_default();

		self.repository.write(|c| {
			c.is_logged_in_as_cri = true;
			c.cri_type = COMPUTE_RESOURCE_TYPE_VPC.into();
			c.trusted_profile_id = id;
			c.trusted_profile_crn = crn;
		});
	}

	/// Stores a compute-resource IAM token together with the profile it was issued for, in
	/// one write. Such tokens carry no refresh token.
	pub fn store_compute_resource_session(&self, profile: &TrustedProfileRequest, token: &Token) {
		let access = token.access_token.expose().to_owned();
		let id = profile.id.clone().unwrap_or_default();
		let crn = profile.crn.clone().unwrap_or_default();
		let updated_at = token.issued_at.unix_timestamp();

		self.repository.write(|c| {
			c.iam_token = access;
			c.iam_refresh_token.clear();
			c.uaa_token.clear();
			c.uaa_refresh_token.clear();
			c.is_logged_in_as_cri = true;
			c.cri_type = COMPUTE_RESOURCE_TYPE_VPC.into();
			c.trusted_profile_id = id;
			c.trusted_profile_crn = crn;
			c.last_session_update_time = updated_at;
		});
	}

	/// Configured plugin repositories.
	pub fn plugin_repos(&self) -> Vec<PluginRepo> {
		self.repository.read(|c| c.plugin_repos.clone())
	}

	/// Looks up a repository by name, ignoring ASCII case.
	pub fn plugin_repo(&self, name: &str) -> Option<PluginRepo> {
		self.repository
			.read(|c| c.plugin_repos.iter().find(|repo| repo.name.eq_ignore_ascii_case(name)).cloned())
	}

	/// Replaces the repository with the same name (ignoring ASCII case) or appends it.
	pub fn set_plugin_repo(&self, repo: PluginRepo) {
		self.repository.write(|c| {
			match c.plugin_repos.iter_mut().find(|existing| existing.name.eq_ignore_ascii_case(&repo.name)) {
				Some(existing) => *existing = repo,
				None => c.plugin_repos.push(repo),
			}
		});
	}

	/// Removes the named repository; returns whether one was removed.
	pub fn unset_plugin_repo(&self, name: &str) -> bool {
		self.repository.write(|c| {
			let before = c.plugin_repos.len();

			c.plugin_repos.retain(|repo| !repo.name.eq_ignore_ascii_case(name));

			c.plugin_repos.len() != before
		})
	}

	/// Configured HTTP timeout.
	pub fn http_timeout(&self) -> Option<StdDuration> {
		self.repository.read(|c| (c.http_timeout > 0).then(|| StdDuration::from_secs(c.http_timeout)))
	}

	/// Sets or clears the HTTP timeout, rounded down to whole seconds.
	pub fn set_http_timeout(&self, timeout: Option<StdDuration>) {
		let seconds = timeout.map(|timeout| timeout.as_secs()).unwrap_or_default();

		self.repository.write(|c| c.http_timeout = seconds);
	}

	/// Whether the CLI version check is disabled.
	pub fn check_cli_version_disabled(&self) -> bool {
		self.repository.read(|c| c.check_cli_version_disabled)
	}

	/// Enables or disables the CLI version check.
	pub fn set_check_cli_version_disabled(&self, disabled: bool) {
		self.repository.write(|c| c.check_cli_version_disabled = disabled);
	}

	/// Whether usage statistics are disabled.
	pub fn usage_stats_disabled(&self) -> bool {
		self.repository.read(|c| c.usage_stats_disabled)
	}

	/// Enables or disables usage statistics.
	pub fn set_usage_stats_disabled(&self, disabled: bool) {
		self.repository.write(|c| c.usage_stats_disabled = disabled);
	}

	/// Returns `true` when the message of the day was last shown at least 24 hours before
	/// `now`, or never.
	pub fn should_show_message_of_the_day(&self, now: OffsetDateTime) -> bool {
		let last_shown = self.repository.read(|c| c.message_of_the_day_time);

		match OffsetDateTime::from_unix_timestamp(last_shown) {
			Ok(last_shown) if last_shown.unix_timestamp() > 0 =>
				now - last_shown >= MESSAGE_OF_THE_DAY_INTERVAL,
			_ => true,
		}
	}

	/// Records that the message of the day was shown at `now`.
	pub fn mark_message_of_the_day_shown(&self, now: OffsetDateTime) {
		let shown_at = now.unix_timestamp();

		self.repository.write(|c| c.message_of_the_day_time = shown_at);
	}

	/// Last time the session tokens were written.
	pub fn last_session_update_time(&self) -> Option<OffsetDateTime> {
		let updated_at = self.repository.read(|c| c.last_session_update_time);

		(updated_at > 0).then(|| OffsetDateTime::from_unix_timestamp(updated_at).ok()).flatten()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::{auth::claims::test_jwt, store::MemoryStore};

	fn config() -> (CoreConfig, MemoryStore) {
		let store = MemoryStore::default();

		(CoreConfig::new(Arc::new(store.clone())), store)
	}

	#[test]
	fn fresh_config_seeds_default_repo() {
		let (config, store) = config();

		assert_eq!(
			config.plugin_repos(),
			vec![PluginRepo::new(DEFAULT_PLUGIN_REPO_NAME, DEFAULT_PLUGIN_REPO_URL)]
		);

		let persisted: serde_json::Value =
			serde_json::from_slice(&store.contents().expect("Seed should be persisted."))
				.expect("Seed should be JSON.");

		assert_eq!(persisted["PluginRepos"][0]["Name"], "IBM Cloud");
		assert_eq!(persisted["PluginRepos"][0]["URL"], "https://plugins.cloud.ibm.com");
	}

	#[test]
	fn store_token_writes_companion_pair_once() {
		let (config, store) = config();
		let token = Token::builder()
			.access_token("iam-access")
			.refresh_token("iam-refresh")
			.uaa_token("uaa-access", "uaa-refresh")
			.issued_at(macros::datetime!(2025-01-01 00:00 UTC))
			.expires_in(Duration::hours(1))
			.build()
			.expect("Token fixture should build.");

		config.tokens(TokenSlot::Iam);

		let saves = store.saves();

		config.store_token(TokenSlot::Iam, &token);

		assert_eq!(store.saves(), saves + 1);
		assert_eq!(config.tokens(TokenSlot::Iam), ("iam-access".into(), "iam-refresh".into()));
		assert_eq!(config.tokens(TokenSlot::Uaa), ("uaa-access".into(), "uaa-refresh".into()));
		assert_eq!(config.last_session_update_time(), Some(macros::datetime!(2025-01-01 00:00 UTC)));
		assert!(config.is_logged_in());

		config.clear_session();

		assert!(!config.is_logged_in());
		assert_eq!(config.tokens(TokenSlot::Uaa), (String::new(), String::new()));
	}

	#[test]
	fn message_of_the_day_is_gated_daily() {
		let (config, _) = config();
		let shown = macros::datetime!(2025-01-01 12:00 UTC);

		assert!(config.should_show_message_of_the_day(shown));

		config.mark_message_of_the_day_shown(shown);

		assert!(!config.should_show_message_of_the_day(shown + Duration::hours(23)));
		assert!(config.should_show_message_of_the_day(shown + Duration::hours(24)));
	}

	#[test]
	fn claims_come_from_stored_iam_token() {
		let (config, _) = config();

		assert!(config.iam_token_claims().is_none());

		config.set_tokens(
			TokenSlot::Iam,
			test_jwt(&serde_json::json!({ "iam_id": "IBMid-42", "exp": 1_735_693_200 })),
			"",
		);

		let claims = config
			.iam_token_claims()
			.expect("Claims should be present.")
			.expect("Claims should parse.");

		assert_eq!(claims.iam_id, "IBMid-42");
	}

	#[test]
	fn compute_resource_login_round_trips() {
		let (config, _) = config();

		assert!(config.compute_resource_login().is_none());

		config.set_compute_resource_login(&TrustedProfileRequest::by_crn("crn:v1:profile"));

		assert_eq!(
			config.compute_resource_login(),
			Some(TrustedProfileRequest { id: None, crn: Some("crn:v1:profile".into()) })
		);
	}

	#[test]
	fn http_timeout_round_trips() {
		let (config, _) = config();

		assert_eq!(config.http_timeout(), None);

		config.set_http_timeout(Some(StdDuration::from_secs(45)));

		assert_eq!(config.http_timeout(), Some(StdDuration::from_secs(45)));
	}
}
