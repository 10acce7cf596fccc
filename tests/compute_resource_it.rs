#![cfg(all(feature = "reqwest", feature = "test"))]

// crates.io
use httpmock::prelude::*;
// self
use cloud_cli_auth::{
	_preludet::*,
	config::TokenSlot,
	error::ConfigError,
	flows::ComputeResourceRenewer,
	provider::TrustedProfileRequest,
};

async fn mock_metadata(server: &MockServer, profile_body: serde_json::Value, iam_access: &str) {
	let iam_body = format!(
		"{{\"access_token\":\"{iam_access}\",\"created_at\":\"2025-01-01T00:00:00Z\",\"expires_at\":\"2025-01-01T01:00:00Z\"}}"
	);

	server
		.mock_async(|when, then| {
			when.method(PUT).path("/instance_identity/v1/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"iit\",\"created_at\":\"2025-01-01T00:00:00Z\",\"expires_in\":300}",
			);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/instance_identity/v1/iam_token")
				.header("authorization", "Bearer iit")
				.json_body(profile_body);
			then.status(200).header("content-type", "application/json").body(iam_body);
		})
		.await;
}

#[tokio::test]
async fn login_stores_session_and_profile() {
	let server = MockServer::start_async().await;

	mock_metadata(&server, serde_json::json!({ "trusted_profile": { "id": "Profile-1" } }), "cr-1")
		.await;

	let (config, store) = memory_core_config();
	let renewer = ComputeResourceRenewer::new(test_vpc_client(&server.base_url()), config.clone());

	config.set_tokens(TokenSlot::Uaa, "stale-uaa", "stale-uaa-refresh");

	let saves = store.saves();
	let token =
		renewer.login(TrustedProfileRequest::by_id("Profile-1")).await.expect("Login should succeed.");

	assert_eq!(token.access_token.expose(), "cr-1");
	assert_eq!(store.saves(), saves + 1);
	assert_eq!(config.tokens(TokenSlot::Iam), ("cr-1".into(), String::new()));
	assert_eq!(config.tokens(TokenSlot::Uaa), (String::new(), String::new()));
	assert_eq!(config.compute_resource_login(), Some(TrustedProfileRequest::by_id("Profile-1")));
	assert_eq!(config.last_session_update_time().map(|t| t.unix_timestamp()), Some(1_735_689_600));
}

#[tokio::test]
async fn renew_uses_stored_profile() {
	let server = MockServer::start_async().await;

	mock_metadata(
		&server,
		serde_json::json!({ "trusted_profile": { "crn": "crn:v1:profile" } }),
		"cr-renewed",
	)
	.await;

	let (config, _) = memory_core_config();

	config.set_compute_resource_login(&TrustedProfileRequest::by_crn("crn:v1:profile"));
	config.set_tokens(TokenSlot::Iam, "cr-old", "");

	let token = ComputeResourceRenewer::new(test_vpc_client(&server.base_url()), config.clone())
		.renew()
		.await
		.expect("Renewal should succeed.");

	assert_eq!(token.access_token.expose(), "cr-renewed");
	assert_eq!(config.tokens(TokenSlot::Iam), ("cr-renewed".into(), String::new()));
}

#[tokio::test]
async fn renew_without_login_fails_locally() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(PUT).path("/instance_identity/v1/token");
			then.status(500);
		})
		.await;
	let (config, _) = memory_core_config();
	let err = ComputeResourceRenewer::new(test_vpc_client(&server.base_url()), config)
		.renew()
		.await
		.expect_err("Renewal without a stored login should fail.");

	mock.assert_calls_async(0).await;

	assert!(matches!(err, Error::Config(ConfigError::MissingComputeResourceLogin)));
}

#[tokio::test]
async fn conflicting_profile_skips_identity_request() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(PUT).path("/instance_identity/v1/token");
			then.status(500);
		})
		.await;
	let (config, store) = memory_core_config();
	let renewer = ComputeResourceRenewer::new(test_vpc_client(&server.base_url()), config.clone());
	let profile = TrustedProfileRequest { id: Some("Profile-1".into()), crn: Some("crn:v1:p".into()) };
	let err = renewer.login(profile).await.expect_err("Conflicting selectors should be rejected.");

	mock.assert_calls_async(0).await;

	assert!(matches!(err, Error::Config(ConfigError::ConflictingTrustedProfile)));
	assert_eq!(store.saves(), 0);
	assert!(config.compute_resource_login().is_none());
}
