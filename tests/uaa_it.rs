#![cfg(all(feature = "reqwest", feature = "test"))]

// crates.io
use httpmock::prelude::*;
// self
use cloud_cli_auth::{
	_preludet::*,
	auth::TokenRequest,
	error::ServerError,
	provider::{UaaClient, UaaDescriptor},
};

#[tokio::test]
async fn passcode_exchange_uses_cf_client() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token").header("authorization", "Basic Y2Y6");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"uaa-access\",\"refresh_token\":\"uaa-refresh\",\"token_type\":\"bearer\",\"scope\":\"cloud_controller.read\",\"expires_in\":599}",
			);
		})
		.await;
	let token = test_uaa_client(&server.base_url())
		.get_token(TokenRequest::uaa_passcode("123456"))
		.await
		.expect("UAA passcode exchange should succeed.");

	mock.assert_async().await;

	assert_eq!(token.access_token.expose(), "uaa-access");
	assert_eq!(token.refresh_token_str(), "uaa-refresh");
	assert_eq!(token.scope.as_deref(), Some("cloud_controller.read"));
	assert_eq!(token.authorization_header(), "Bearer uaa-access");
}

#[tokio::test]
async fn password_form_is_posted_to_oauth_token() {
	let transport = Arc::new(RecordingHttpClient::default().respond(
		200,
		"{\"access_token\":\"a\",\"refresh_token\":\"r\",\"expires_in\":60}",
	));
	let descriptor =
		UaaDescriptor::parse("https://uaa.example.com/").expect("UAA descriptor should parse.");

	UaaClient::<RecordingHttpClient>::new(descriptor, transport.clone())
		.get_token(TokenRequest::password("user@example.com", "secret"))
		.await
		.expect("UAA password exchange should succeed.");

	let requests = transport.requests();
	let form = requests[0].form();

	assert_eq!(requests[0].uri, "https://uaa.example.com/oauth/token");
	assert_eq!(requests[0].header("accept"), Some("application/json"));
	assert_eq!(form.get("grant_type").map(String::as_str), Some("password"));
	assert_eq!(form.get("username").map(String::as_str), Some("user@example.com"));
	assert_eq!(form.get("password").map(String::as_str), Some("secret"));
}

#[tokio::test]
async fn invalid_token_requires_login() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(401)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid-token\",\"error_description\":\"Token has expired.\"}");
		})
		.await;
	let err = test_uaa_client(&server.base_url())
		.get_token(TokenRequest::refresh_token("stale"))
		.await
		.expect_err("Rejected refresh should fail.");

	mock.assert_async().await;

	assert!(matches!(&err, Error::InvalidToken { message } if message == "Token has expired."));
	assert!(err.requires_login());
}

#[tokio::test]
async fn unknown_error_keeps_code_and_description() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(400)
				.header("content-type", "application/json")
				.body("{\"error\":\"unauthorized\",\"error_description\":\"Bad credentials\"}");
		})
		.await;
	let err = test_uaa_client(&server.base_url())
		.get_token(TokenRequest::password("user", "wrong"))
		.await
		.expect_err("Bad credentials should fail.");

	mock.assert_async().await;

	match err {
		Error::Server(ServerError { status, code, message }) => {
			assert_eq!(status, 400);
			assert_eq!(code.as_deref(), Some("unauthorized"));
			assert_eq!(message, "Bad credentials");
		},
		other => panic!("Unexpected error: {other:?}"),
	}
}
