//! Protocol-agnostic token request model.
//!
//! A [`TokenRequest`] fixes its [`GrantType`] at construction and accumulates response
//! types and form parameters until a backend client serializes it into an outgoing form
//! body through [`TokenRequest::serialize`]. Nothing here performs I/O; malformed values are
//! rejected downstream by the backend.

// crates.io
use url::form_urlencoded::{Serializer, Target};
// self
use crate::_prelude::*;

/// Grant types understood by the IAM and UAA token endpoints.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
	/// Username + password grant (IAM and UAA).
	Password,
	/// IAM API key grant.
	ApiKey,
	/// IAM one-time passcode grant.
	OnetimePasscode,
	/// Authorization code grant.
	AuthorizationCode,
	/// Refresh token grant.
	RefreshToken,
	/// IAM delegated refresh token grant.
	DelegatedRefreshToken,
	/// IAM compute-resource token grant used by trusted profiles.
	ComputeResourceToken,
}
impl GrantType {
	/// Returns the wire identifier for the grant type.
	pub const fn as_str(self) -> &'static str {
		match self {
			GrantType::Password => "password",
			GrantType::ApiKey => "urn:ibm:params:oauth:grant-type:apikey",
			GrantType::OnetimePasscode => "urn:ibm:params:oauth:grant-type:passcode",
			GrantType::AuthorizationCode => "authorization_code",
			GrantType::RefreshToken => "refresh_token",
			GrantType::DelegatedRefreshToken =>
				"urn:ibm:params:oauth:grant-type:delegated-refresh-token",
			GrantType::ComputeResourceToken => "urn:ibm:params:oauth:grant-type:cr-token",
		}
	}
}
impl Display for GrantType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Token shapes a caller can request from the IAM backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
	/// Plain IAM token.
	CloudIam,
	/// Companion UAA token minted in the same exchange.
	Uaa,
	/// Delegated refresh token for another client.
	DelegatedRefreshToken,
}
impl ResponseType {
	/// Returns the wire identifier for the response type.
	pub const fn as_str(self) -> &'static str {
		match self {
			ResponseType::CloudIam => "cloud_iam",
			ResponseType::Uaa => "uaa",
			ResponseType::DelegatedRefreshToken => "delegated_refresh_token",
		}
	}
}
impl Display for ResponseType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Destination for form fields written by [`TokenRequest::serialize`].
pub trait FormSink {
	/// Appends one `key=value` pair.
	fn append_field(&mut self, key: &str, value: &str);
}
impl<T> FormSink for Serializer<'_, T>
where
	T: Target,
{
	fn append_field(&mut self, key: &str, value: &str) {
		self.append_pair(key, value);
	}
}
impl FormSink for BTreeMap<String, String> {
	fn append_field(&mut self, key: &str, value: &str) {
		self.insert(key.to_owned(), value.to_owned());
	}
}
impl FormSink for Vec<(String, String)> {
	fn append_field(&mut self, key: &str, value: &str) {
		self.push((key.to_owned(), value.to_owned()));
	}
}

/// Trusted-profile selector attached to compute-resource token grants.
///
/// Every populated field is forwarded; the IAM backend decides which combinations it
/// accepts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSelector {
	/// Trusted profile identifier.
	pub id: Option<String>,
	/// Trusted profile name.
	pub name: Option<String>,
	/// Trusted profile CRN.
	pub crn: Option<String>,
}
impl ProfileSelector {
	/// Selects a profile by identifier.
	pub fn by_id(id: impl Into<String>) -> Self {
		Self { id: Some(id.into()), ..Default::default() }
	}

	/// Selects a profile by name.
	pub fn by_name(name: impl Into<String>) -> Self {
		Self { name: Some(name.into()), ..Default::default() }
	}

	/// Selects a profile by CRN.
	pub fn by_crn(crn: impl Into<String>) -> Self {
		Self { crn: Some(crn.into()), ..Default::default() }
	}
}

/// Outgoing authentication attempt, consumed once by a backend client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenRequest {
	grant_type: GrantType,
	response_types: Vec<ResponseType>,
	params: BTreeMap<String, String>,
}
impl TokenRequest {
	/// Creates an empty request scoped to the provided grant type.
	pub fn new(grant_type: GrantType) -> Self {
		Self { grant_type, response_types: Vec::new(), params: BTreeMap::new() }
	}

	/// Username + password request.
	pub fn password(username: impl Into<String>, password: impl Into<String>) -> Self {
		Self::new(GrantType::Password).with_param("username", username).with_param("password", password)
	}

	/// IAM API key request.
	pub fn api_key(api_key: impl Into<String>) -> Self {
		Self::new(GrantType::ApiKey).with_param("apikey", api_key)
	}

	/// IAM one-time passcode request.
	pub fn onetime_passcode(passcode: impl Into<String>) -> Self {
		Self::new(GrantType::OnetimePasscode).with_param("passcode", passcode)
	}

	/// UAA one-time passcode request (a `password` grant carrying only a passcode).
	pub fn uaa_passcode(passcode: impl Into<String>) -> Self {
		Self::new(GrantType::Password).with_param("passcode", passcode)
	}

	/// Authorization code request.
	pub fn authorization_code(code: impl Into<String>, redirect_uri: impl Into<String>) -> Self {
		Self::new(GrantType::AuthorizationCode)
			.with_param("code", code)
			.with_param("redirect_uri", redirect_uri)
	}

	/// Refresh token request.
	pub fn refresh_token(refresh_token: impl Into<String>) -> Self {
		Self::new(GrantType::RefreshToken).with_param("refresh_token", refresh_token)
	}

	/// Exchanges a delegated refresh token issued to this client.
	pub fn delegated_refresh_token(refresh_token: impl Into<String>) -> Self {
		Self::new(GrantType::DelegatedRefreshToken).with_param("refresh_token", refresh_token)
	}

	/// Compute-resource token request assuming the selected trusted profile.
	pub fn compute_resource_token(cr_token: impl Into<String>, profile: &ProfileSelector) -> Self {
		let mut request = Self::new(GrantType::ComputeResourceToken).with_param("cr_token", cr_token);

		for (key, value) in
			[("profile_id", &profile.id), ("profile_name", &profile.name), ("profile_crn", &profile.crn)]
		{
			if let Some(value) = value.as_deref().filter(|value| !value.is_empty()) {
				request.set_param(key, value);
			}
		}

		request
	}

	/// Grant type fixed at construction.
	pub fn grant_type(&self) -> GrantType {
		self.grant_type
	}

	/// Requested response types, in order.
	pub fn response_types(&self) -> &[ResponseType] {
		&self.response_types
	}

	/// Returns `true` when the request asks for the given response type.
	pub fn wants(&self, response_type: ResponseType) -> bool {
		self.response_types.contains(&response_type)
	}

	/// Accumulated form parameters.
	pub fn params(&self) -> &BTreeMap<String, String> {
		&self.params
	}

	/// Looks up a single parameter.
	pub fn param(&self, key: &str) -> Option<&str> {
		self.params.get(key).map(String::as_str)
	}

	/// Sets a parameter, overwriting any previous value for `key`.
	pub fn set_param(&mut self, key: impl Into<String>, value: impl Into<String>) {
		self.params.insert(key.into(), value.into());
	}

	/// Replaces the response-type list, dropping duplicates while keeping first-seen order.
	pub fn set_response_types<I>(&mut self, response_types: I)
	where
		I: IntoIterator<Item = ResponseType>,
	{
		self.response_types.clear();

		for response_type in response_types {
			if !self.response_types.contains(&response_type) {
				self.response_types.push(response_type);
			}
		}
	}

	/// Builder form of [`set_param`](Self::set_param).
	pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.set_param(key, value);

		self
	}

	/// Builder form of [`set_response_types`](Self::set_response_types).
	pub fn with_response_types<I>(mut self, response_types: I) -> Self
	where
		I: IntoIterator<Item = ResponseType>,
	{
		self.set_response_types(response_types);

		self
	}

	/// Applies a caller-defined option.
	pub fn with_option(mut self, option: impl FnOnce(&mut Self)) -> Self {
		option(&mut self);

		self
	}

	/// Scopes the token to a billing account.
	pub fn with_bss_account(self, account_id: impl Into<String>) -> Self {
		self.with_param("bss_account", account_id)
	}

	/// Scopes the token to a classic infrastructure account.
	pub fn with_ims_account(self, account_id: impl Into<String>) -> Self {
		self.with_param("ims_account", account_id)
	}

	/// Supplies a time-based MFA code.
	pub fn with_totp(self, code: impl Into<String>) -> Self {
		self.with_param("totp", code)
	}

	/// Answers an MFA security question.
	pub fn with_security_question(self, question_id: u32, answer: impl Into<String>) -> Self {
		self.with_param("security_question_id", question_id.to_string())
			.with_param("security_question_answer", answer)
	}

	/// Names the clients allowed to redeem a requested delegated refresh token.
	pub fn with_receiver_client_ids<I, S>(self, client_ids: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let joined = client_ids.into_iter().map(|id| id.as_ref().to_owned()).collect::<Vec<_>>();

		self.with_param("receiver_client_ids", joined.join(","))
	}

	/// Writes `grant_type`, the comma-joined `response_type` (empty when unset, meaning the
	/// backend default), and every accumulated parameter into `sink`.
	pub fn serialize<S>(&self, sink: &mut S)
	where
		S: ?Sized + FormSink,
	{
		let response_type =
			self.response_types.iter().map(|value| value.as_str()).collect::<Vec<_>>().join(",");

		sink.append_field("grant_type", self.grant_type.as_str());
		sink.append_field("response_type", &response_type);

		for (key, value) in &self.params {
			if key != "grant_type" && key != "response_type" {
				sink.append_field(key, value);
			}
		}
	}

	/// Serializes the request into an `application/x-www-form-urlencoded` body.
	pub fn to_form(&self) -> String {
		let mut serializer = Serializer::new(String::new());

		self.serialize(&mut serializer);

		serializer.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	const ALL_GRANTS: [GrantType; 7] = [
		GrantType::Password,
		GrantType::ApiKey,
		GrantType::OnetimePasscode,
		GrantType::AuthorizationCode,
		GrantType::RefreshToken,
		GrantType::DelegatedRefreshToken,
		GrantType::ComputeResourceToken,
	];

	fn fields(request: &TokenRequest) -> BTreeMap<String, String> {
		let mut sink = BTreeMap::new();

		request.serialize(&mut sink);

		sink
	}

	#[test]
	fn every_grant_serializes_its_grant_type() {
		for grant in ALL_GRANTS {
			let request = TokenRequest::new(grant).with_param("grant_type", "spoofed");
			let form = fields(&request);

			assert_eq!(form.get("grant_type").map(String::as_str), Some(grant.as_str()));
			assert!(!grant.as_str().is_empty());
		}
	}

	#[test]
	fn response_type_defaults_to_empty_and_joins_with_commas() {
		let request = TokenRequest::api_key("key");

		assert_eq!(fields(&request).get("response_type").map(String::as_str), Some(""));

		let request = request.with_response_types([
			ResponseType::CloudIam,
			ResponseType::Uaa,
			ResponseType::CloudIam,
		]);

		assert_eq!(
			fields(&request).get("response_type").map(String::as_str),
			Some("cloud_iam,uaa")
		);
		assert!(request.wants(ResponseType::Uaa));
		assert!(!request.wants(ResponseType::DelegatedRefreshToken));
	}

	#[test]
	fn params_are_last_write_wins() {
		let mut request = TokenRequest::password("alice", "first");

		request.set_param("password", "second");

		assert_eq!(request.param("password"), Some("second"));
		assert_eq!(request.params().len(), 2);
	}

	#[test]
	fn options_compose() {
		let request = TokenRequest::password("alice", "secret")
			.with_bss_account("acct-1")
			.with_ims_account("ims-2")
			.with_totp("123456")
			.with_security_question(3, "blue")
			.with_option(|request| request.set_param("custom", "yes"));
		let form = fields(&request);

		assert_eq!(form["bss_account"], "acct-1");
		assert_eq!(form["ims_account"], "ims-2");
		assert_eq!(form["totp"], "123456");
		assert_eq!(form["security_question_id"], "3");
		assert_eq!(form["security_question_answer"], "blue");
		assert_eq!(form["custom"], "yes");
		assert_eq!(request.grant_type(), GrantType::Password);
	}

	#[test]
	fn compute_resource_request_forwards_present_selectors() {
		let profile = ProfileSelector {
			id: Some("Profile-1".into()),
			name: Some(String::new()),
			crn: Some("crn:v1:profile".into()),
		};
		let form = fields(&TokenRequest::compute_resource_token("cr-token", &profile));

		assert_eq!(form["cr_token"], "cr-token");
		assert_eq!(form["profile_id"], "Profile-1");
		assert_eq!(form["profile_crn"], "crn:v1:profile");
		assert!(!form.contains_key("profile_name"));
	}

	#[test]
	fn form_encoding_escapes_values() {
		let form = TokenRequest::password("a@b.com", "p&ss w=rd").to_form();

		assert!(form.starts_with("grant_type=password&response_type=&"));
		assert!(form.contains("username=a%40b.com"));
		assert!(form.contains("password=p%26ss+w%3Drd"));
	}

	#[test]
	fn receiver_client_ids_are_comma_joined() {
		let request = TokenRequest::api_key("key")
			.with_response_types([ResponseType::CloudIam, ResponseType::DelegatedRefreshToken])
			.with_receiver_client_ids(["alpha", "beta"]);

		assert_eq!(request.param("receiver_client_ids"), Some("alpha,beta"));
	}
}
