//! Credential pair, identity snapshot, and the stored session record that binds them.

// self
use crate::{
	_prelude::*,
	auth::{Role, UserId},
};

/// Bearer or refresh token; `Debug` and `Display` never print the value.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a token issued by the backend.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Raw token, for the `Authorization` header and the refresh body only.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Whether the backend issued a blank token.
	pub fn is_blank(&self) -> bool {
		self.0.trim().is_empty()
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("TokenSecret(<redacted>)")
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Access/refresh token pair issued by `/auth/login` and rotated by `/auth/refresh`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
	/// Bearer credential attached to every authenticated request.
	pub access_token: TokenSecret,
	/// Credential exchanged for a fresh pair once the access token expires.
	pub refresh_token: TokenSecret,
	/// Token scheme reported by the backend; always `bearer` in practice.
	#[serde(default = "default_token_type")]
	pub token_type: String,
}
impl CredentialPair {
	/// Creates a bearer pair.
	pub fn bearer(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
		Self {
			access_token: TokenSecret::new(access_token),
			refresh_token: TokenSecret::new(refresh_token),
			token_type: default_token_type(),
		}
	}
}
impl Debug for CredentialPair {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialPair")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &"<redacted>")
			.field("token_type", &self.token_type)
			.finish()
	}
}

/// Who is signed in; captured at login and never touched by refreshes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
	/// Backend user identifier.
	pub id: UserId,
	/// Login e-mail address.
	pub email: String,
	/// Name shown in the shell header.
	#[serde(alias = "displayName", alias = "full_name")]
	pub display_name: String,
	/// Role label used by the shell to gate navigation.
	pub role: Role,
}

/// The single persisted record: identity plus its current credential pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
	/// Identity snapshot taken at login.
	pub user: Identity,
	/// Current credentials; replaced in place on every successful refresh.
	pub tokens: CredentialPair,
}

/// Body of `POST /auth/login`.
#[derive(Clone, Serialize)]
pub struct LoginRequest {
	/// Account e-mail.
	pub email: String,
	/// Account password.
	pub password: String,
}
impl LoginRequest {
	/// Creates a login body.
	pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
		Self { email: email.into(), password: password.into() }
	}
}
impl Debug for LoginRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LoginRequest")
			.field("email", &self.email)
			.field("password", &"<redacted>")
			.finish()
	}
}

/// Payload of a successful `POST /auth/login`.
#[derive(Clone, Debug, Deserialize)]
pub struct LoginResponse {
	/// Issued credentials, flattened as `access_token`, `refresh_token`, `token_type`.
	#[serde(flatten)]
	pub tokens: CredentialPair,
	/// Identity of the signed-in user.
	pub user: Identity,
}
impl From<LoginResponse> for StoredSession {
	fn from(value: LoginResponse) -> Self {
		Self { user: value.user, tokens: value.tokens }
	}
}

/// Body of `POST /auth/refresh`.
#[derive(Serialize)]
pub(crate) struct RefreshRequest<'a> {
	pub(crate) refresh_token: &'a str,
}

fn default_token_type() -> String {
	"bearer".into()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn login_response_flattens_credentials() {
		let payload = r#"{
			"access_token": "acc",
			"refresh_token": "ref",
			"token_type": "bearer",
			"user": {
				"id": 7,
				"email": "ops@school.test",
				"full_name": "Ops Desk",
				"role": "Super Admin"
			}
		}"#;
		let response: LoginResponse =
			serde_json::from_str(payload).expect("Login payload should deserialize.");
		let session = StoredSession::from(response);

		assert_eq!(session.tokens.access_token.expose(), "acc");
		assert_eq!(session.tokens.refresh_token.expose(), "ref");
		assert_eq!(session.user.id.as_ref(), "7");
		assert_eq!(session.user.display_name, "Ops Desk");
		assert_eq!(session.user.role.as_ref(), "Super Admin");
	}

	#[test]
	fn credential_debug_redacts_tokens() {
		let pair = CredentialPair::bearer("visible-access", "visible-refresh");
		let rendered = format!("{pair:?}");

		assert!(!rendered.contains("visible-access"));
		assert!(!rendered.contains("visible-refresh"));
	}

	#[test]
	fn secrets_redact_but_persist_verbatim() {
		let secret = TokenSecret::new("eyJhbGciOi.payload.sig");

		assert_eq!(format!("{secret:?}"), "TokenSecret(<redacted>)");
		assert_eq!(secret.to_string(), "<redacted>");
		assert_eq!(
			serde_json::to_string(&secret).expect("Secret should serialize."),
			"\"eyJhbGciOi.payload.sig\""
		);
		assert!(TokenSecret::new("  ").is_blank());
	}

	#[test]
	fn token_type_defaults_to_bearer() {
		let pair: CredentialPair =
			serde_json::from_str(r#"{"access_token":"a","refresh_token":"r"}"#)
				.expect("Pair without token_type should deserialize.");

		assert_eq!(pair.token_type, "bearer");
	}
}
