use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Authenticated account as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    #[serde(default)]
    pub email: String,
}

/// One authenticated session.
///
/// The provider speaks camelCase on the wire; keep the rename scoped here so
/// the rest of the app never sees wire names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub access_token: String,
    /// Access token lifetime in seconds.
    pub access_token_expires_in: u64,
    pub refresh_token: String,
    pub user: User,
}

/// Envelope used by signup/signin responses.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SessionEnvelope {
    pub session: Option<Session>,
}

/// Error body the provider returns on non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ProviderErrorBody {
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ProviderErrorBody {
    pub(crate) fn display_message(&self) -> String {
        if let Some(message) = self.message.as_deref().filter(|m| !m.trim().is_empty()) {
            return message.to_string();
        }
        self.error
            .clone()
            .unwrap_or_else(|| "authentication request failed".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_payload_decodes_camel_case_fields() {
        let raw = r#"{
            "accessToken": "jwt-token",
            "accessTokenExpiresIn": 900,
            "refreshToken": "refresh-token",
            "user": { "id": "7f8a6e9c-4f2a-4f6e-b6ce-16e3f2f3fa11", "email": "a@b.test" }
        }"#;

        let session: Session = serde_json::from_str(raw).unwrap();
        assert_eq!(session.access_token, "jwt-token");
        assert_eq!(session.access_token_expires_in, 900);
        assert_eq!(session.refresh_token, "refresh-token");
        assert_eq!(session.user.email, "a@b.test");
    }

    #[test]
    fn signin_envelope_tolerates_null_session() {
        let raw = r#"{ "session": null, "mfa": null }"#;
        let envelope: SessionEnvelope = serde_json::from_str(raw).unwrap();
        assert!(envelope.session.is_none());
    }

    #[test]
    fn provider_error_body_prefers_message_over_error_code() {
        let body = ProviderErrorBody {
            status: Some(401),
            message: Some("Incorrect email or password".to_string()),
            error: Some("invalid-email-password".to_string()),
        };
        assert_eq!(body.display_message(), "Incorrect email or password");

        let bare = ProviderErrorBody {
            status: None,
            message: None,
            error: Some("invalid-request".to_string()),
        };
        assert_eq!(bare.display_message(), "invalid-request");
    }
}
