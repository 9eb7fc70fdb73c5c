use std::time::Duration;

use serde::Serialize;
use snafu::{OptionExt, ResultExt};

use crate::error::{
    AuthResult, BuildClientSnafu, DecodeResponseSnafu, MissingSessionSnafu, ProviderSnafu,
    TransportSnafu,
};
use crate::types::{ProviderErrorBody, Session, SessionEnvelope};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// HTTP client for the identity session provider.
///
/// All calls are request/response; session lifecycle (persistence, refresh
/// scheduling) belongs to the caller.
pub struct AuthClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct EmailPasswordBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshTokenBody<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignOutBody<'a> {
    refresh_token: &'a str,
    all: bool,
}

#[derive(Debug, Serialize)]
struct ResetPasswordBody<'a> {
    email: &'a str,
    options: ResetPasswordOptions<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResetPasswordOptions<'a> {
    redirect_to: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChangePasswordBody<'a> {
    new_password: &'a str,
}

impl AuthClient {
    pub fn new(base_url: impl Into<String>) -> AuthResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context(BuildClientSnafu {
                stage: "build-auth-http-client",
            })?;

        Ok(Self {
            http,
            base_url: normalize_base_url(base_url.into()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn sign_up_email_password(&self, email: &str, password: &str) -> AuthResult<Session> {
        let stage = "sign-up-email-password";
        let response = self
            .post_json(
                stage,
                "signup/email-password",
                None,
                &EmailPasswordBody { email, password },
            )
            .await?;

        let envelope = response
            .json::<SessionEnvelope>()
            .await
            .context(DecodeResponseSnafu { stage })?;
        envelope.session.context(MissingSessionSnafu { stage })
    }

    pub async fn sign_in_email_password(&self, email: &str, password: &str) -> AuthResult<Session> {
        let stage = "sign-in-email-password";
        let response = self
            .post_json(
                stage,
                "signin/email-password",
                None,
                &EmailPasswordBody { email, password },
            )
            .await?;

        let envelope = response
            .json::<SessionEnvelope>()
            .await
            .context(DecodeResponseSnafu { stage })?;
        envelope.session.context(MissingSessionSnafu { stage })
    }

    /// Redeems a refresh token for a fresh session.
    pub async fn refresh_session(&self, refresh_token: &str) -> AuthResult<Session> {
        let stage = "refresh-session";
        let response = self
            .post_json(stage, "token", None, &RefreshTokenBody { refresh_token })
            .await?;

        response
            .json::<Session>()
            .await
            .context(DecodeResponseSnafu { stage })
    }

    /// Revokes the session behind `refresh_token`; `all` revokes every
    /// session of the account.
    pub async fn sign_out(&self, refresh_token: &str, all: bool) -> AuthResult<()> {
        self.post_json(
            "sign-out",
            "signout",
            None,
            &SignOutBody { refresh_token, all },
        )
        .await?;
        Ok(())
    }

    /// Sends a password-reset email pointing back at `redirect_to`.
    pub async fn reset_password(&self, email: &str, redirect_to: &str) -> AuthResult<()> {
        self.post_json(
            "reset-password",
            "user/password/reset",
            None,
            &ResetPasswordBody {
                email,
                options: ResetPasswordOptions { redirect_to },
            },
        )
        .await?;
        Ok(())
    }

    /// Changes the password of the session behind `access_token`.
    pub async fn change_password(&self, access_token: &str, new_password: &str) -> AuthResult<()> {
        self.post_json(
            "change-password",
            "user/password",
            Some(access_token),
            &ChangePasswordBody { new_password },
        )
        .await?;
        Ok(())
    }

    async fn post_json<B: Serialize>(
        &self,
        stage: &'static str,
        path: &str,
        bearer: Option<&str>,
        body: &B,
    ) -> AuthResult<reqwest::Response> {
        let endpoint = self.endpoint(path);
        let mut request = self.http.post(&endpoint).json(body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.context(TransportSnafu {
            stage,
            endpoint: endpoint.clone(),
        })?;

        let http_status = response.status();
        if http_status.is_success() {
            return Ok(response);
        }

        // The provider reports errors as {status, message, error}; fall back
        // to the transport status when the body is not decodable.
        let (status, message) = match response.json::<ProviderErrorBody>().await {
            Ok(body) => (
                body.status.unwrap_or(http_status.as_u16()),
                body.display_message(),
            ),
            Err(_) => (
                http_status.as_u16(),
                format!("authentication request failed with status {http_status}"),
            ),
        };

        tracing::warn!(stage, status, %message, "auth provider rejected request");
        ProviderSnafu {
            stage,
            status,
            message,
        }
        .fail()
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

fn normalize_base_url(raw: String) -> String {
    raw.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_join_normalizes_slashes() {
        let client = AuthClient::new("http://localhost:1337/v1/auth/").unwrap();
        assert_eq!(
            client.endpoint("/signin/email-password"),
            "http://localhost:1337/v1/auth/signin/email-password"
        );
        assert_eq!(
            client.endpoint("token"),
            "http://localhost:1337/v1/auth/token"
        );
    }

    #[test]
    fn request_bodies_use_provider_wire_names() {
        let refresh = serde_json::to_value(RefreshTokenBody {
            refresh_token: "r-1",
        })
        .unwrap();
        assert_eq!(refresh, serde_json::json!({ "refreshToken": "r-1" }));

        let sign_out = serde_json::to_value(SignOutBody {
            refresh_token: "r-1",
            all: true,
        })
        .unwrap();
        assert_eq!(
            sign_out,
            serde_json::json!({ "refreshToken": "r-1", "all": true })
        );

        let reset = serde_json::to_value(ResetPasswordBody {
            email: "a@b.test",
            options: ResetPasswordOptions {
                redirect_to: "parlor://change-password",
            },
        })
        .unwrap();
        assert_eq!(
            reset,
            serde_json::json!({
                "email": "a@b.test",
                "options": { "redirectTo": "parlor://change-password" }
            })
        );

        let change = serde_json::to_value(ChangePasswordBody {
            new_password: "hunter22",
        })
        .unwrap();
        assert_eq!(change, serde_json::json!({ "newPassword": "hunter22" }));
    }
}
