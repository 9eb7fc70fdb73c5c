use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use gpui::*;
use gpui_tokio_bridge::Tokio;
use parlor_auth::{AuthClient, AuthError, Session, User};
use serde::{Deserialize, Serialize};

use crate::config::ConfigStore;

pub const SESSION_FILE_NAME: &str = "session.json";

/// Redirect target embedded in password-reset emails.
const PASSWORD_RESET_REDIRECT: &str = "parlor://change-password";

/// Authentication state as the rest of the app sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStatus {
    /// A persisted refresh token is being redeemed; the outcome is unknown.
    Loading,
    Authenticated(User),
    SignedOut,
}

#[derive(Debug, Clone)]
pub struct SessionChanged {
    pub status: AuthStatus,
}

/// A provider call initiated by the user failed.
#[derive(Debug, Clone)]
pub struct AuthRequestFailed {
    pub message: String,
    pub status: Option<u16>,
}

#[derive(Debug, Clone, Copy)]
pub struct PasswordChanged;

#[derive(Debug, Clone, Copy)]
pub struct PasswordResetSent;

#[derive(Debug, Serialize, Deserialize)]
struct PersistedSession {
    refresh_token: String,
}

/// Owns the provider session: bootstrap from disk, token refresh, and
/// every credential flow the views trigger.
pub struct SessionState {
    client: Arc<AuthClient>,
    status: AuthStatus,
    session: Option<Session>,
    session_path: PathBuf,
    refresh_task: Option<Task<()>>,
}

impl EventEmitter<SessionChanged> for SessionState {}
impl EventEmitter<AuthRequestFailed> for SessionState {}
impl EventEmitter<PasswordChanged> for SessionState {}
impl EventEmitter<PasswordResetSent> for SessionState {}

impl SessionState {
    pub fn new(client: Arc<AuthClient>, cx: &mut Context<Self>) -> Self {
        Self::with_session_path(client, default_session_path(), cx)
    }

    pub fn with_session_path(
        client: Arc<AuthClient>,
        session_path: PathBuf,
        cx: &mut Context<Self>,
    ) -> Self {
        let persisted = load_persisted_session(&session_path);
        let status = if persisted.is_some() {
            AuthStatus::Loading
        } else {
            AuthStatus::SignedOut
        };

        let mut this = Self {
            client,
            status,
            session: None,
            session_path,
            refresh_task: None,
        };

        if let Some(persisted) = persisted {
            this.redeem_refresh_token(persisted.refresh_token, cx);
        }

        this
    }

    pub fn status(&self) -> &AuthStatus {
        &self.status
    }

    pub fn user(&self) -> Option<&User> {
        match &self.status {
            AuthStatus::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn access_token(&self) -> Option<&str> {
        self.session.as_ref().map(|session| session.access_token.as_str())
    }

    pub fn sign_in(&mut self, email: String, password: String, cx: &mut Context<Self>) {
        let client = self.client.clone();
        let request =
            Tokio::spawn(cx, async move { client.sign_in_email_password(&email, &password).await });

        cx.spawn(async move |this, cx| {
            let outcome = request.await;
            let _ = this.update(cx, |this, cx| match outcome {
                Ok(Ok(session)) => this.install_session(session, cx),
                Ok(Err(error)) => this.emit_auth_failure(&error, cx),
                Err(join_error) => this.emit_join_failure(join_error, cx),
            });
        })
        .detach();
    }

    pub fn sign_up(&mut self, email: String, password: String, cx: &mut Context<Self>) {
        let client = self.client.clone();
        let request =
            Tokio::spawn(cx, async move { client.sign_up_email_password(&email, &password).await });

        cx.spawn(async move |this, cx| {
            let outcome = request.await;
            let _ = this.update(cx, |this, cx| match outcome {
                Ok(Ok(session)) => this.install_session(session, cx),
                Ok(Err(error)) => this.emit_auth_failure(&error, cx),
                Err(join_error) => this.emit_join_failure(join_error, cx),
            });
        })
        .detach();
    }

    /// Signs out locally first; the provider call is best effort.
    pub fn sign_out(&mut self, all_sessions: bool, cx: &mut Context<Self>) {
        let refresh_token = self
            .session
            .take()
            .map(|session| session.refresh_token);

        self.clear_session(cx);

        let Some(refresh_token) = refresh_token else {
            return;
        };

        let client = self.client.clone();
        Tokio::spawn(cx, async move {
            if let Err(error) = client.sign_out(&refresh_token, all_sessions).await {
                tracing::warn!("provider sign-out failed: {error}");
            }
        })
        .detach();
    }

    pub fn change_password(&mut self, new_password: String, cx: &mut Context<Self>) {
        let Some(access_token) = self.access_token().map(str::to_string) else {
            cx.emit(AuthRequestFailed {
                message: "You are not signed in".to_string(),
                status: None,
            });
            return;
        };

        let client = self.client.clone();
        let request = Tokio::spawn(cx, async move {
            client.change_password(&access_token, &new_password).await
        });

        cx.spawn(async move |this, cx| {
            let outcome = request.await;
            let _ = this.update(cx, |this, cx| match outcome {
                Ok(Ok(())) => cx.emit(PasswordChanged),
                Ok(Err(error)) => this.emit_auth_failure(&error, cx),
                Err(join_error) => this.emit_join_failure(join_error, cx),
            });
        })
        .detach();
    }

    pub fn reset_password(&mut self, email: String, cx: &mut Context<Self>) {
        let client = self.client.clone();
        let request = Tokio::spawn(cx, async move {
            client
                .reset_password(&email, PASSWORD_RESET_REDIRECT)
                .await
        });

        cx.spawn(async move |this, cx| {
            let outcome = request.await;
            let _ = this.update(cx, |this, cx| match outcome {
                Ok(Ok(())) => cx.emit(PasswordResetSent),
                Ok(Err(error)) => this.emit_auth_failure(&error, cx),
                Err(join_error) => this.emit_join_failure(join_error, cx),
            });
        })
        .detach();
    }

    fn redeem_refresh_token(&mut self, refresh_token: String, cx: &mut Context<Self>) {
        let client = self.client.clone();
        let request = Tokio::spawn(cx, async move { client.refresh_session(&refresh_token).await });

        cx.spawn(async move |this, cx| {
            let outcome = request.await;
            let _ = this.update(cx, |this, cx| match outcome {
                Ok(Ok(session)) => this.install_session(session, cx),
                Ok(Err(error)) => {
                    tracing::warn!("failed to redeem persisted refresh token: {error}");
                    this.clear_session(cx);
                }
                Err(join_error) => {
                    tracing::warn!("refresh task failed to join: {join_error}");
                    this.clear_session(cx);
                }
            });
        })
        .detach();
    }

    fn install_session(&mut self, session: Session, cx: &mut Context<Self>) {
        if let Err(error) = persist_session(&self.session_path, &session.refresh_token) {
            tracing::warn!("failed to persist session: {error}");
        }

        self.status = AuthStatus::Authenticated(session.user.clone());
        self.schedule_refresh(session.access_token_expires_in, cx);
        self.session = Some(session);

        cx.emit(SessionChanged {
            status: self.status.clone(),
        });
        cx.notify();
    }

    fn clear_session(&mut self, cx: &mut Context<Self>) {
        self.session = None;
        self.refresh_task = None;
        self.status = AuthStatus::SignedOut;

        if self.session_path.exists()
            && let Err(error) = std::fs::remove_file(&self.session_path)
        {
            tracing::warn!("failed to remove persisted session: {error}");
        }

        cx.emit(SessionChanged {
            status: self.status.clone(),
        });
        cx.notify();
    }

    fn schedule_refresh(&mut self, expires_in_secs: u64, cx: &mut Context<Self>) {
        let delay = refresh_delay(expires_in_secs);

        self.refresh_task = Some(cx.spawn(async move |this, cx| {
            cx.background_executor().timer(delay).await;

            let _ = this.update(cx, |this, cx| {
                let Some(refresh_token) = this
                    .session
                    .as_ref()
                    .map(|session| session.refresh_token.clone())
                else {
                    return;
                };
                this.redeem_refresh_token(refresh_token, cx);
            });
        }));
    }

    fn emit_auth_failure(&mut self, error: &AuthError, cx: &mut Context<Self>) {
        let (message, status) = auth_failure_parts(error);
        tracing::warn!(?status, "auth request failed: {message}");
        cx.emit(AuthRequestFailed { message, status });
    }

    fn emit_join_failure(&mut self, join_error: gpui_tokio_bridge::JoinError, cx: &mut Context<Self>) {
        tracing::warn!("auth task failed to join: {join_error}");
        cx.emit(AuthRequestFailed {
            message: "The request could not be completed".to_string(),
            status: None,
        });
    }
}

/// When to refresh an access token that lives for `expires_in_secs`.
///
/// Refreshing at three quarters of the lifetime leaves room for retries
/// before the token actually lapses.
pub fn refresh_delay(expires_in_secs: u64) -> Duration {
    Duration::from_secs(expires_in_secs.saturating_mul(3) / 4)
}

/// Splits an auth error into the message and HTTP status the views show.
pub fn auth_failure_parts(error: &AuthError) -> (String, Option<u16>) {
    match error {
        AuthError::Provider {
            status, message, ..
        } => (message.clone(), Some(*status)),
        other => (other.to_string(), None),
    }
}

fn default_session_path() -> PathBuf {
    ConfigStore::default_config_dir().join(SESSION_FILE_NAME)
}

fn load_persisted_session(path: &PathBuf) -> Option<PersistedSession> {
    let content = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&content) {
        Ok(persisted) => Some(persisted),
        Err(error) => {
            tracing::warn!("ignoring malformed session file at {path:?}: {error}");
            None
        }
    }
}

fn persist_session(path: &PathBuf, refresh_token: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let persisted = PersistedSession {
        refresh_token: refresh_token.to_string(),
    };
    let content = serde_json::to_string(&persisted).map_err(std::io::Error::other)?;

    let temp_path = path.with_extension("json.tmp");
    std::fs::write(&temp_path, content)?;
    std::fs::rename(&temp_path, path)
}

#[cfg(test)]
mod tests {
    use core::prelude::v1::test;

    use super::*;

    #[test]
    fn refresh_fires_at_three_quarters_of_the_token_lifetime() {
        assert_eq!(refresh_delay(900), Duration::from_secs(675));
        assert_eq!(refresh_delay(0), Duration::from_secs(0));
    }

    #[test]
    fn provider_failures_surface_the_raw_message_and_status() {
        let error = AuthError::Provider {
            stage: "sign-in",
            status: 401,
            message: "Incorrect email or password".to_string(),
        };

        let (message, status) = auth_failure_parts(&error);
        assert_eq!(message, "Incorrect email or password");
        assert_eq!(status, Some(401));
    }

    #[test]
    fn non_provider_failures_carry_no_status_code() {
        let error = AuthError::MissingSession { stage: "sign-up" };
        let (message, status) = auth_failure_parts(&error);

        assert!(message.contains("no session"));
        assert_eq!(status, None);
    }

    #[test]
    fn persisted_session_round_trips_the_refresh_token() {
        let raw = r#"{"refresh_token":"abc123"}"#;
        let persisted: PersistedSession = serde_json::from_str(raw).unwrap();
        assert_eq!(persisted.refresh_token, "abc123");
    }
}
