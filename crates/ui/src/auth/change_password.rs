use std::time::Duration;

use gpui::*;
use gpui_component::{
    ActiveTheme, Disableable, Sizable,
    button::{Button, ButtonVariants},
    input::{Input, InputState},
    label::Label,
    v_flex,
};

use crate::auth::session::{AuthRequestFailed, PasswordChanged, SessionState};

/// How long the success notice stays up before returning to the app.
const SUCCESS_REDIRECT_DELAY: Duration = Duration::from_secs(2);

/// The password was changed and the success pause has elapsed.
#[derive(Debug, Clone, Copy)]
pub struct PasswordFlowDone;

/// The user backed out of the change-password form.
#[derive(Debug, Clone, Copy)]
pub struct PasswordFlowCancelled;

/// Form for setting a new password on the active session.
pub struct ChangePasswordView {
    session: Entity<SessionState>,
    new_input: Entity<InputState>,
    confirm_input: Entity<InputState>,
    busy: bool,
    error: Option<String>,
    success: bool,
    redirect_task: Option<Task<()>>,
}

impl EventEmitter<PasswordFlowDone> for ChangePasswordView {}
impl EventEmitter<PasswordFlowCancelled> for ChangePasswordView {}

impl ChangePasswordView {
    pub fn new(session: Entity<SessionState>, window: &mut Window, cx: &mut Context<Self>) -> Self {
        let new_input = cx.new(|cx| {
            InputState::new(window, cx)
                .placeholder("New password")
                .masked(true)
        });
        let confirm_input = cx.new(|cx| {
            InputState::new(window, cx)
                .placeholder("Confirm new password")
                .masked(true)
        });

        cx.subscribe(&session, Self::handle_password_changed).detach();
        cx.subscribe(&session, Self::handle_auth_failure).detach();

        Self {
            session,
            new_input,
            confirm_input,
            busy: false,
            error: None,
            success: false,
            redirect_task: None,
        }
    }

    /// Clears the form when the route becomes active again.
    pub fn reset(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        self.new_input.update(cx, |state, cx| {
            state.set_value("", window, cx);
        });
        self.confirm_input.update(cx, |state, cx| {
            state.set_value("", window, cx);
        });
        self.busy = false;
        self.error = None;
        self.success = false;
        self.redirect_task = None;
        cx.notify();
    }

    fn handle_password_changed(
        &mut self,
        _session: Entity<SessionState>,
        _event: &PasswordChanged,
        cx: &mut Context<Self>,
    ) {
        self.busy = false;
        self.error = None;
        self.success = true;

        // Let the success notice land before navigating away.
        self.redirect_task = Some(cx.spawn(async move |this, cx| {
            cx.background_executor().timer(SUCCESS_REDIRECT_DELAY).await;

            let _ = this.update(cx, |this, cx| {
                this.redirect_task = None;
                cx.emit(PasswordFlowDone);
            });
        }));

        cx.notify();
    }

    fn handle_auth_failure(
        &mut self,
        _session: Entity<SessionState>,
        event: &AuthRequestFailed,
        cx: &mut Context<Self>,
    ) {
        self.busy = false;
        self.error = Some(match event.status {
            Some(status) => format!("{} (Code: {status})", event.message),
            None => event.message.clone(),
        });
        cx.notify();
    }

    fn submit(&mut self, cx: &mut Context<Self>) {
        if self.busy || self.success {
            return;
        }

        let new_password = self.new_input.read(cx).value().to_string();
        let confirmation = self.confirm_input.read(cx).value().to_string();

        if new_password.is_empty() {
            self.error = Some("Enter a new password".to_string());
            cx.notify();
            return;
        }

        // Mismatches never leave the client.
        if new_password != confirmation {
            self.error = Some("Passwords do not match".to_string());
            cx.notify();
            return;
        }

        self.busy = true;
        self.error = None;
        self.session.update(cx, |session, cx| {
            session.change_password(new_password, cx);
        });
        cx.notify();
    }
}

impl Render for ChangePasswordView {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();

        let mut card = v_flex()
            .w(px(360.))
            .gap_3()
            .p_6()
            .rounded_lg()
            .border_1()
            .border_color(theme.border)
            .bg(theme.background)
            .child(Label::new("Change password").text_lg())
            .child(Input::new(&self.new_input).w_full())
            .child(Input::new(&self.confirm_input).w_full());

        if let Some(error) = &self.error {
            card = card.child(
                Label::new(error.clone())
                    .text_xs()
                    .text_color(theme.danger),
            );
        }

        if self.success {
            card = card.child(
                Label::new("Password updated. Redirecting to sign in...")
                    .text_xs()
                    .text_color(theme.muted_foreground),
            );
        }

        card = card
            .child(
                Button::new("change-password-submit")
                    .primary()
                    .w_full()
                    .disabled(self.busy || self.success)
                    .child(if self.busy { "Working..." } else { "Update password" })
                    .on_click(cx.listener(|this, _, _window, cx| {
                        this.submit(cx);
                    })),
            )
            .child(
                Button::new("change-password-back")
                    .ghost()
                    .small()
                    .child("Back")
                    .on_click(cx.listener(|_, _, _window, cx| {
                        cx.emit(PasswordFlowCancelled);
                    })),
            );

        v_flex()
            .size_full()
            .items_center()
            .justify_center()
            .bg(theme.muted)
            .child(card)
    }
}
