use gpui::*;
use gpui_component::{
    ActiveTheme, Disableable, Sizable,
    button::{Button, ButtonVariants},
    input::{Input, InputEvent, InputState},
    label::Label,
    v_flex,
};

use crate::auth::session::{
    AuthRequestFailed, PasswordResetSent, SessionChanged, SessionState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoginMode {
    SignIn,
    SignUp,
}

/// Email/password form for signing in or creating an account.
pub struct LoginView {
    session: Entity<SessionState>,
    email_input: Entity<InputState>,
    password_input: Entity<InputState>,
    mode: LoginMode,
    busy: bool,
    error: Option<String>,
    notice: Option<String>,
}

impl LoginView {
    pub fn new(session: Entity<SessionState>, window: &mut Window, cx: &mut Context<Self>) -> Self {
        let email_input = cx.new(|cx| InputState::new(window, cx).placeholder("Email"));
        let password_input =
            cx.new(|cx| InputState::new(window, cx).placeholder("Password").masked(true));

        cx.subscribe_in(
            &password_input,
            window,
            |this, _, event: &InputEvent, _window, cx| {
                if let InputEvent::PressEnter { .. } = event {
                    this.submit(cx);
                }
            },
        )
        .detach();

        cx.subscribe(&session, Self::handle_session_changed).detach();
        cx.subscribe(&session, Self::handle_auth_failure).detach();
        cx.subscribe(&session, Self::handle_reset_sent).detach();

        Self {
            session,
            email_input,
            password_input,
            mode: LoginMode::SignIn,
            busy: false,
            error: None,
            notice: None,
        }
    }

    fn handle_session_changed(
        &mut self,
        _session: Entity<SessionState>,
        _event: &SessionChanged,
        cx: &mut Context<Self>,
    ) {
        self.busy = false;
        cx.notify();
    }

    fn handle_auth_failure(
        &mut self,
        _session: Entity<SessionState>,
        event: &AuthRequestFailed,
        cx: &mut Context<Self>,
    ) {
        self.busy = false;
        self.notice = None;
        self.error = Some(match event.status {
            Some(status) => format!("{} (Code: {status})", event.message),
            None => event.message.clone(),
        });
        cx.notify();
    }

    fn handle_reset_sent(
        &mut self,
        _session: Entity<SessionState>,
        _event: &PasswordResetSent,
        cx: &mut Context<Self>,
    ) {
        self.busy = false;
        self.error = None;
        self.notice = Some("Check your inbox for the password reset link".to_string());
        cx.notify();
    }

    fn submit(&mut self, cx: &mut Context<Self>) {
        if self.busy {
            return;
        }

        let email = self.email_input.read(cx).value().trim().to_string();
        let password = self.password_input.read(cx).value().to_string();

        if email.is_empty() || password.is_empty() {
            self.error = Some("Email and password are required".to_string());
            cx.notify();
            return;
        }

        self.busy = true;
        self.error = None;
        self.notice = None;

        let mode = self.mode;
        self.session.update(cx, |session, cx| match mode {
            LoginMode::SignIn => session.sign_in(email, password, cx),
            LoginMode::SignUp => session.sign_up(email, password, cx),
        });
        cx.notify();
    }

    fn request_password_reset(&mut self, cx: &mut Context<Self>) {
        if self.busy {
            return;
        }

        let email = self.email_input.read(cx).value().trim().to_string();
        if email.is_empty() {
            self.error = Some("Enter your email to reset the password".to_string());
            cx.notify();
            return;
        }

        self.busy = true;
        self.error = None;
        self.session.update(cx, |session, cx| {
            session.reset_password(email, cx);
        });
        cx.notify();
    }

    fn toggle_mode(&mut self, cx: &mut Context<Self>) {
        self.mode = match self.mode {
            LoginMode::SignIn => LoginMode::SignUp,
            LoginMode::SignUp => LoginMode::SignIn,
        };
        self.error = None;
        self.notice = None;
        cx.notify();
    }
}

impl Render for LoginView {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let (title, submit_label, toggle_label) = match self.mode {
            LoginMode::SignIn => ("Welcome back", "Sign in", "Need an account? Sign up"),
            LoginMode::SignUp => ("Create your account", "Sign up", "Have an account? Sign in"),
        };

        let mut card = v_flex()
            .w(px(360.))
            .gap_3()
            .p_6()
            .rounded_lg()
            .border_1()
            .border_color(theme.border)
            .bg(theme.background)
            .child(Label::new(title).text_lg())
            .child(Input::new(&self.email_input).w_full())
            .child(Input::new(&self.password_input).w_full());

        if let Some(error) = &self.error {
            card = card.child(
                Label::new(error.clone())
                    .text_xs()
                    .text_color(theme.danger),
            );
        }

        if let Some(notice) = &self.notice {
            card = card.child(
                Label::new(notice.clone())
                    .text_xs()
                    .text_color(theme.muted_foreground),
            );
        }

        card = card
            .child(
                Button::new("login-submit")
                    .primary()
                    .w_full()
                    .disabled(self.busy)
                    .child(if self.busy { "Working..." } else { submit_label })
                    .on_click(cx.listener(|this, _, _window, cx| {
                        this.submit(cx);
                    })),
            )
            .child(
                Button::new("login-toggle-mode")
                    .ghost()
                    .small()
                    .child(toggle_label)
                    .on_click(cx.listener(|this, _, _window, cx| {
                        this.toggle_mode(cx);
                    })),
            )
            .child(
                Button::new("login-forgot-password")
                    .ghost()
                    .small()
                    .child("Forgot password?")
                    .on_click(cx.listener(|this, _, _window, cx| {
                        this.request_password_reset(cx);
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
