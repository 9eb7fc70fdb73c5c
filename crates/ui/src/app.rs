use std::sync::Arc;

use gpui::*;
use gpui_component::notification::NotificationList;
use gpui_component::{ActiveTheme, label::Label, v_flex};
use parlor_auth::AuthClient;
use parlor_gateway::{GraphqlClient, MessageFeedClient};

use crate::auth::change_password::{ChangePasswordView, PasswordFlowCancelled, PasswordFlowDone};
use crate::auth::login::LoginView;
use crate::auth::session::{AuthStatus, SessionChanged, SessionState};
use crate::chat::bot::BotTrigger;
use crate::chat::events::ChangePasswordClicked;
use crate::chat::workspace::ChatWorkspace;

gpui::actions!(shell, [Quit]);

/// Top-level screens of the app.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    ChangePassword,
    Dashboard,
}

impl Route {
    /// Maps a path argument to a route; unknown paths land on login.
    pub fn parse(path: &str) -> Self {
        match path.trim_end_matches('/') {
            "/dashboard" => Self::Dashboard,
            "/change-password" => Self::ChangePassword,
            _ => Self::Login,
        }
    }
}

/// What a protected route should show for the current auth status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// Session bootstrap is still in flight; show a placeholder.
    ShowLoading,
    Allow,
    RedirectToLogin,
}

pub fn guard_decision(status: &AuthStatus) -> GuardDecision {
    match status {
        AuthStatus::Loading => GuardDecision::ShowLoading,
        AuthStatus::Authenticated(_) => GuardDecision::Allow,
        AuthStatus::SignedOut => GuardDecision::RedirectToLogin,
    }
}

/// Root view: owns the session, routes between login, change-password,
/// and the chat workspace, and hosts the notification layer.
pub struct AppShell {
    session: Entity<SessionState>,
    login_view: Entity<LoginView>,
    change_password_view: Entity<ChangePasswordView>,
    workspace: Entity<ChatWorkspace>,
    notification_list: Entity<NotificationList>,
    route: Route,
}

impl AppShell {
    pub fn new(
        auth_client: Arc<AuthClient>,
        gateway: Arc<GraphqlClient>,
        feed_client: Arc<MessageFeedClient>,
        bot: Arc<BotTrigger>,
        initial_route: Route,
        notification_list: Entity<NotificationList>,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) -> Self {
        let session = cx.new(|cx| SessionState::new(auth_client, cx));
        let login_view = cx.new(|cx| LoginView::new(session.clone(), window, cx));
        let change_password_view =
            cx.new(|cx| ChangePasswordView::new(session.clone(), window, cx));
        let workspace = cx.new(|cx| {
            ChatWorkspace::new(
                session.clone(),
                gateway,
                feed_client,
                bot,
                window,
                cx,
            )
        });

        cx.subscribe(&session, Self::handle_session_changed).detach();
        cx.subscribe(&workspace, |this, _, _event: &ChangePasswordClicked, cx| {
            this.navigate(Route::ChangePassword, cx);
        })
        .detach();
        cx.subscribe_in(
            &change_password_view,
            window,
            |this, _, _event: &PasswordFlowDone, window, cx| {
                this.change_password_view.update(cx, |view, cx| {
                    view.reset(window, cx);
                });
                this.navigate(Route::Login, cx);
            },
        )
        .detach();
        cx.subscribe_in(
            &change_password_view,
            window,
            |this, _, _event: &PasswordFlowCancelled, window, cx| {
                this.change_password_view.update(cx, |view, cx| {
                    view.reset(window, cx);
                });
                this.navigate(Route::Dashboard, cx);
            },
        )
        .detach();

        Self {
            session,
            login_view,
            change_password_view,
            workspace,
            notification_list,
            route: initial_route,
        }
    }

    fn handle_session_changed(
        &mut self,
        _session: Entity<SessionState>,
        event: &SessionChanged,
        cx: &mut Context<Self>,
    ) {
        match &event.status {
            AuthStatus::Authenticated(_) => {
                if self.route == Route::Login {
                    self.navigate(Route::Dashboard, cx);
                }
            }
            AuthStatus::SignedOut => {
                if self.route != Route::Login {
                    self.navigate(Route::Login, cx);
                }
            }
            AuthStatus::Loading => {}
        }
    }

    fn navigate(&mut self, route: Route, cx: &mut Context<Self>) {
        if self.route != route {
            self.route = route;
            cx.notify();
        }
    }

    fn render_loading(&self, cx: &Context<Self>) -> AnyElement {
        let theme = cx.theme();
        v_flex()
            .size_full()
            .items_center()
            .justify_center()
            .bg(theme.background)
            .child(
                Label::new("Loading...")
                    .text_sm()
                    .text_color(theme.muted_foreground),
            )
            .into_any_element()
    }
}

impl Render for AppShell {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let status = self.session.read(cx).status().clone();

        // The route slot itself only changes through subscriptions; the
        // guard just picks what to draw for the current status.
        let content = match self.route {
            Route::Login => self.login_view.clone().into_any_element(),
            Route::Dashboard => match guard_decision(&status) {
                GuardDecision::ShowLoading => self.render_loading(cx),
                GuardDecision::Allow => self.workspace.clone().into_any_element(),
                GuardDecision::RedirectToLogin => self.login_view.clone().into_any_element(),
            },
            Route::ChangePassword => match guard_decision(&status) {
                GuardDecision::ShowLoading => self.render_loading(cx),
                GuardDecision::Allow => self.change_password_view.clone().into_any_element(),
                GuardDecision::RedirectToLogin => self.login_view.clone().into_any_element(),
            },
        };

        div()
            .size_full()
            .child(content)
            .child(self.notification_list.clone())
    }
}

#[cfg(test)]
mod tests {
    use core::prelude::v1::test;

    use super::*;
    use parlor_auth::User;
    use uuid::Uuid;

    #[test]
    fn known_paths_map_to_their_routes() {
        assert_eq!(Route::parse("/dashboard"), Route::Dashboard);
        assert_eq!(Route::parse("/dashboard/"), Route::Dashboard);
        assert_eq!(Route::parse("/change-password"), Route::ChangePassword);
        assert_eq!(Route::parse("/"), Route::Login);
    }

    #[test]
    fn unknown_paths_fall_back_to_login() {
        assert_eq!(Route::parse("/admin"), Route::Login);
        assert_eq!(Route::parse(""), Route::Login);
    }

    #[test]
    fn guard_maps_each_auth_status_to_one_decision() {
        let user = User {
            id: Uuid::new_v4(),
            email: "a@example.test".to_string(),
        };

        assert_eq!(guard_decision(&AuthStatus::Loading), GuardDecision::ShowLoading);
        assert_eq!(
            guard_decision(&AuthStatus::Authenticated(user)),
            GuardDecision::Allow
        );
        assert_eq!(
            guard_decision(&AuthStatus::SignedOut),
            GuardDecision::RedirectToLogin
        );
    }
}
