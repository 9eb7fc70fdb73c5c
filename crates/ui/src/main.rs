use std::sync::Arc;

use gpui::*;
use gpui_component::Root;
use gpui_component::notification::NotificationList;

use parlor::app::{AppShell, Quit, Route};
use parlor::chat::bot::BotTrigger;
use parlor::config::ConfigStore;
use parlor_auth::AuthClient;
use parlor_gateway::{GraphqlClient, MessageFeedClient};

/// Application entry point.
///
/// Loads the endpoint config, builds the backend clients, then boots the
/// GPUI application and opens the main window.
fn main() {
    tracing_subscriber::fmt::init();

    let config = ConfigStore::load().config();

    let auth_client = match AuthClient::new(config.auth_url.clone()) {
        Ok(client) => Arc::new(client),
        Err(error) => {
            tracing::error!("failed to build auth client: {error}");
            return;
        }
    };
    let gateway = match GraphqlClient::new(config.graphql_url.clone()) {
        Ok(client) => Arc::new(client),
        Err(error) => {
            tracing::error!("failed to build gateway client: {error}");
            return;
        }
    };
    let feed_client = Arc::new(MessageFeedClient::new(config.graphql_ws_url.clone()));
    let bot = match BotTrigger::new(config.bot_webhook_url.clone()) {
        Ok(client) => Arc::new(client),
        Err(error) => {
            tracing::error!("failed to build bot webhook client: {error}");
            return;
        }
    };

    // The first argument doubles as the initial route, defaulting to the
    // dashboard so the route guard drives what actually shows.
    let initial_route = Route::parse(
        std::env::args()
            .nth(1)
            .as_deref()
            .unwrap_or("/dashboard"),
    );

    let app = Application::new().with_assets(gpui_component_assets::Assets);

    app.run(move |cx| {
        gpui_tokio_bridge::init(cx);

        // Required before any Root usage; sets up themes and notifications.
        gpui_component::init(cx);

        cx.on_action(|_: &Quit, cx| {
            cx.quit();
        });
        cx.bind_keys([KeyBinding::new("cmd-q", Quit, None)]);

        cx.spawn(async move |cx| {
            cx.update(move |cx| {
                let options = WindowOptions {
                    window_bounds: Some(WindowBounds::Windowed(Bounds::centered(
                        None,
                        size(px(1200.), px(800.)),
                        cx,
                    ))),
                    titlebar: Some(TitlebarOptions {
                        title: Some("Parlor".into()),
                        ..Default::default()
                    }),
                    ..Default::default()
                };

                cx.open_window(options, |window, cx| {
                    let notification_list = cx.new(|cx| NotificationList::new(window, cx));

                    let shell = cx.new(|cx| {
                        AppShell::new(
                            auth_client,
                            gateway,
                            feed_client,
                            bot,
                            initial_route,
                            notification_list,
                            window,
                            cx,
                        )
                    });

                    // Root is required by gpui-component for notifications.
                    cx.new(|cx| Root::new(shell, window, cx))
                })
                .expect("failed to open main window");

                cx.activate(true);
            })
        })
        .detach();
    });
}
