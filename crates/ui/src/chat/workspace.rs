use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use gpui::*;
use gpui_component::{ActiveTheme, h_flex, v_flex};
use gpui_tokio_bridge::Tokio;
use parlor_gateway::{
    ChatId, ChatRecord, FeedEvent, FeedEventPayload, FeedEventStream, FeedSessionId, FeedTarget,
    FeedWorker, GraphqlClient, MessageFeedClient, normalize_messages,
};

use uuid::Uuid;

use crate::auth::session::{AuthStatus, SessionChanged, SessionState};
use crate::chat::bot::BotTrigger;
use crate::chat::events::{
    ChangePasswordClicked, ChatSelected, CreateChatRequested, DeleteChatConfirmed, SignOutClicked,
    SubmitMessage,
};
use crate::chat::message_input::MessageInput;
use crate::chat::message_list::{FeedPhase, MessageList};
use crate::chat::model::{
    CHAT_LIST_ERROR_NOTICE, COMPOSING_HARD_TIMEOUT_SECS, ComposingIndicator, can_send,
    feed_event_is_current, next_selection_after_delete,
};
use crate::chat::sidebar::ChatSidebar;

const SIDEBAR_WIDTH: Pixels = px(280.);

/// Parent coordinator for sidebar/message list/input/feed orchestration.
///
/// All gateway and webhook traffic flows through here; the child views
/// only render state and emit intents.
pub struct ChatWorkspace {
    session: Entity<SessionState>,
    sidebar: Entity<ChatSidebar>,
    message_list: Entity<MessageList>,
    message_input: Entity<MessageInput>,
    gateway: Arc<GraphqlClient>,
    feed_client: Arc<MessageFeedClient>,
    bot: Arc<BotTrigger>,
    chats: Vec<ChatRecord>,
    selected_chat: Option<ChatId>,
    /// Chat to activate once the next list refresh lands.
    pending_select: Option<ChatId>,
    next_feed_session_id: u64,
    active_feed: Option<FeedTarget>,
    feed_worker_task: Option<Task<Result<(), gpui_tokio_bridge::JoinError>>>,
    feed_reader_task: Option<Task<()>>,
    composing: Option<ComposingIndicator>,
    composing_timeout_task: Option<Task<()>>,
    sending: bool,
    creating: bool,
}

impl EventEmitter<ChangePasswordClicked> for ChatWorkspace {}

impl ChatWorkspace {
    pub fn new(
        session: Entity<SessionState>,
        gateway: Arc<GraphqlClient>,
        feed_client: Arc<MessageFeedClient>,
        bot: Arc<BotTrigger>,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) -> Self {
        let sidebar = cx.new(|cx| ChatSidebar::new(window, cx));
        let message_list = cx.new(MessageList::new);
        let message_input = cx.new(|cx| MessageInput::new(window, cx));

        cx.subscribe(&session, Self::handle_session_changed).detach();

        cx.subscribe(&sidebar, |this, _, event: &ChatSelected, cx| {
            this.handle_chat_selected(event.chat_id, cx);
        })
        .detach();
        cx.subscribe(&sidebar, |this, _, event: &DeleteChatConfirmed, cx| {
            this.handle_delete_chat(event.chat_id, cx);
        })
        .detach();
        cx.subscribe(&sidebar, |this, _, _event: &SignOutClicked, cx| {
            this.session.update(cx, |session, cx| {
                session.sign_out(false, cx);
            });
        })
        .detach();
        cx.subscribe(&sidebar, |_this, _, _event: &ChangePasswordClicked, cx| {
            cx.emit(ChangePasswordClicked);
        })
        .detach();
        cx.subscribe(&sidebar, |this, _, event: &CreateChatRequested, cx| {
            this.handle_create_chat(event.title.clone(), cx);
        })
        .detach();
        cx.subscribe(&message_input, |this, _, event: &SubmitMessage, cx| {
            this.handle_submit(event.content.clone(), cx);
        })
        .detach();

        let mut this = Self {
            session,
            sidebar,
            message_list,
            message_input,
            gateway,
            feed_client,
            bot,
            chats: Vec::new(),
            selected_chat: None,
            pending_select: None,
            next_feed_session_id: 1,
            active_feed: None,
            feed_worker_task: None,
            feed_reader_task: None,
            composing: None,
            composing_timeout_task: None,
            sending: false,
            creating: false,
        };

        if let AuthStatus::Authenticated(user) = this.session.read(cx).status().clone() {
            this.sidebar.update(cx, |sidebar, cx| {
                sidebar.set_user_email(Some(user.email.clone()), cx);
            });
            this.message_list.update(cx, |list, cx| {
                list.set_own_user_id(Some(user.id), cx);
            });
            this.refresh_chats(cx);
        }

        this
    }

    fn handle_session_changed(
        &mut self,
        _session: Entity<SessionState>,
        event: &SessionChanged,
        cx: &mut Context<Self>,
    ) {
        match &event.status {
            AuthStatus::Authenticated(user) => {
                let email = user.email.clone();
                let user_id = user.id;
                self.sidebar.update(cx, |sidebar, cx| {
                    sidebar.set_user_email(Some(email), cx);
                });
                self.message_list.update(cx, |list, cx| {
                    list.set_own_user_id(Some(user_id), cx);
                });
                self.refresh_chats(cx);
            }
            AuthStatus::Loading => {}
            AuthStatus::SignedOut => self.reset_workspace(cx),
        }
    }

    /// Drops every piece of per-account state after a sign-out.
    fn reset_workspace(&mut self, cx: &mut Context<Self>) {
        self.teardown_feed();
        self.chats.clear();
        self.selected_chat = None;
        self.pending_select = None;
        self.composing = None;
        self.composing_timeout_task = None;
        self.sending = false;
        self.creating = false;

        self.sidebar.update(cx, |sidebar, cx| {
            sidebar.set_chats(Vec::new(), cx);
            sidebar.set_selected(None, cx);
            sidebar.set_user_email(None, cx);
            sidebar.set_creating(false, cx);
        });
        self.message_list.update(cx, |list, cx| {
            list.clear_messages(cx);
            list.set_own_user_id(None, cx);
            list.set_composing(false, cx);
            list.set_phase(FeedPhase::Idle, cx);
            list.set_has_selection(false, cx);
        });
        self.message_input.update(cx, |input, cx| {
            input.set_enabled(false, cx);
            input.set_sending(false, cx);
        });
        cx.notify();
    }

    fn refresh_chats(&mut self, cx: &mut Context<Self>) {
        let Some((access_token, user_id)) = self.credentials(cx) else {
            return;
        };

        self.sidebar.update(cx, |sidebar, cx| {
            sidebar.set_chats_loading(cx);
        });

        let gateway = self.gateway.clone();
        let request =
            Tokio::spawn(cx, async move { gateway.list_chats(&access_token, user_id).await });

        cx.spawn(async move |this, cx| {
            let outcome = request.await;
            let _ = this.update(cx, |this, cx| match outcome {
                Ok(Ok(chats)) => this.finish_refresh_chats(chats, cx),
                Ok(Err(error)) => {
                    // The sidebar shows a generic notice; the detail goes to the log.
                    tracing::warn!("failed to list chats: {error}");
                    this.sidebar.update(cx, |sidebar, cx| {
                        sidebar.set_chats_error(CHAT_LIST_ERROR_NOTICE.to_string(), cx);
                    });
                }
                Err(join_error) => {
                    tracing::warn!("chat list task failed to join: {join_error}");
                    this.sidebar.update(cx, |sidebar, cx| {
                        sidebar.set_chats_error(CHAT_LIST_ERROR_NOTICE.to_string(), cx);
                    });
                }
            });
        })
        .detach();
    }

    fn finish_refresh_chats(&mut self, chats: Vec<ChatRecord>, cx: &mut Context<Self>) {
        self.chats = chats.clone();
        self.sidebar.update(cx, |sidebar, cx| {
            sidebar.set_chats(chats, cx);
        });

        if let Some(pending) = self.pending_select.take() {
            if self.chats.iter().any(|chat| chat.id == pending) {
                self.sidebar.update(cx, |sidebar, cx| {
                    sidebar.set_selected(Some(pending), cx);
                });
                self.handle_chat_selected(pending, cx);
                return;
            }
        }

        // Drop a selection whose chat vanished server side.
        if self
            .selected_chat
            .is_some_and(|selected| !self.chats.iter().any(|chat| chat.id == selected))
        {
            self.clear_selection(cx);
        }
    }

    fn clear_selection(&mut self, cx: &mut Context<Self>) {
        self.teardown_feed();
        self.selected_chat = None;
        self.composing = None;
        self.composing_timeout_task = None;

        self.sidebar.update(cx, |sidebar, cx| {
            sidebar.set_selected(None, cx);
        });
        self.message_list.update(cx, |list, cx| {
            list.clear_messages(cx);
            list.set_composing(false, cx);
            list.set_phase(FeedPhase::Idle, cx);
            list.set_has_selection(false, cx);
        });
        self.message_input.update(cx, |input, cx| {
            input.set_enabled(false, cx);
        });
        cx.notify();
    }

    fn handle_chat_selected(&mut self, chat_id: ChatId, cx: &mut Context<Self>) {
        if self.selected_chat == Some(chat_id) {
            return;
        }

        // Tear the previous feed down before the next one opens so two
        // sockets never serve the view at once.
        self.teardown_feed();
        self.selected_chat = Some(chat_id);
        self.composing = None;
        self.composing_timeout_task = None;

        self.sidebar.update(cx, |sidebar, cx| {
            sidebar.set_selected(Some(chat_id), cx);
        });
        self.message_list.update(cx, |list, cx| {
            list.clear_messages(cx);
            list.set_composing(false, cx);
            list.set_phase(FeedPhase::Connecting, cx);
            list.set_has_selection(true, cx);
            list.reset_scroll_tracking(cx);
        });
        self.message_input.update(cx, |input, cx| {
            input.set_enabled(true, cx);
        });

        self.open_feed(chat_id, cx);
        cx.notify();
    }

    fn teardown_feed(&mut self) {
        self.active_feed = None;
        // Dropping the reader task drops the stream, which cancels the
        // worker and closes the socket.
        self.feed_reader_task = None;
        self.feed_worker_task = None;
    }

    fn open_feed(&mut self, chat_id: ChatId, cx: &mut Context<Self>) {
        let Some(access_token) = self.access_token(cx) else {
            return;
        };

        let session_id = FeedSessionId::new(self.next_feed_session_id);
        self.next_feed_session_id = self.next_feed_session_id.saturating_add(1);
        let target = FeedTarget::new(chat_id, session_id);

        let handle = self.feed_client.open_feed(&access_token, target);
        self.active_feed = Some(target);
        self.spawn_feed_worker(handle.worker, cx);
        self.spawn_feed_reader(handle.stream, cx);
    }

    fn spawn_feed_worker(&mut self, worker: FeedWorker, cx: &mut Context<Self>) {
        self.feed_worker_task = Some(Tokio::spawn(cx, worker));
    }

    fn spawn_feed_reader(&mut self, mut stream: FeedEventStream, cx: &mut Context<Self>) {
        let stream_target = stream.target();

        self.feed_reader_task = Some(cx.spawn(async move |this, cx| {
            while let Some(event) = stream.recv().await {
                let _ = this.update(cx, |this, cx| {
                    this.handle_feed_event(event, cx);
                });
            }

            let _ = this.update(cx, |this, cx| {
                this.handle_feed_reader_closed(stream_target, cx);
            });
        }));
    }

    fn feed_event_is_current(&self, target: FeedTarget) -> bool {
        feed_event_is_current(self.active_feed, target)
    }

    fn handle_feed_event(&mut self, event: FeedEvent, cx: &mut Context<Self>) {
        if !self.feed_event_is_current(event.target) {
            // Strict target equality keeps snapshots from a torn-down feed
            // out of the newly selected chat.
            return;
        }

        match event.payload {
            FeedEventPayload::Snapshot(messages) => {
                let messages = normalize_messages(messages);

                if let Some(indicator) = self.composing
                    && indicator.chat_id == event.target.chat_id
                    && indicator.should_clear(&messages, Utc::now())
                {
                    self.composing = None;
                    self.composing_timeout_task = None;
                }

                let composing = self.composing.is_some();
                self.message_list.update(cx, |list, cx| {
                    list.set_phase(FeedPhase::Live, cx);
                    list.set_messages(messages, cx);
                    list.set_composing(composing, cx);
                });
            }
            FeedEventPayload::Error(message) => {
                tracing::warn!("message feed failed: {message}");
                self.message_list.update(cx, |list, cx| {
                    list.set_phase(FeedPhase::Failed(message), cx);
                });
            }
            FeedEventPayload::Completed => {
                self.message_list.update(cx, |list, cx| {
                    list.set_phase(FeedPhase::Failed("Live updates ended".to_string()), cx);
                });
            }
        }
    }

    fn handle_feed_reader_closed(&mut self, target: FeedTarget, cx: &mut Context<Self>) {
        if !self.feed_event_is_current(target) {
            return;
        }

        self.active_feed = None;
        self.feed_worker_task = None;
        self.feed_reader_task = None;
        self.message_list.update(cx, |list, cx| {
            list.set_phase(
                FeedPhase::Failed("Live updates disconnected".to_string()),
                cx,
            );
        });
    }

    fn handle_create_chat(&mut self, title: String, cx: &mut Context<Self>) {
        if self.creating {
            return;
        }
        let Some((access_token, user_id)) = self.credentials(cx) else {
            return;
        };

        self.creating = true;
        self.sidebar.update(cx, |sidebar, cx| {
            sidebar.set_creating(true, cx);
        });

        let gateway = self.gateway.clone();
        let request = Tokio::spawn(cx, async move {
            gateway.create_chat(&access_token, user_id, &title).await
        });

        cx.spawn(async move |this, cx| {
            let outcome = request.await;
            let _ = this.update(cx, |this, cx| {
                this.creating = false;
                this.sidebar.update(cx, |sidebar, cx| {
                    sidebar.set_creating(false, cx);
                });

                match outcome {
                    Ok(Ok(record)) => {
                        this.sidebar.update(cx, |sidebar, cx| {
                            sidebar.request_clear_title(cx);
                        });
                        this.pending_select = Some(record.id);
                        this.refresh_chats(cx);
                    }
                    Ok(Err(error)) => {
                        // Mutation failures recover through the re-enabled form.
                        tracing::warn!("failed to create chat: {error}");
                    }
                    Err(join_error) => {
                        tracing::warn!("create chat task failed to join: {join_error}");
                    }
                }
            });
        })
        .detach();
    }

    fn handle_delete_chat(&mut self, chat_id: ChatId, cx: &mut Context<Self>) {
        let Some(access_token) = self.access_token(cx) else {
            return;
        };

        let gateway = self.gateway.clone();
        let request =
            Tokio::spawn(cx, async move { gateway.delete_chat(&access_token, chat_id).await });

        cx.spawn(async move |this, cx| {
            let outcome = request.await;
            let _ = this.update(cx, |this, cx| match outcome {
                Ok(Ok(deleted)) => this.finish_delete_chat(deleted, cx),
                Ok(Err(error)) => {
                    tracing::warn!("failed to delete chat: {error}");
                }
                Err(join_error) => {
                    tracing::warn!("delete chat task failed to join: {join_error}");
                }
            });
        })
        .detach();
    }

    fn finish_delete_chat(&mut self, deleted: ChatId, cx: &mut Context<Self>) {
        // The deleted chat always yields the selection, even when another
        // chat was active; the first survivor becomes current.
        self.pending_select = next_selection_after_delete(&self.chats, deleted);
        self.clear_selection(cx);
        self.refresh_chats(cx);
    }

    fn handle_submit(&mut self, content: String, cx: &mut Context<Self>) {
        let Some(chat_id) = self.selected_chat else {
            return;
        };
        if !can_send(&content, true, self.sending) {
            return;
        }
        let Some((access_token, user_id)) = self.credentials(cx) else {
            return;
        };

        self.sending = true;
        self.message_input.update(cx, |input, cx| {
            input.set_sending(true, cx);
        });

        let gateway = self.gateway.clone();
        let request_content = content.clone();
        let request = Tokio::spawn(cx, async move {
            gateway
                .send_message(&access_token, chat_id, &request_content)
                .await
        });

        cx.spawn(async move |this, cx| {
            let outcome = request.await;
            let _ = this.update(cx, |this, cx| {
                this.sending = false;
                this.message_input.update(cx, |input, cx| {
                    input.set_sending(false, cx);
                });

                match outcome {
                    Ok(Ok(_record)) => {
                        this.message_input.update(cx, |input, cx| {
                            input.request_clear(cx);
                        });
                        this.arm_composing(chat_id, cx);
                        this.notify_bot(user_id, chat_id, content, cx);
                    }
                    Ok(Err(error)) => {
                        // The draft stays in the input for a retry.
                        tracing::warn!("failed to send message: {error}");
                    }
                    Err(join_error) => {
                        tracing::warn!("send message task failed to join: {join_error}");
                    }
                }
            });
        })
        .detach();
    }

    fn arm_composing(&mut self, chat_id: ChatId, cx: &mut Context<Self>) {
        let armed_at = Utc::now();
        self.composing = Some(ComposingIndicator::new(chat_id, armed_at));
        self.message_list.update(cx, |list, cx| {
            list.set_composing(true, cx);
        });

        self.composing_timeout_task = Some(cx.spawn(async move |this, cx| {
            cx.background_executor()
                .timer(Duration::from_secs(COMPOSING_HARD_TIMEOUT_SECS))
                .await;

            let _ = this.update(cx, |this, cx| {
                // Only the arming send may expire its own indicator.
                if this
                    .composing
                    .is_some_and(|indicator| {
                        indicator.chat_id == chat_id && indicator.armed_at == armed_at
                    })
                {
                    this.composing = None;
                    this.composing_timeout_task = None;
                    this.message_list.update(cx, |list, cx| {
                        list.set_composing(false, cx);
                    });
                }
            });
        }));
    }

    fn notify_bot(&mut self, user_id: Uuid, chat_id: ChatId, content: String, cx: &mut Context<Self>) {
        let bot = self.bot.clone();
        let request = Tokio::spawn(cx, async move { bot.notify(user_id, chat_id, &content).await });

        cx.spawn(async move |this, cx| {
            let outcome = request.await;
            let failed = match outcome {
                Ok(Ok(())) => false,
                Ok(Err(error)) => {
                    tracing::warn!("bot webhook call failed: {error}");
                    true
                }
                Err(join_error) => {
                    tracing::warn!("bot webhook task failed to join: {join_error}");
                    true
                }
            };

            if failed {
                let _ = this.update(cx, |this, cx| {
                    // No reply is coming, so stop showing the indicator.
                    if this
                        .composing
                        .is_some_and(|indicator| indicator.chat_id == chat_id)
                    {
                        this.composing = None;
                        this.composing_timeout_task = None;
                        this.message_list.update(cx, |list, cx| {
                            list.set_composing(false, cx);
                        });
                    }
                });
            }
        })
        .detach();
    }

    fn credentials(&self, cx: &Context<Self>) -> Option<(String, Uuid)> {
        let session = self.session.read(cx);
        let user_id = session.user()?.id;
        let access_token = session.access_token()?.to_string();
        Some((access_token, user_id))
    }

    fn access_token(&self, cx: &Context<Self>) -> Option<String> {
        self.session.read(cx).access_token().map(str::to_string)
    }
}

impl Render for ChatWorkspace {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();

        h_flex()
            .size_full()
            .bg(theme.background)
            .child(
                div()
                    .w(SIDEBAR_WIDTH)
                    .h_full()
                    .border_r_1()
                    .border_color(theme.border)
                    .child(self.sidebar.clone()),
            )
            .child(
                v_flex()
                    .flex_1()
                    .min_w_0()
                    .h_full()
                    .child(div().flex_1().min_h_0().child(self.message_list.clone()))
                    .child(
                        div()
                            .w_full()
                            .border_t_1()
                            .border_color(theme.border)
                            .child(self.message_input.clone()),
                    ),
            )
    }
}
