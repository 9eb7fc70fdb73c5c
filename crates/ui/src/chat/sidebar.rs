use std::rc::Rc;

use gpui::*;
use gpui_component::{
    ActiveTheme, Disableable, IconName, Sizable, VirtualListScrollHandle,
    button::{Button, ButtonVariants},
    h_flex,
    input::{Input, InputEvent, InputState},
    label::Label,
    list::ListItem,
    v_flex, v_virtual_list,
};
use parlor_gateway::{ChatId, ChatRecord};

use crate::chat::events::{
    ChangePasswordClicked, ChatSelected, CreateChatRequested, DeleteChatConfirmed, SignOutClicked,
};
use crate::chat::model::{RemoteList, filter_chats};

const CHAT_ROW_HEIGHT: f32 = 44.0;

/// Sidebar with the searchable chat list, chat creation, and the
/// account footer.
///
/// The sidebar renders what the workspace feeds it; all gateway calls
/// happen in the workspace and land back here through setters.
pub struct ChatSidebar {
    search_input: Entity<InputState>,
    title_input: Entity<InputState>,
    search_query: String,
    chats: RemoteList<ChatRecord>,
    visible: Vec<ChatRecord>,
    selected_chat: Option<ChatId>,
    pending_delete: Option<ChatId>,
    pending_clear_title: bool,
    creating: bool,
    user_email: Option<String>,
    item_sizes: Rc<Vec<Size<Pixels>>>,
    scroll_handle: VirtualListScrollHandle,
}

impl EventEmitter<ChatSelected> for ChatSidebar {}
impl EventEmitter<CreateChatRequested> for ChatSidebar {}
impl EventEmitter<DeleteChatConfirmed> for ChatSidebar {}
impl EventEmitter<SignOutClicked> for ChatSidebar {}
impl EventEmitter<ChangePasswordClicked> for ChatSidebar {}

impl ChatSidebar {
    pub fn new(window: &mut Window, cx: &mut Context<Self>) -> Self {
        let search_input = cx.new(|cx| InputState::new(window, cx).placeholder("Search chats..."));
        let title_input = cx.new(|cx| InputState::new(window, cx).placeholder("New chat title..."));

        cx.subscribe_in(
            &search_input,
            window,
            |this, _, _event: &InputEvent, _window, cx| {
                this.search_query = this.search_input.read(cx).value().to_string();
                this.rebuild_visible();
                cx.notify();
            },
        )
        .detach();

        cx.subscribe_in(
            &title_input,
            window,
            |this, _, event: &InputEvent, _window, cx| {
                match event {
                    InputEvent::PressEnter { .. } => this.request_create(cx),
                    // Re-render so the create button tracks the draft title.
                    _ => cx.notify(),
                }
            },
        )
        .detach();

        Self {
            search_input,
            title_input,
            search_query: String::new(),
            chats: RemoteList::default(),
            visible: Vec::new(),
            selected_chat: None,
            pending_delete: None,
            pending_clear_title: false,
            creating: false,
            user_email: None,
            item_sizes: Rc::new(Vec::new()),
            scroll_handle: VirtualListScrollHandle::new(),
        }
    }

    pub fn set_chats_loading(&mut self, cx: &mut Context<Self>) {
        self.chats.begin_load();
        cx.notify();
    }

    pub fn set_chats(&mut self, chats: Vec<ChatRecord>, cx: &mut Context<Self>) {
        self.chats.finish(chats);
        if self
            .pending_delete
            .is_some_and(|pending| !self.chats.items.iter().any(|chat| chat.id == pending))
        {
            self.pending_delete = None;
        }
        self.rebuild_visible();
        cx.notify();
    }

    /// Records a load failure while keeping the stale list on screen.
    pub fn set_chats_error(&mut self, message: String, cx: &mut Context<Self>) {
        self.chats.fail(message);
        cx.notify();
    }

    pub fn set_selected(&mut self, selected: Option<ChatId>, cx: &mut Context<Self>) {
        self.selected_chat = selected;
        cx.notify();
    }

    pub fn set_creating(&mut self, creating: bool, cx: &mut Context<Self>) {
        self.creating = creating;
        cx.notify();
    }

    pub fn set_user_email(&mut self, email: Option<String>, cx: &mut Context<Self>) {
        self.user_email = email;
        cx.notify();
    }

    /// Clears the title draft on the next frame, once a window is in hand.
    pub fn request_clear_title(&mut self, cx: &mut Context<Self>) {
        self.pending_clear_title = true;
        cx.notify();
    }

    fn request_create(&mut self, cx: &mut Context<Self>) {
        if self.creating {
            return;
        }

        let title = self.title_input.read(cx).value().trim().to_string();
        if title.is_empty() {
            return;
        }

        cx.emit(CreateChatRequested { title });
    }

    fn select_chat(&mut self, chat_id: ChatId, cx: &mut Context<Self>) {
        self.selected_chat = Some(chat_id);
        self.pending_delete = None;
        cx.emit(ChatSelected { chat_id });
        cx.notify();
    }

    fn rebuild_visible(&mut self) {
        self.visible = filter_chats(&self.chats.items, &self.search_query);
        self.item_sizes = Rc::new(
            self.visible
                .iter()
                .map(|_| size(px(0.), px(CHAT_ROW_HEIGHT)))
                .collect(),
        );
    }

    fn render_toolbar(&mut self, cx: &mut Context<Self>) -> impl IntoElement {
        let title_blank = self.title_input.read(cx).value().trim().is_empty();

        v_flex()
            .w_full()
            .min_w_0()
            .gap_2()
            .px_3()
            .pt(px(8.))
            .pb_2()
            .child(Input::new(&self.search_input).w_full().small())
            .child(
                h_flex()
                    .w_full()
                    .min_w_0()
                    .gap_2()
                    .child(Input::new(&self.title_input).w_full().small())
                    .child(
                        Button::new("create-chat")
                            .small()
                            .primary()
                            .icon(IconName::Plus)
                            .disabled(self.creating || title_blank)
                            .on_click(cx.listener(|this, _, _window, cx| {
                                this.request_create(cx);
                            })),
                    ),
            )
    }

    fn render_status_row(&mut self, cx: &mut Context<Self>) -> Option<AnyElement> {
        let theme = cx.theme();

        if let Some(error) = self.chats.error() {
            return Some(
                div()
                    .w_full()
                    .px_3()
                    .py_1()
                    .child(
                        Label::new(error.to_string())
                            .text_xs()
                            .text_color(theme.danger),
                    )
                    .into_any_element(),
            );
        }

        if self.chats.is_loading() && self.chats.items.is_empty() {
            return Some(
                div()
                    .w_full()
                    .px_3()
                    .py_1()
                    .child(
                        Label::new("Loading chats...")
                            .text_xs()
                            .text_color(theme.muted_foreground),
                    )
                    .into_any_element(),
            );
        }

        None
    }

    fn render_empty_state(&mut self, cx: &mut Context<Self>) -> AnyElement {
        let theme = cx.theme();
        let message = if self.chats.items.is_empty() {
            "No chats yet"
        } else {
            "No chats match your search"
        };

        v_flex()
            .flex_1()
            .items_center()
            .justify_center()
            .px_4()
            .child(
                Label::new(message)
                    .text_sm()
                    .text_color(theme.foreground.opacity(0.55)),
            )
            .into_any_element()
    }

    fn render_chat_list(&mut self, cx: &mut Context<Self>) -> AnyElement {
        if self.visible.is_empty() {
            return self.render_empty_state(cx);
        }

        let selected = self.selected_chat;
        let pending_delete = self.pending_delete;
        let item_sizes = self.item_sizes.clone();
        let chats = self.visible.clone();

        v_flex()
            .flex_1()
            .min_h_0()
            .child(
                v_virtual_list(
                    cx.entity().clone(),
                    "chat-list",
                    item_sizes,
                    move |_this, visible_range, _scroll_handle, cx| {
                        visible_range
                            .map(|index| {
                                let chat = &chats[index];
                                let chat_id = chat.id;
                                let title = chat.title.clone();
                                let is_selected = selected == Some(chat_id);
                                let is_pending_delete = pending_delete == Some(chat_id);

                                let actions = if is_pending_delete {
                                    h_flex()
                                        .items_center()
                                        .gap_1()
                                        .child(
                                            Button::new(("confirm-delete", index))
                                                .danger()
                                                .small()
                                                .icon(IconName::Check)
                                                .on_click(cx.listener(
                                                    move |this, _, _window, cx| {
                                                        this.pending_delete = None;
                                                        cx.emit(DeleteChatConfirmed { chat_id });
                                                        cx.notify();
                                                    },
                                                )),
                                        )
                                        .child(
                                            Button::new(("cancel-delete", index))
                                                .ghost()
                                                .small()
                                                .icon(IconName::CircleX)
                                                .on_click(cx.listener(
                                                    move |this, _, _window, cx| {
                                                        this.pending_delete = None;
                                                        cx.notify();
                                                    },
                                                )),
                                        )
                                        .into_any_element()
                                } else {
                                    Button::new(("request-delete", index))
                                        .ghost()
                                        .small()
                                        .icon(IconName::Delete)
                                        .on_click(cx.listener(move |this, _, _window, cx| {
                                            this.pending_delete = Some(chat_id);
                                            cx.notify();
                                        }))
                                        .into_any_element()
                                };

                                div()
                                    .w_full()
                                    .h(px(CHAT_ROW_HEIGHT))
                                    .px_2()
                                    .child(
                                        ListItem::new(("chat", index))
                                            .w_full()
                                            .h_full()
                                            .px_3()
                                            .py_2()
                                            .rounded_md()
                                            .selected(is_selected)
                                            .on_click(cx.listener(
                                                move |this, _event: &ClickEvent, _window, cx| {
                                                    this.select_chat(chat_id, cx);
                                                },
                                            ))
                                            .child(
                                                h_flex()
                                                    .w_full()
                                                    .items_center()
                                                    .gap_2()
                                                    .child(
                                                        div()
                                                            .flex_1()
                                                            .min_w_0()
                                                            .truncate()
                                                            .child(
                                                                Label::new(title.clone())
                                                                    .text_sm(),
                                                            ),
                                                    )
                                                    .child(actions),
                                            ),
                                    )
                                    .into_any_element()
                            })
                            .collect()
                    },
                )
                .w_full()
                .flex_1()
                .track_scroll(&self.scroll_handle),
            )
            .into_any_element()
    }

    fn render_footer(&mut self, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let email = self.user_email.clone().unwrap_or_default();

        h_flex()
            .w_full()
            .min_w_0()
            .items_center()
            .justify_between()
            .px_3()
            .py_2()
            .border_t_1()
            .border_color(theme.border)
            .child(
                div().flex_1().min_w_0().truncate().child(
                    Label::new(email)
                        .text_xs()
                        .text_color(theme.muted_foreground),
                ),
            )
            .child(
                h_flex()
                    .items_center()
                    .gap_1()
                    .child(
                        Button::new("sidebar-change-password")
                            .ghost()
                            .small()
                            .icon(IconName::Settings)
                            .on_click(cx.listener(|_, _, _, cx| {
                                cx.emit(ChangePasswordClicked);
                            })),
                    )
                    .child(
                        Button::new("sidebar-sign-out")
                            .ghost()
                            .small()
                            .child("Sign out")
                            .on_click(cx.listener(|_, _, _, cx| {
                                cx.emit(SignOutClicked);
                            })),
                    ),
            )
    }
}

impl Render for ChatSidebar {
    fn render(&mut self, window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        if self.pending_clear_title {
            self.pending_clear_title = false;
            self.title_input.update(cx, |state, cx| {
                state.set_value("", window, cx);
            });
        }

        let background = cx.theme().background;
        let status_row = self.render_status_row(cx);

        let mut column = v_flex()
            .size_full()
            .min_w_0()
            .overflow_hidden()
            .bg(background)
            .child(self.render_toolbar(cx));

        if let Some(status) = status_row {
            column = column.child(status);
        }

        column
            .child(self.render_chat_list(cx))
            .child(self.render_footer(cx))
    }
}
