use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::Hasher;
use std::ops::Range;
use std::rc::Rc;

use gpui::prelude::FluentBuilder as _;
use gpui::*;
use gpui_component::{ActiveTheme, h_flex, label::Label, v_flex, v_virtual_list};
use parlor_gateway::{MessageId, MessageRecord};
use uuid::Uuid;

use crate::chat::model::{BubbleKind, bubble_kind};
use crate::chat::scroll_manager::ScrollManager;

const DEFAULT_CONTENT_WIDTH: Pixels = px(680.);
const LIST_HORIZONTAL_PADDING: Pixels = px(16.);
const CONTENT_WIDTH_CHANGE_EPSILON: f32 = 1.0;
const BUBBLE_MAX_WIDTH: Pixels = px(540.);
const BUBBLE_PADDING_X: Pixels = px(14.);
const BUBBLE_PADDING_Y: Pixels = px(10.);
const TIMESTAMP_ROW_HEIGHT: Pixels = px(16.);
const TIMESTAMP_ROW_GAP: Pixels = px(4.);
const BOT_LABEL_HEIGHT: Pixels = px(16.);
const BOT_LABEL_GAP: Pixels = px(4.);
const ESTIMATED_TEXT_LINE_HEIGHT: Pixels = px(18.);
const ESTIMATED_CHAR_WIDTH: f32 = 7.0;

/// Connection state of the live message feed behind this list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedPhase {
    Idle,
    Connecting,
    Live,
    Failed(String),
}

struct SizeCacheEntry {
    layout_hash: u64,
    height: Pixels,
    measured: bool,
}

/// Virtualized message history for the active chat.
pub struct MessageList {
    messages: Vec<MessageRecord>,
    own_user_id: Option<Uuid>,
    composing: bool,
    phase: FeedPhase,
    has_selection: bool,
    item_sizes: Rc<Vec<Size<Pixels>>>,
    scroll_manager: ScrollManager,
    size_cache: HashMap<MessageId, SizeCacheEntry>,
    content_width: Option<Pixels>,
}

impl MessageList {
    pub fn new(_cx: &mut Context<Self>) -> Self {
        Self {
            messages: Vec::new(),
            own_user_id: None,
            composing: false,
            phase: FeedPhase::Idle,
            has_selection: false,
            item_sizes: Rc::new(Vec::new()),
            scroll_manager: ScrollManager::new(),
            size_cache: HashMap::new(),
            content_width: None,
        }
    }

    pub fn set_messages(&mut self, messages: Vec<MessageRecord>, cx: &mut Context<Self>) {
        self.messages = messages;
        self.rebuild_item_sizes();

        // Every snapshot reveals the newest message unless the user
        // scrolled away from the tail.
        self.scroll_manager.request_scroll_to_bottom_if_following();

        cx.notify();
    }

    pub fn clear_messages(&mut self, cx: &mut Context<Self>) {
        self.messages.clear();
        self.size_cache.clear();
        self.item_sizes = Rc::new(Vec::new());
        cx.notify();
    }

    pub fn set_own_user_id(&mut self, user_id: Option<Uuid>, cx: &mut Context<Self>) {
        self.own_user_id = user_id;
        cx.notify();
    }

    pub fn set_composing(&mut self, composing: bool, cx: &mut Context<Self>) {
        if self.composing != composing {
            self.composing = composing;
            if composing {
                self.scroll_manager.request_scroll_to_bottom_if_following();
            }
            cx.notify();
        }
    }

    pub fn set_phase(&mut self, phase: FeedPhase, cx: &mut Context<Self>) {
        self.phase = phase;
        cx.notify();
    }

    pub fn set_has_selection(&mut self, has_selection: bool, cx: &mut Context<Self>) {
        self.has_selection = has_selection;
        cx.notify();
    }

    pub fn reset_scroll_tracking(&mut self, cx: &mut Context<Self>) {
        self.scroll_manager.reset();
        cx.notify();
    }

    fn update_content_width(&mut self, cx: &mut Context<Self>) {
        let list_width = self.scroll_manager.bounds().size.width;
        if list_width <= Pixels::ZERO {
            return;
        }

        let next_content_width = max_pixels(px(1.), list_width - LIST_HORIZONTAL_PADDING * 2);
        let width_changed = self.content_width.is_none_or(|current| {
            (f32::from(current) - f32::from(next_content_width)).abs()
                > CONTENT_WIDTH_CHANGE_EPSILON
        });

        if width_changed {
            self.content_width = Some(next_content_width);

            // Mark cached measurements dirty so item heights can be recalculated for new width.
            for entry in self.size_cache.values_mut() {
                entry.measured = false;
            }

            self.rebuild_item_sizes();
            cx.notify();
        }
    }

    fn rebuild_item_sizes(&mut self) {
        let content_width = self.content_width.unwrap_or(DEFAULT_CONTENT_WIDTH);
        let own_user_id = self.own_user_id;
        let mut active_ids = HashSet::with_capacity(self.messages.len());
        let mut sizes = Vec::with_capacity(self.messages.len());

        for message in &self.messages {
            let next_hash = layout_hash(message, own_user_id);
            let estimated_height = estimate_message_height(message, own_user_id, content_width);

            let entry = self.size_cache.entry(message.id).or_insert(SizeCacheEntry {
                layout_hash: next_hash,
                height: estimated_height,
                measured: false,
            });

            // Keep cache entries stable by message id and invalidate only on content changes.
            if entry.layout_hash != next_hash {
                entry.layout_hash = next_hash;
                entry.height = estimated_height;
                entry.measured = false;
            } else if !entry.measured {
                entry.height = estimated_height;
            }

            sizes.push(size(px(0.), entry.height));
            active_ids.insert(message.id);
        }

        self.size_cache.retain(|id, _| active_ids.contains(id));
        self.item_sizes = Rc::new(sizes);
    }

    fn measure_visible_items(
        &mut self,
        visible_range: Range<usize>,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) {
        if self.messages.is_empty() {
            return;
        }

        let content_width = self.content_width.unwrap_or(DEFAULT_CONTENT_WIDTH);
        let own_user_id = self.own_user_id;
        let available_space = size(
            AvailableSpace::Definite(content_width),
            AvailableSpace::MinContent,
        );
        let mut updated = false;

        for index in visible_range {
            let Some(message) = self.messages.get(index).cloned() else {
                continue;
            };

            let next_hash = layout_hash(&message, own_user_id);
            let estimated_height = estimate_message_height(&message, own_user_id, content_width);

            {
                let entry = self.size_cache.entry(message.id).or_insert(SizeCacheEntry {
                    layout_hash: next_hash,
                    height: estimated_height,
                    measured: false,
                });

                if entry.layout_hash != next_hash {
                    entry.layout_hash = next_hash;
                    entry.height = estimated_height;
                    entry.measured = false;
                }
            }

            let mut row = self.render_message_row(&message, cx);
            let measured_height = row.layout_as_root(available_space, window, cx).height;
            let Some(entry) = self.size_cache.get_mut(&message.id) else {
                continue;
            };
            let height_changed = !entry.measured || pixels_changed(entry.height, measured_height);
            if height_changed {
                entry.height = measured_height;
                updated = true;
            }
            entry.measured = true;
        }

        if updated {
            self.rebuild_item_sizes();
            cx.notify();
        }
    }

    fn render_message_row(&self, message: &MessageRecord, cx: &mut Context<Self>) -> AnyElement {
        let theme = cx.theme();
        let content = if message.content.is_empty() {
            " ".to_string()
        } else {
            message.content.clone()
        };
        let timestamp = message
            .created_at
            .with_timezone(&chrono::Local)
            .format("%H:%M:%S")
            .to_string();

        match bubble_kind(message, self.own_user_id) {
            BubbleKind::Own => v_flex()
                .w_full()
                .items_end()
                .gap_1()
                .child(
                    div()
                        .max_w(BUBBLE_MAX_WIDTH)
                        .px(BUBBLE_PADDING_X)
                        .py(BUBBLE_PADDING_Y)
                        .rounded_lg()
                        .bg(theme.accent)
                        .text_color(theme.accent_foreground)
                        .child(Label::new(content).text_sm()),
                )
                .child(
                    Label::new(timestamp)
                        .text_xs()
                        .text_color(theme.foreground.opacity(0.5)),
                )
                .into_any_element(),
            BubbleKind::Peer => v_flex()
                .w_full()
                .items_start()
                .gap_1()
                .child(
                    div()
                        .max_w(BUBBLE_MAX_WIDTH)
                        .px(BUBBLE_PADDING_X)
                        .py(BUBBLE_PADDING_Y)
                        .rounded_lg()
                        .bg(theme.muted)
                        .child(Label::new(content).text_sm()),
                )
                .child(
                    Label::new(timestamp)
                        .text_xs()
                        .text_color(theme.foreground.opacity(0.5)),
                )
                .into_any_element(),
            BubbleKind::Bot => v_flex()
                .w_full()
                .items_start()
                .gap_1()
                .child(Label::new("Bot").text_xs().text_color(theme.primary))
                .child(
                    div()
                        .max_w(BUBBLE_MAX_WIDTH)
                        .px(BUBBLE_PADDING_X)
                        .py(BUBBLE_PADDING_Y)
                        .rounded_lg()
                        .border_1()
                        .border_color(theme.primary)
                        .bg(theme.muted)
                        .child(Label::new(content).text_sm()),
                )
                .child(
                    Label::new(timestamp)
                        .text_xs()
                        .text_color(theme.foreground.opacity(0.5)),
                )
                .into_any_element(),
        }
    }

    fn render_notice(&self, text: &str, cx: &mut Context<Self>) -> AnyElement {
        let theme = cx.theme();
        v_flex()
            .size_full()
            .items_center()
            .justify_center()
            .child(
                Label::new(text.to_string())
                    .text_sm()
                    .text_color(theme.muted_foreground),
            )
            .into_any_element()
    }
}

impl Render for MessageList {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        if !self.has_selection {
            return v_flex()
                .size_full()
                .child(self.render_notice("Select a chat to start messaging", cx));
        }

        if matches!(self.phase, FeedPhase::Connecting) && self.messages.is_empty() {
            return v_flex()
                .size_full()
                .child(self.render_notice("Connecting...", cx));
        }

        self.update_content_width(cx);
        self.scroll_manager.update_follow_state();
        self.scroll_manager.apply_pending_scroll();

        let theme = cx.theme();
        let feed_error = match &self.phase {
            FeedPhase::Failed(message) => Some(message.clone()),
            _ => None,
        };

        v_flex()
            .size_full()
            .min_h_0()
            .when_some(feed_error, |column, error| {
                column.child(
                    h_flex().w_full().px_4().py_2().child(
                        Label::new(error).text_xs().text_color(theme.danger),
                    ),
                )
            })
            .child(
                v_virtual_list(
                    cx.entity().clone(),
                    "message-list",
                    self.item_sizes.clone(),
                    |this, visible_range, window, cx| {
                        // Measure only visible rows so long histories keep O(visible) layout work.
                        this.update_content_width(cx);
                        this.measure_visible_items(visible_range.clone(), window, cx);
                        visible_range
                            .filter_map(|index| {
                                this.messages
                                    .get(index)
                                    .cloned()
                                    .map(|message| this.render_message_row(&message, cx))
                            })
                            .collect::<Vec<_>>()
                    },
                )
                .flex_1()
                .px_4()
                .py_3()
                .gap_4()
                .track_scroll(self.scroll_manager.handle()),
            )
            .when(self.composing, |column| {
                column.child(
                    h_flex()
                        .w_full()
                        .px_4()
                        .py_2()
                        .gap_2()
                        .items_center()
                        .child(div().size(px(8.)).rounded_full().bg(theme.primary))
                        .child(
                            Label::new("Bot is typing...")
                                .text_xs()
                                .text_color(theme.foreground.opacity(0.65)),
                        ),
                )
            })
    }
}

fn layout_hash(message: &MessageRecord, own_user_id: Option<Uuid>) -> u64 {
    let mut hasher = DefaultHasher::new();

    hasher.write(message.id.as_uuid().as_bytes());

    let kind_tag = match bubble_kind(message, own_user_id) {
        BubbleKind::Own => 0,
        BubbleKind::Peer => 1,
        BubbleKind::Bot => 2,
    };
    hasher.write_u8(kind_tag);
    hasher.write(message.content.as_bytes());
    hasher.finish()
}

fn estimate_message_height(
    message: &MessageRecord,
    own_user_id: Option<Uuid>,
    content_width: Pixels,
) -> Pixels {
    let bubble_width = min_pixels(content_width, BUBBLE_MAX_WIDTH);
    let text_width = max_pixels(px(1.), bubble_width - BUBBLE_PADDING_X * 2);
    let text_height = estimate_text_height(&message.content, text_width);
    let mut total_height =
        text_height + BUBBLE_PADDING_Y * 2 + TIMESTAMP_ROW_GAP + TIMESTAMP_ROW_HEIGHT;

    if bubble_kind(message, own_user_id) == BubbleKind::Bot {
        total_height += BOT_LABEL_HEIGHT + BOT_LABEL_GAP;
    }

    total_height
}

fn estimate_text_height(content: &str, width: Pixels) -> Pixels {
    if content.is_empty() {
        return ESTIMATED_TEXT_LINE_HEIGHT;
    }

    let width_as_f32 = f32::from(width);
    let chars_per_line = (width_as_f32 / ESTIMATED_CHAR_WIDTH).floor().max(1.0) as usize;

    let mut line_count = 0usize;
    for line in content.lines() {
        let char_count = line.chars().count().max(1);
        line_count += char_count.div_ceil(chars_per_line);
    }

    // Account for the trailing empty line when content ends with a newline.
    if content.ends_with('\n') {
        line_count += 1;
    }

    ESTIMATED_TEXT_LINE_HEIGHT * line_count.max(1)
}

fn max_pixels(a: Pixels, b: Pixels) -> Pixels {
    if f32::from(a) >= f32::from(b) { a } else { b }
}

fn min_pixels(a: Pixels, b: Pixels) -> Pixels {
    if f32::from(a) <= f32::from(b) { a } else { b }
}

fn pixels_changed(a: Pixels, b: Pixels) -> bool {
    (f32::from(a) - f32::from(b)).abs() > 0.5
}

#[cfg(test)]
mod tests {
    use core::prelude::v1::test;

    use super::*;
    use chrono::Utc;
    use parlor_gateway::MessageId;

    fn fixture_message(index: usize, own: Uuid, other: Uuid) -> MessageRecord {
        let (user_id, is_bot) = match index % 3 {
            0 => (Some(own), false),
            1 => (Some(other), false),
            _ => (None, true),
        };

        MessageRecord {
            id: MessageId::new(Uuid::new_v4()),
            user_id,
            content: format!("message-{index}: virtualization fixture payload"),
            created_at: Utc::now(),
            is_bot,
        }
    }

    #[test]
    fn large_history_fixture_keeps_row_metrics_deterministic() {
        let own = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut messages = (0..2_000)
            .map(|index| fixture_message(index, own, other))
            .collect::<Vec<_>>();

        let content_width = px(680.);
        let heights_before = messages
            .iter()
            .map(|message| estimate_message_height(message, Some(own), content_width))
            .collect::<Vec<_>>();
        let hashes_before = messages
            .iter()
            .map(|message| layout_hash(message, Some(own)))
            .collect::<Vec<_>>();

        assert_eq!(heights_before.len(), 2_000);
        assert!(heights_before.iter().all(|height| *height > Pixels::ZERO));

        if let Some(last_message) = messages.last_mut() {
            // Tail-only mutation should invalidate only the final row hash.
            last_message.content.push_str(" [edited]");
        }

        let hashes_after = messages
            .iter()
            .map(|message| layout_hash(message, Some(own)))
            .collect::<Vec<_>>();

        assert_eq!(hashes_before[..1_999], hashes_after[..1_999]);
        assert_ne!(hashes_before[1_999], hashes_after[1_999]);
    }

    #[test]
    fn bot_rows_reserve_extra_height_for_the_label() {
        let own = Uuid::new_v4();
        let now = Utc::now();
        let peer_row = MessageRecord {
            id: MessageId::new(Uuid::new_v4()),
            user_id: Some(Uuid::new_v4()),
            content: "same content".to_string(),
            created_at: now,
            is_bot: false,
        };
        let bot_row = MessageRecord {
            id: MessageId::new(Uuid::new_v4()),
            user_id: None,
            content: "same content".to_string(),
            created_at: now,
            is_bot: true,
        };

        let width = px(680.);
        let peer_height = estimate_message_height(&peer_row, Some(own), width);
        let bot_height = estimate_message_height(&bot_row, Some(own), width);

        assert!(bot_height > peer_height);
    }
}
