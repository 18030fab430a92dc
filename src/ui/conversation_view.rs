use crate::chat::{Message, Role};
use crate::conversation::Conversation;
use crate::design::extract::{extract_design, has_open_fence, prose_before_fence};
use crate::design::DesignDocument;
use crate::theme::Theme;
use crate::ui::is_arabic;
use eframe::egui::{self, Key, KeyboardShortcut, Modifiers, RichText, ScrollArea};
use std::collections::HashMap;

/// Preset prompts offered on a fresh thread: (label, prompt).
pub const QUICK_ACTIONS: [(&str, &str); 4] = [
    ("📘 كتاب PDF", "صمم لي كتاباً إلكترونياً بصيغة PDF عن "),
    ("📝 ملخص متقدم", "اكتب ملخصاً متقدماً ومنظماً عن "),
    ("🎨 لوحة إلهام", "صمم لوحة إلهام بصرية (Mood Board) لـ "),
    ("💻 كود نظيف", "اكتب كوداً نظيفاً وموثقاً يقوم بـ "),
];

const DESIGN_READY: &str = "تم إنشاء التصميم بنجاح!";
const DESIGNING: &str = "جاري تصميم الصفحات...";
const COMPOSER_HINT: &str = "اكتب رسالتك هنا...";

/// How a message bubble is drawn. The prose before a design fence is cut
/// from the message text at draw time.
#[derive(Debug, Clone, PartialEq)]
enum BodyKind {
    Plain,
    /// A complete design block; `None` when it did not parse.
    Design(Option<DesignDocument>),
    /// The reply is still streaming inside an open design block.
    Designing,
}

fn classify(message: &Message) -> BodyKind {
    if message.role == Role::User {
        return BodyKind::Plain;
    }
    match extract_design(&message.text) {
        Ok(Some(document)) => BodyKind::Design(Some(document)),
        Err(_) => BodyKind::Design(None),
        Ok(None) if has_open_fence(&message.text) => BodyKind::Designing,
        Ok(None) => BodyKind::Plain,
    }
}

/// Classified bodies keyed by thread id and message position. An entry is
/// reused while the text length is unchanged, so a finished design block is
/// parsed once rather than on every frame.
#[derive(Debug, Default)]
pub struct MessageCache {
    entries: HashMap<(String, usize), (usize, BodyKind)>,
}

impl MessageCache {
    fn kind(&mut self, thread_id: &str, index: usize, message: &Message) -> &BodyKind {
        let len = message.text.len();
        let entry = self
            .entries
            .entry((thread_id.to_string(), index))
            .or_insert_with(|| (len, classify(message)));
        if entry.0 != len {
            *entry = (len, classify(message));
        }
        &entry.1
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

pub fn render(
    ui: &mut egui::Ui,
    theme: &Theme,
    conversation: &mut Conversation,
    cache: &mut MessageCache,
) {
    let composer_height = 120.0;
    let list_height = (ui.available_height() - composer_height).max(120.0);
    let scroll_request = conversation.take_scroll_request();
    let mut open_design: Option<DesignDocument> = None;

    ScrollArea::vertical()
        .id_salt("conversation_messages")
        .auto_shrink([false, false])
        .stick_to_bottom(true)
        .max_height(list_height)
        .show(ui, |ui| {
            ui.set_width(ui.available_width());
            if let Some(thread) = conversation.store().active_thread() {
                for (index, message) in thread.messages.iter().enumerate() {
                    let kind = cache.kind(&thread.id, index, message);
                    ui.push_id(index, |ui| {
                        if let Some(document) = render_message(ui, theme, message, kind) {
                            open_design = Some(document);
                        }
                    });
                    ui.add_space(theme.spacing_8);
                }
            }

            if conversation.is_generating() {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label(RichText::new("Lumina AI يكتب...").color(theme.text_muted));
                });
            }

            if conversation.show_quick_actions() {
                ui.add_space(theme.spacing_16);
                render_quick_actions(ui, theme, conversation);
            }

            if scroll_request {
                ui.scroll_to_cursor(Some(egui::Align::BOTTOM));
            }
        });

    if let Some(document) = open_design {
        conversation.preview_mut().activate(document);
    }

    ui.add_space(theme.spacing_8);
    render_composer(ui, theme, conversation);
}

/// Returns a design document when its "open preview" button was clicked.
fn render_message(
    ui: &mut egui::Ui,
    theme: &Theme,
    message: &Message,
    kind: &BodyKind,
) -> Option<DesignDocument> {
    let from_user = message.role == Role::User;
    let mut clicked = None;

    let layout = if from_user {
        egui::Layout::top_down(egui::Align::Max)
    } else {
        egui::Layout::top_down(egui::Align::Min)
    };

    ui.with_layout(layout, |ui| {
        ui.label(
            RichText::new(if from_user { "أنت" } else { "Lumina AI" })
                .color(theme.text_faint)
                .size(11.0),
        );
        let max_width = ui.available_width() * 0.8;
        theme.bubble_frame(from_user).show(ui, |ui| {
            ui.set_max_width(max_width);
            let prose = prose_before_fence(&message.text);
            match kind {
                BodyKind::Plain => render_text(ui, theme, &message.text, from_user),
                BodyKind::Designing => {
                    render_text(ui, theme, prose, from_user);
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label(RichText::new(DESIGNING).color(theme.accent_soft));
                    });
                }
                BodyKind::Design(document) => {
                    render_text(ui, theme, prose, from_user);
                    clicked = render_design_card(ui, theme, document.as_ref());
                }
            }

            if !from_user {
                ui.horizontal(|ui| {
                    if ui
                        .add(theme.subtle_button("نسخ").small())
                        .on_hover_text("Copy message")
                        .clicked()
                    {
                        ui.ctx().copy_text(message.text.clone());
                    }
                });
            }
        });
    });

    clicked
}

fn render_text(ui: &mut egui::Ui, theme: &Theme, text: &str, from_user: bool) {
    if text.trim().is_empty() {
        return;
    }
    let color = if from_user {
        theme.text_on_accent
    } else {
        theme.text_primary
    };
    let align = if is_arabic(text) {
        egui::Align::Max
    } else {
        egui::Align::Min
    };
    ui.with_layout(egui::Layout::top_down(align), |ui| {
        ui.add(egui::Label::new(RichText::new(text.trim()).color(color)).wrap());
    });
}

fn render_design_card(
    ui: &mut egui::Ui,
    theme: &Theme,
    document: Option<&DesignDocument>,
) -> Option<DesignDocument> {
    let mut clicked = None;
    theme.card_frame().fill(theme.surface_2).show(ui, |ui| match document {
        Some(document) => {
            ui.label(RichText::new(format!("✅ {DESIGN_READY}")).color(theme.accent_soft).strong());
            ui.label(
                RichText::new(format!("{} · {} صفحات", document.title, document.page_count()))
                    .color(theme.text_muted)
                    .size(12.0),
            );
            if ui.add(theme.primary_button("فتح المعاينة")).clicked() {
                clicked = Some(document.clone());
            }
        }
        None => {
            ui.label(RichText::new("تعذر قراءة التصميم").color(theme.danger));
        }
    });
    clicked
}

fn render_quick_actions(ui: &mut egui::Ui, theme: &Theme, conversation: &mut Conversation) {
    let mut chosen: Option<&str> = None;
    ui.horizontal_wrapped(|ui| {
        for (label, prompt) in QUICK_ACTIONS {
            if ui.add(theme.subtle_button(label)).clicked() {
                chosen = Some(prompt);
            }
        }
    });
    if let Some(prompt) = chosen {
        conversation.apply_quick_action(prompt);
    }
}

fn render_composer(ui: &mut egui::Ui, theme: &Theme, conversation: &mut Conversation) {
    let mut submit = false;
    theme.composer_frame().show(ui, |ui| {
        ui.horizontal(|ui| {
            let send_width = 72.0;
            let editor = egui::TextEdit::multiline(conversation.input_mut())
                .hint_text(COMPOSER_HINT)
                .desired_rows(2)
                .desired_width(ui.available_width() - send_width - theme.spacing_12)
                .return_key(Some(KeyboardShortcut::new(Modifiers::SHIFT, Key::Enter)))
                .frame(false);
            let response = ui.add(editor);

            if response.has_focus()
                && ui.input(|input| input.key_pressed(Key::Enter) && !input.modifiers.shift)
            {
                submit = true;
            }

            let send = theme
                .primary_button(if conversation.is_generating() { "..." } else { "إرسال" })
                .min_size(egui::vec2(send_width, theme.button_height));
            if ui.add_enabled(conversation.can_submit(), send).clicked() {
                submit = true;
            }
        });
    });

    ui.label(
        RichText::new("Enter للإرسال · Shift+Enter لسطر جديد")
            .color(theme.text_faint)
            .size(10.0),
    );

    if submit {
        conversation.submit();
    }
}
