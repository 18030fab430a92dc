use crate::chat::now_millis;
use crate::conversation::Conversation;
use crate::theme::Theme;
use chrono::{Local, TimeZone};
use eframe::egui::{self, RichText, ScrollArea};

const EXPANDED_WIDTH: f32 = 260.0;
const COLLAPSED_WIDTH: f32 = 56.0;

/// `HH:MM` in local time for an epoch-millisecond timestamp.
pub fn time_label(created_at: i64) -> String {
    Local
        .timestamp_millis_opt(created_at)
        .single()
        .map(|time| time.format("%H:%M").to_string())
        .unwrap_or_else(|| "--:--".to_string())
}

pub fn render(
    ctx: &egui::Context,
    theme: &Theme,
    conversation: &mut Conversation,
    collapsed: &mut bool,
) {
    let width = if *collapsed {
        COLLAPSED_WIDTH
    } else {
        EXPANDED_WIDTH
    };

    egui::SidePanel::left("thread_navigator")
        .resizable(false)
        .exact_width(width)
        .frame(theme.panel_frame(theme.surface_0, theme.spacing_12 as i8))
        .show(ctx, |ui| {
            ui.horizontal(|ui| {
                if !*collapsed {
                    ui.label(
                        RichText::new("Lumina AI")
                            .color(theme.accent_soft)
                            .strong()
                            .size(17.0),
                    );
                }
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let icon = if *collapsed { "»" } else { "«" };
                    if ui.add(theme.subtle_button(icon)).clicked() {
                        *collapsed = !*collapsed;
                    }
                });
            });
            ui.add_space(theme.spacing_8);

            let new_label = if *collapsed { "+" } else { "+  دردشة جديدة" };
            let new_button = theme
                .primary_button(new_label)
                .min_size(egui::vec2(ui.available_width(), theme.button_height));
            if ui.add(new_button).clicked() {
                conversation.create_thread(now_millis());
            }
            ui.add_space(theme.spacing_12);

            let mut clicked: Option<String> = None;
            ScrollArea::vertical()
                .id_salt("thread_list")
                .auto_shrink([false, false])
                .max_height((ui.available_height() - 56.0).max(0.0))
                .show(ui, |ui| {
                    let active_id = conversation.store().active_id();
                    for thread in conversation.store().threads() {
                        let is_active = active_id == Some(thread.id.as_str());
                        let dot = if is_active { "●" } else { "○" };
                        let color = if is_active {
                            theme.accent_soft
                        } else {
                            theme.text_muted
                        };

                        let text = if *collapsed {
                            RichText::new(dot).color(color)
                        } else {
                            RichText::new(format!(
                                "{dot}  {}\n     {}",
                                thread.title,
                                time_label(thread.created_at)
                            ))
                            .color(color)
                        };

                        let response = ui
                            .add_sized(
                                [ui.available_width(), 0.0],
                                egui::Button::new(text).selected(is_active),
                            )
                            .on_hover_text(thread.title.as_str());
                        if response.clicked() {
                            clicked = Some(thread.id.clone());
                        }
                    }
                });

            if let Some(thread_id) = clicked {
                conversation.select_thread(&thread_id);
            }

            ui.separator();
            ui.horizontal(|ui| {
                ui.label(
                    RichText::new("LA")
                        .background_color(theme.accent_primary)
                        .color(theme.text_on_accent)
                        .strong(),
                );
                if !*collapsed {
                    ui.vertical(|ui| {
                        ui.label(RichText::new("Lumina Studio").strong().size(12.0));
                        ui.label(
                            RichText::new(format!("{} threads", conversation.store().threads().len()))
                                .color(theme.text_faint)
                                .size(11.0),
                        );
                    });
                }
            });
        });
}
