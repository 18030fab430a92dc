use crate::chat::persist::ThreadRepository;
use crate::conversation::{Conversation, SendPhase};
use crate::event::AppEvent;
use crate::theme::Theme;
use crate::ui::conversation_view::{self, MessageCache};
use crate::ui::{navigator, preview_view};
use eframe::egui::{self, RichText, ScrollArea};
use std::sync::mpsc::{Receiver, TryRecvError};
use tracing::{debug, error, warn};

pub struct LuminaApp {
    rx: Receiver<AppEvent>,
    conversation: Conversation,
    repository: ThreadRepository,
    last_saved_revision: u64,
    theme: Theme,
    message_cache: MessageCache,
    model: String,
    sidebar_collapsed: bool,
    channel_closed: bool,
}

impl LuminaApp {
    pub fn new(
        rx: Receiver<AppEvent>,
        conversation: Conversation,
        repository: ThreadRepository,
        theme: Theme,
        model: String,
    ) -> Self {
        Self {
            rx,
            conversation,
            repository,
            // A restored collection starts at revision 0 and needs no write.
            last_saved_revision: 0,
            theme,
            message_cache: MessageCache::default(),
            model,
            sidebar_collapsed: false,
            channel_closed: false,
        }
    }

    fn drain_events(&mut self) {
        if self.channel_closed {
            return;
        }
        loop {
            match self.rx.try_recv() {
                Ok(event) => self.conversation.apply_event(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    warn!("event channel disconnected");
                    self.channel_closed = true;
                    break;
                }
            }
        }
    }

    /// Writes the thread collection whenever it changed since the last write.
    fn persist_if_changed(&mut self) {
        let revision = self.conversation.store().revision();
        if revision == self.last_saved_revision {
            return;
        }
        match self.repository.save(&self.conversation.store().snapshot()) {
            Ok(()) => debug!(revision, "threads persisted"),
            Err(err) => error!("failed to persist threads: {err}"),
        }
        // A failed write is not retried until the next change.
        self.last_saved_revision = revision;
    }

    fn status_label(&self) -> Option<&'static str> {
        match self.conversation.phase() {
            SendPhase::Idle | SendPhase::Extracting => None,
            SendPhase::Sending => Some("Sending..."),
            SendPhase::Streaming => Some("Streaming..."),
        }
    }

    fn render_top_bar(&mut self, ctx: &egui::Context) {
        let theme = &self.theme;
        let status = self.status_label();
        egui::TopBottomPanel::top("top_bar")
            .frame(theme.panel_frame(theme.surface_0, theme.spacing_8 as i8))
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    let title = self
                        .conversation
                        .store()
                        .active_thread()
                        .map(|thread| thread.title.clone())
                        .unwrap_or_default();
                    ui.label(RichText::new(title).strong());
                    ui.separator();
                    ui.label(
                        RichText::new(&self.model)
                            .color(theme.text_muted)
                            .monospace()
                            .size(11.0),
                    );
                    if let Some(status) = status {
                        ui.separator();
                        ui.spinner();
                        ui.label(RichText::new(status).color(theme.accent_soft));
                    }

                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        let preview = self.conversation.preview_mut();
                        if !preview.is_visible()
                            && preview.document().is_some()
                            && ui.add(theme.primary_button("معاينة التصميم")).clicked()
                        {
                            preview.reopen();
                        }
                    });
                });
            });
    }

    fn render_diagnostics(&mut self, ctx: &egui::Context) {
        let theme = &self.theme;
        egui::TopBottomPanel::bottom("diagnostics_panel")
            .frame(theme.panel_frame(theme.surface_0, theme.spacing_8 as i8))
            .show(ctx, |ui| {
                egui::CollapsingHeader::new(RichText::new("Diagnostics").color(theme.text_faint))
                    .default_open(false)
                    .show(ui, |ui| {
                        ScrollArea::vertical()
                            .id_salt("diagnostics_log")
                            .max_height(90.0)
                            .stick_to_bottom(true)
                            .show(ui, |ui| {
                                for entry in self.conversation.diagnostics() {
                                    ui.label(RichText::new(entry).monospace().size(11.0));
                                }
                            });
                    });
            });
    }

    fn render_center_panel(&mut self, ctx: &egui::Context) {
        let theme = &self.theme;
        egui::CentralPanel::default()
            .frame(theme.panel_frame(theme.surface_0, theme.spacing_24 as i8))
            .show(ctx, |ui| {
                conversation_view::render(
                    ui,
                    theme,
                    &mut self.conversation,
                    &mut self.message_cache,
                );
            });
    }
}

impl eframe::App for LuminaApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_events();
        self.render_top_bar(ctx);
        navigator::render(
            ctx,
            &self.theme,
            &mut self.conversation,
            &mut self.sidebar_collapsed,
        );
        preview_view::render(ctx, &self.theme, self.conversation.preview_mut());
        self.render_diagnostics(ctx);
        self.render_center_panel(ctx);
        self.persist_if_changed();
    }
}
