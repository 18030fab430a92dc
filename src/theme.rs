use eframe::egui::{self, Color32, CornerRadius, FontId, Frame, Margin, Stroke, TextStyle};

#[derive(Debug, Clone)]
pub struct Theme {
    pub surface_0: Color32,
    pub surface_1: Color32,
    pub surface_2: Color32,
    pub surface_3: Color32,
    pub accent_primary: Color32,
    pub accent_muted: Color32,
    pub accent_soft: Color32,
    pub danger: Color32,
    pub text_primary: Color32,
    pub text_muted: Color32,
    pub text_faint: Color32,
    pub text_on_accent: Color32,
    pub border_subtle: Color32,
    pub paper: Color32,
    pub paper_ink: Color32,
    pub paper_muted: Color32,
    pub paper_rule: Color32,
    pub paper_slot: Color32,
    pub spacing_8: f32,
    pub spacing_12: f32,
    pub spacing_16: f32,
    pub spacing_24: f32,
    pub radius_8: u8,
    pub radius_12: u8,
    pub radius_18: u8,
    pub button_height: f32,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            surface_0: Color32::from_rgb(0x02, 0x06, 0x17),
            surface_1: Color32::from_rgb(0x0F, 0x17, 0x2A),
            surface_2: Color32::from_rgb(0x1E, 0x29, 0x3B),
            surface_3: Color32::from_rgb(0x33, 0x41, 0x55),
            accent_primary: Color32::from_rgb(0x4F, 0x46, 0xE5),
            accent_muted: Color32::from_rgb(0x43, 0x38, 0xCA),
            accent_soft: Color32::from_rgb(0x81, 0x8C, 0xF8),
            danger: Color32::from_rgb(0xEF, 0x44, 0x44),
            text_primary: Color32::from_rgb(0xE2, 0xE8, 0xF0),
            text_muted: Color32::from_rgb(0x94, 0xA3, 0xB8),
            text_faint: Color32::from_rgb(0x64, 0x74, 0x8B),
            text_on_accent: Color32::WHITE,
            border_subtle: Color32::from_rgba_premultiplied(255, 255, 255, 13),
            paper: Color32::WHITE,
            paper_ink: Color32::from_rgb(0x0F, 0x17, 0x2A),
            paper_muted: Color32::from_rgb(0x64, 0x74, 0x8B),
            paper_rule: Color32::from_rgb(0xE2, 0xE8, 0xF0),
            paper_slot: Color32::from_rgb(0xF8, 0xFA, 0xFC),
            spacing_8: Self::P8,
            spacing_12: Self::P12,
            spacing_16: Self::P16,
            spacing_24: Self::P24,
            radius_8: Self::R8,
            radius_12: Self::R12,
            radius_18: 18,
            button_height: 35.0,
        }
    }
}

impl Theme {
    pub const R8: u8 = 8;
    pub const R12: u8 = 12;
    pub const P8: f32 = 8.0;
    pub const P12: f32 = 12.0;
    pub const P16: f32 = 16.0;
    pub const P24: f32 = 24.0;

    pub fn apply_visuals(&self, ctx: &egui::Context) {
        let mut visuals = egui::Visuals::dark();
        visuals.panel_fill = self.surface_0;
        visuals.override_text_color = Some(self.text_primary);
        visuals.widgets.noninteractive.bg_fill = self.surface_1;
        visuals.widgets.noninteractive.weak_bg_fill = self.surface_1;
        visuals.widgets.noninteractive.bg_stroke = Stroke::new(1.0, self.border_subtle);
        visuals.widgets.inactive.bg_fill = self.surface_2;
        visuals.widgets.inactive.weak_bg_fill = self.surface_2;
        visuals.widgets.inactive.bg_stroke = Stroke::NONE;
        visuals.widgets.hovered.bg_fill = self.surface_3;
        visuals.widgets.hovered.weak_bg_fill = self.surface_3;
        visuals.widgets.hovered.bg_stroke = Stroke::NONE;
        visuals.widgets.active.bg_fill = self.accent_muted;
        visuals.widgets.active.bg_stroke = Stroke::NONE;
        visuals.selection.bg_fill = self.accent_muted;
        visuals.hyperlink_color = self.accent_soft;
        visuals.extreme_bg_color = self.surface_0;
        visuals.window_fill = self.surface_1;
        visuals.window_stroke = Stroke::NONE;
        visuals.window_corner_radius = CornerRadius::same(self.radius_12);

        let mut style = (*ctx.style()).clone();
        style.visuals = visuals;
        style.spacing.item_spacing = egui::vec2(10.0, 10.0);
        style.spacing.button_padding = egui::vec2(12.0, 8.0);
        style.text_styles.insert(TextStyle::Heading, FontId::proportional(17.0));
        style.text_styles.insert(TextStyle::Body, FontId::proportional(14.0));
        style.text_styles.insert(TextStyle::Monospace, FontId::monospace(13.0));
        style.text_styles.insert(TextStyle::Small, FontId::proportional(11.0));
        ctx.set_style(style);
    }

    pub fn panel_frame(&self, fill: Color32, inner_padding: i8) -> Frame {
        Frame::new()
            .fill(fill)
            .inner_margin(Margin::same(inner_padding))
            .corner_radius(CornerRadius::same(self.radius_12))
            .stroke(Stroke::NONE)
    }

    pub fn card_frame(&self) -> Frame {
        self.panel_frame(self.surface_1, self.spacing_12 as i8)
            .stroke(Stroke::new(1.0, self.border_subtle))
    }

    /// Message bubble; user bubbles are filled with the accent.
    pub fn bubble_frame(&self, from_user: bool) -> Frame {
        let fill = if from_user {
            self.accent_primary
        } else {
            self.surface_1
        };
        Frame::new()
            .fill(fill)
            .inner_margin(Margin::same(self.spacing_16 as i8))
            .corner_radius(CornerRadius::same(self.radius_18))
            .stroke(if from_user {
                Stroke::NONE
            } else {
                Stroke::new(1.0, self.border_subtle)
            })
    }

    pub fn composer_frame(&self) -> Frame {
        Frame::new()
            .fill(self.surface_1)
            .inner_margin(Margin::symmetric(self.spacing_12 as i8, 10))
            .corner_radius(CornerRadius::same(self.radius_12))
            .stroke(Stroke::new(1.0, self.border_subtle))
    }

    pub fn primary_button(&self, label: &str) -> egui::Button<'static> {
        egui::Button::new(
            egui::RichText::new(label.to_string())
                .color(self.text_on_accent)
                .strong(),
        )
        .fill(self.accent_primary)
        .stroke(Stroke::NONE)
        .corner_radius(CornerRadius::same(self.radius_8))
        .min_size(egui::vec2(0.0, self.button_height))
    }

    pub fn subtle_button(&self, label: &str) -> egui::Button<'static> {
        egui::Button::new(egui::RichText::new(label.to_string()).color(self.text_muted))
            .fill(Color32::TRANSPARENT)
            .stroke(Stroke::new(1.0, self.border_subtle))
            .corner_radius(CornerRadius::same(self.radius_8))
    }
}
