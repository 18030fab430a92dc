use crate::design::{DesignDocument, Page, PageLayout, ShapeElement, ShapeKind};
use crate::preview::PreviewState;
use crate::theme::Theme;
use eframe::egui::{
    self, Align2, Color32, CornerRadius, FontId, Painter, Pos2, Rect, RichText, Sense, Stroke,
    StrokeKind, Vec2,
};

/// Shape coordinates are expressed on this grid, matching the A4 ratio.
pub const GRID_WIDTH: f32 = 100.0;
pub const GRID_HEIGHT: f32 = 141.0;

const PAGE_RATIO: f32 = 1.414;
const MAX_PAGE_WIDTH: f32 = 500.0;
const PANEL_WIDTH: f32 = 560.0;

const DEFAULT_BODY: &str = "Your content is professionally typeset here. Lumina ensures all \
layouts are perfectly balanced for high-quality export to Canva. Artifacts and design \
distortions are eliminated through our structured schema translation.";

/// Largest A4 rectangle centred in `available`.
pub fn page_rect(available: Rect) -> Rect {
    let width = available
        .width()
        .min(available.height() / PAGE_RATIO)
        .min(MAX_PAGE_WIDTH)
        .max(0.0);
    Rect::from_center_size(available.center(), egui::vec2(width, width * PAGE_RATIO))
}

/// Maps an element from grid units onto the painted page.
pub fn element_rect(page: Rect, element: &ShapeElement) -> Rect {
    let sx = page.width() / GRID_WIDTH;
    let sy = page.height() / GRID_HEIGHT;
    Rect::from_min_size(
        egui::pos2(page.min.x + element.x * sx, page.min.y + element.y * sy),
        egui::vec2(element.w.max(0.0) * sx, element.h.max(0.0) * sy),
    )
}

pub fn page_marker(index: usize) -> String {
    format!("0{}", index + 1)
}

fn body_or_default(page: &Page) -> &str {
    page.content
        .body
        .as_deref()
        .filter(|body| !body.trim().is_empty())
        .unwrap_or(DEFAULT_BODY)
}

pub fn render(ctx: &egui::Context, theme: &Theme, preview: &mut PreviewState) {
    if !preview.is_visible() {
        return;
    }

    egui::SidePanel::right("design_preview")
        .resizable(true)
        .default_width(PANEL_WIDTH)
        .frame(theme.panel_frame(theme.surface_1, theme.spacing_16 as i8))
        .show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(
                    RichText::new("LUMINA DESIGN STUDIO")
                        .color(theme.text_primary)
                        .strong()
                        .size(13.0),
                );
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.add(theme.subtle_button("✕")).on_hover_text("Close preview").clicked() {
                        preview.hide();
                    }
                });
            });
            ui.separator();

            let (Some(document), Some(page)) = (preview.document(), preview.current_page()) else {
                return;
            };

            let canvas_height = (ui.available_height() - 150.0).max(200.0);
            let (canvas, _) = ui.allocate_exact_size(
                egui::vec2(ui.available_width(), canvas_height),
                Sense::hover(),
            );
            let rect = page_rect(canvas);
            let painter = ui.painter_at(rect);
            paint_page(&painter, theme, rect, document, page, preview.page_index());

            ui.add_space(theme.spacing_16);
            render_navigation(ui, theme, preview);
            ui.add_space(theme.spacing_12);
            render_details(ui, theme);
        });
}

fn render_navigation(ui: &mut egui::Ui, theme: &Theme, preview: &mut PreviewState) {
    let count = preview.page_count();
    let current = preview.page_index();
    let layout = preview
        .current_page()
        .map(|page| page.layout.as_str())
        .unwrap_or_default();
    let mut target: Option<usize> = None;

    ui.vertical_centered(|ui| {
        theme.composer_frame().show(ui, |ui| {
            ui.horizontal(|ui| {
                if ui
                    .add_enabled(preview.can_go_back(), theme.subtle_button("◀"))
                    .clicked()
                {
                    preview.previous_page();
                }

                for index in 0..count {
                    let width = if index == current { 24.0 } else { 8.0 };
                    let (dot, response) =
                        ui.allocate_exact_size(egui::vec2(width, 4.0), Sense::click());
                    let color = if index == current {
                        theme.accent_primary
                    } else {
                        theme.surface_3
                    };
                    ui.painter().rect_filled(dot, CornerRadius::same(2), color);
                    if response.on_hover_text(format!("Page {}", index + 1)).clicked() {
                        target = Some(index);
                    }
                }

                if ui
                    .add_enabled(preview.can_go_forward(), theme.subtle_button("▶"))
                    .clicked()
                {
                    preview.next_page();
                }
            });
        });
        ui.label(
            RichText::new(format!("{} / {} · {layout}", current + 1, count))
                .color(theme.text_faint)
                .size(11.0),
        );
    });

    if let Some(index) = target {
        preview.go_to(index);
    }
}

fn render_details(ui: &mut egui::Ui, theme: &Theme) {
    ui.columns(2, |columns| {
        theme.card_frame().show(&mut columns[0], |ui| {
            ui.vertical_centered(|ui| {
                ui.label(RichText::new("ACTIVE PALETTE").color(theme.text_faint).size(10.0));
                ui.horizontal(|ui| {
                    for color in [
                        theme.accent_primary,
                        theme.surface_1,
                        theme.paper_rule,
                        theme.paper,
                    ] {
                        let (swatch, _) = ui.allocate_exact_size(Vec2::splat(16.0), Sense::hover());
                        ui.painter().circle_filled(swatch.center(), 8.0, color);
                    }
                });
            });
        });
        theme.card_frame().show(&mut columns[1], |ui| {
            ui.vertical_centered(|ui| {
                ui.label(RichText::new("GRID SYSTEM").color(theme.text_faint).size(10.0));
                ui.label(
                    RichText::new("Canva A4 Std")
                        .color(theme.accent_soft)
                        .monospace(),
                );
            });
        });
    });
}

fn paint_page(
    painter: &Painter,
    theme: &Theme,
    rect: Rect,
    document: &DesignDocument,
    page: &Page,
    index: usize,
) {
    match page.layout {
        PageLayout::Cover => paint_cover(painter, theme, rect, page),
        PageLayout::Content => paint_content(painter, theme, rect, document, page, index),
        PageLayout::Visual => paint_visual(painter, theme, rect, page),
    }
    painter.rect_stroke(
        rect,
        CornerRadius::same(2),
        Stroke::new(1.0, theme.surface_2),
        StrokeKind::Inside,
    );
}

/// Lays out wrapped text and paints it with its top edge at `top`.
/// Returns the bottom edge of the painted block.
fn paint_text(
    painter: &Painter,
    text: &str,
    size: f32,
    color: Color32,
    wrap_width: f32,
    top: Pos2,
    centered: bool,
) -> f32 {
    if text.is_empty() {
        return top.y;
    }
    let galley = painter.layout(text.to_string(), FontId::proportional(size), color, wrap_width);
    let x = if centered {
        top.x - galley.size().x / 2.0
    } else {
        top.x
    };
    let bottom = top.y + galley.size().y;
    painter.galley(egui::pos2(x, top.y), galley, color);
    bottom
}

fn paint_cover(painter: &Painter, theme: &Theme, rect: Rect, page: &Page) {
    let scale = rect.width() / MAX_PAGE_WIDTH;
    let inner = rect.shrink(48.0 * scale);
    let content = &page.content;

    painter.rect_filled(rect, CornerRadius::ZERO, theme.surface_0);
    let glow = Color32::from_rgba_unmultiplied(79, 70, 229, 26);
    painter.circle_filled(
        egui::pos2(rect.right() - 40.0 * scale, rect.top() + 40.0 * scale),
        128.0 * scale,
        glow,
    );
    painter.circle_filled(
        egui::pos2(rect.left() + 40.0 * scale, rect.bottom() - 40.0 * scale),
        128.0 * scale,
        Color32::from_rgba_unmultiplied(147, 51, 234, 26),
    );

    let center_x = rect.center().x;
    let mut y = rect.center().y - 110.0 * scale;
    painter.line_segment(
        [
            egui::pos2(center_x - 32.0 * scale, y),
            egui::pos2(center_x + 32.0 * scale, y),
        ],
        Stroke::new(2.0, theme.accent_primary),
    );
    y += 36.0 * scale;

    let heading = content.heading.as_deref().unwrap_or_default().to_uppercase();
    y = paint_text(
        painter,
        &heading,
        38.0 * scale,
        Color32::WHITE,
        inner.width(),
        egui::pos2(center_x, y),
        true,
    );
    y += 28.0 * scale;
    painter.line_segment(
        [
            egui::pos2(center_x - 48.0 * scale, y),
            egui::pos2(center_x + 48.0 * scale, y),
        ],
        Stroke::new(1.0, theme.surface_2),
    );
    y += 28.0 * scale;

    y = paint_text(
        painter,
        content.subheading.as_deref().unwrap_or_default(),
        19.0 * scale,
        theme.text_muted,
        inner.width(),
        egui::pos2(center_x, y),
        true,
    );
    y += 48.0 * scale;
    paint_text(
        painter,
        &content.body.as_deref().unwrap_or_default().to_uppercase(),
        11.0 * scale,
        theme.text_faint,
        inner.width(),
        egui::pos2(center_x, y),
        true,
    );

    painter.text(
        egui::pos2(center_x, rect.bottom() - 40.0 * scale),
        Align2::CENTER_CENTER,
        "PROFESSIONAL EDITION",
        FontId::monospace(9.0 * scale.max(0.8)),
        theme.surface_3,
    );
}

fn paint_content(
    painter: &Painter,
    theme: &Theme,
    rect: Rect,
    document: &DesignDocument,
    page: &Page,
    index: usize,
) {
    let scale = rect.width() / MAX_PAGE_WIDTH;
    let inner = rect.shrink(48.0 * scale);
    let content = &page.content;

    painter.rect_filled(rect, CornerRadius::ZERO, theme.paper);

    painter.text(
        egui::pos2(inner.right(), inner.top()),
        Align2::RIGHT_TOP,
        page_marker(index),
        FontId::proportional(34.0 * scale),
        theme.paper_rule,
    );
    let header_width = inner.width() - 80.0 * scale;
    let mut y = paint_text(
        painter,
        &content.heading.as_deref().unwrap_or_default().to_uppercase(),
        26.0 * scale,
        theme.paper_ink,
        header_width,
        inner.left_top(),
        false,
    );
    y += 6.0 * scale;
    y = paint_text(
        painter,
        &content.subheading.as_deref().unwrap_or_default().to_uppercase(),
        9.0 * scale,
        theme.paper_muted,
        header_width,
        egui::pos2(inner.left(), y),
        false,
    );
    y = y.max(inner.top() + 40.0 * scale) + 16.0 * scale;
    painter.line_segment(
        [egui::pos2(inner.left(), y), egui::pos2(inner.right(), y)],
        Stroke::new(2.0, theme.paper_ink),
    );
    y += 32.0 * scale;

    y = paint_text(
        painter,
        body_or_default(page),
        12.0 * scale,
        theme.paper_muted,
        inner.width(),
        egui::pos2(inner.left(), y),
        false,
    );
    y += 32.0 * scale;

    let gap = 18.0 * scale;
    let slot_width = (inner.width() - gap) / 2.0;
    let slot_size = egui::vec2(slot_width, slot_width * 9.0 / 16.0);
    for (column, label) in ["IMAGE ASSET PLACEHOLDER", "VISUAL ASSET PLACEHOLDER"]
        .into_iter()
        .enumerate()
    {
        let left = inner.left() + column as f32 * (slot_width + gap);
        let slot = Rect::from_min_size(egui::pos2(left, y), slot_size);
        paint_slot(painter, theme, slot, label, scale);
    }

    let footer_y = inner.bottom() - 8.0 * scale;
    painter.line_segment(
        [
            egui::pos2(inner.left(), footer_y - 16.0 * scale),
            egui::pos2(inner.right(), footer_y - 16.0 * scale),
        ],
        Stroke::new(1.0, theme.paper_slot),
    );
    let footer_font = FontId::proportional(9.0 * scale.max(0.8));
    painter.text(
        egui::pos2(inner.left(), footer_y),
        Align2::LEFT_CENTER,
        document.title.to_uppercase(),
        footer_font.clone(),
        theme.paper_muted,
    );
    painter.text(
        egui::pos2(inner.right(), footer_y),
        Align2::RIGHT_CENTER,
        format!("PAGE {}", index + 1),
        footer_font,
        theme.paper_muted,
    );
}

fn paint_slot(painter: &Painter, theme: &Theme, slot: Rect, label: &str, scale: f32) {
    let radius = CornerRadius::same((16.0 * scale).clamp(2.0, 16.0) as u8);
    painter.rect_filled(slot, radius, theme.paper_slot);
    painter.rect_stroke(
        slot,
        radius,
        Stroke::new(1.0, theme.paper_rule),
        StrokeKind::Inside,
    );
    painter.text(
        slot.center(),
        Align2::CENTER_CENTER,
        label,
        FontId::proportional(8.0 * scale.max(0.8)),
        theme.paper_muted,
    );
}

fn paint_visual(painter: &Painter, theme: &Theme, rect: Rect, page: &Page) {
    let scale = rect.width() / MAX_PAGE_WIDTH;
    let inner = rect.shrink(32.0 * scale);
    let content = &page.content;

    painter.rect_filled(rect, CornerRadius::ZERO, theme.paper);

    if content.elements.is_empty() {
        let bottom = paint_text(
            painter,
            content.heading.as_deref().unwrap_or_default(),
            24.0 * scale,
            theme.paper_ink,
            inner.width(),
            inner.left_top(),
            false,
        );
        let slot = Rect::from_min_max(egui::pos2(inner.left(), bottom + 24.0 * scale), inner.max);
        paint_slot(painter, theme, slot, "VISUAL ASSET PLACEHOLDER", scale);
    } else {
        for element in &content.elements {
            paint_element(painter, theme, rect, element);
        }
        if let Some(heading) = content.heading.as_deref() {
            paint_text(
                painter,
                heading,
                24.0 * scale,
                theme.paper_ink,
                inner.width(),
                inner.left_top(),
                false,
            );
        }
    }

    if let Some(url) = content.image_url.as_deref() {
        painter.text(
            egui::pos2(rect.center().x, rect.bottom() - 16.0 * scale),
            Align2::CENTER_CENTER,
            url,
            FontId::monospace(9.0 * scale.max(0.8)),
            theme.paper_muted,
        );
    }
}

fn paint_element(painter: &Painter, theme: &Theme, page: Rect, element: &ShapeElement) {
    let color = element
        .rgb()
        .map(|[r, g, b]| Color32::from_rgb(r, g, b))
        .unwrap_or(theme.paper_muted);
    let area = element_rect(page, element);

    match element.kind {
        ShapeKind::Rect => {
            painter.rect_filled(area, CornerRadius::ZERO, color);
        }
        ShapeKind::Circle => {
            painter.circle_filled(area.center(), area.width().min(area.height()) / 2.0, color);
        }
        ShapeKind::Line => {
            painter.line_segment([area.min, area.max], Stroke::new(2.0, color));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::PageContent;

    fn shape(kind: ShapeKind, x: f32, y: f32, w: f32, h: f32) -> ShapeElement {
        ShapeElement {
            kind,
            x,
            y,
            w,
            h,
            color: "#4F46E5".to_string(),
        }
    }

    #[test]
    fn elements_scale_from_the_design_grid() {
        let page = Rect::from_min_size(egui::pos2(10.0, 20.0), egui::vec2(200.0, 282.0));
        let rect = element_rect(page, &shape(ShapeKind::Rect, 50.0, 70.5, 25.0, 14.1));

        assert!((rect.min.x - 110.0).abs() < 0.01);
        assert!((rect.min.y - 161.0).abs() < 0.01);
        assert!((rect.width() - 50.0).abs() < 0.01);
        assert!((rect.height() - 28.2).abs() < 0.01);
    }

    #[test]
    fn negative_sizes_collapse_to_zero() {
        let page = Rect::from_min_size(Pos2::ZERO, egui::vec2(100.0, 141.0));
        let rect = element_rect(page, &shape(ShapeKind::Line, 0.0, 0.0, -5.0, 10.0));
        assert_eq!(rect.width(), 0.0);
        assert_eq!(rect.height(), 10.0);
    }

    #[test]
    fn page_rect_keeps_a4_ratio_inside_the_canvas() {
        let canvas = Rect::from_min_size(Pos2::ZERO, egui::vec2(800.0, 600.0));
        let page = page_rect(canvas);

        assert!(page.width() <= canvas.width());
        assert!(page.height() <= canvas.height() + 0.01);
        assert!((page.height() / page.width() - PAGE_RATIO).abs() < 0.001);
        assert_eq!(page.center(), canvas.center());
    }

    #[test]
    fn content_pages_fall_back_to_default_body() {
        let page = Page {
            id: "p1".to_string(),
            layout: PageLayout::Content,
            content: PageContent::default(),
        };
        assert_eq!(body_or_default(&page), DEFAULT_BODY);
        assert_eq!(page_marker(0), "01");
        assert_eq!(page_marker(2), "03");
    }
}
