pub mod conversation_view;
pub mod navigator;
pub mod preview_view;

use eframe::egui::{self, FontData, FontDefinitions, FontFamily};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const ARABIC_FONT: &str = "arabic-fallback";

fn system_font_candidates() -> Vec<PathBuf> {
    [
        "/usr/share/fonts/truetype/noto/NotoSansArabic-Regular.ttf",
        "/usr/share/fonts/opentype/noto/NotoSansArabic-Regular.ttf",
        "/usr/share/fonts/noto/NotoSansArabic-Regular.ttf",
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/System/Library/Fonts/Supplemental/GeezaPro.ttc",
        "/Library/Fonts/Arial Unicode.ttf",
        "C:\\Windows\\Fonts\\arial.ttf",
        "C:\\Windows\\Fonts\\segoeui.ttf",
    ]
    .iter()
    .map(PathBuf::from)
    .collect()
}

/// The bundled egui fonts have no Arabic glyphs, so register the first
/// readable font with Arabic coverage as a fallback for both families.
pub fn install_fonts(ctx: &egui::Context, preferred: Option<&Path>) {
    let candidates = preferred
        .map(Path::to_path_buf)
        .into_iter()
        .chain(system_font_candidates());

    for path in candidates {
        let Ok(bytes) = std::fs::read(&path) else {
            debug!("font candidate unavailable: {}", path.display());
            continue;
        };

        let mut fonts = FontDefinitions::default();
        fonts
            .font_data
            .insert(ARABIC_FONT.to_string(), FontData::from_owned(bytes).into());
        for family in [FontFamily::Proportional, FontFamily::Monospace] {
            fonts
                .families
                .entry(family)
                .or_default()
                .push(ARABIC_FONT.to_string());
        }
        ctx.set_fonts(fonts);
        info!("using fallback font {}", path.display());
        return;
    }
}

/// Text written mostly in Arabic script is laid out right-aligned.
pub fn is_arabic(text: &str) -> bool {
    text.chars().any(|ch| ('\u{0600}'..='\u{06FF}').contains(&ch))
}
