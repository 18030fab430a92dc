mod app;
mod chat;
mod config;
mod conversation;
mod design;
mod error;
mod event;
mod logging;
mod preview;
mod theme;
mod transport;
mod ui;

use app::LuminaApp;
use chat::persist::{FileKeyValueStore, ThreadRepository};
use chat::store::ChatStore;
use conversation::Conversation;
use eframe::egui;
use event::EventSink;
use std::sync::{mpsc, Arc};
use theme::Theme;
use tracing::{info, warn};
use transport::gemini::GeminiClient;
use transport::Transport;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    let settings = config::load_settings(&config::config_path());
    if settings.api_key.is_empty() {
        warn!("no API key configured; set GEMINI_API_KEY or api_key in config.toml");
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("lumina-runtime")
        .build()?;

    let kv_store = FileKeyValueStore::new(settings.resolved_data_dir());
    info!("thread data in {}", kv_store.root().display());
    let repository = ThreadRepository::new(Box::new(kv_store));
    let store = ChatStore::initialize(repository.load_or_discard(), chat::now_millis());

    let client = GeminiClient::new(&settings);
    let model = client.model().to_string();
    let backend = Arc::new(client);
    let (tx, rx) = mpsc::channel();
    let runtime_handle = runtime.handle().clone();
    let _runtime = runtime;

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Lumina Studio")
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([960.0, 600.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Lumina Studio",
        native_options,
        Box::new(move |creation_context| {
            let ctx = creation_context.egui_ctx.clone();
            let sink = EventSink::new(tx).with_waker(move || ctx.request_repaint());
            let transport = Transport::new(backend, sink, runtime_handle, settings.stream);

            let theme = Theme::default();
            theme.apply_visuals(&creation_context.egui_ctx);
            ui::install_fonts(&creation_context.egui_ctx, settings.font_path.as_deref());

            let conversation = Conversation::new(store, transport);
            Ok(Box::new(LuminaApp::new(
                rx,
                conversation,
                repository,
                theme,
                model,
            )))
        }),
    )?;

    Ok(())
}
