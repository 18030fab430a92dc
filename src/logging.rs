//! Logging configuration using tracing

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the logging subsystem.
///
/// Log level is controlled by the `LUMINA_LOG` environment variable, e.g.
/// `LUMINA_LOG=lumina=debug`.
pub fn init() {
    let env_filter =
        EnvFilter::try_from_env("LUMINA_LOG").unwrap_or_else(|_| EnvFilter::new("lumina=info,warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(true)
                .with_line_number(true)
                .compact(),
        )
        .init();

    tracing::debug!("Tracing initialized");
}
