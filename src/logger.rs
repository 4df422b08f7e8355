//! Logging configuration

use std::sync::{LazyLock, Once};
use tracing_subscriber::{
    fmt, fmt::time::ChronoLocal, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

static HOSTNAME: LazyLock<String> = LazyLock::new(|| {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
});

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

pub fn init_logger() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(env_filter("info"))
        .with(
            fmt::layer()
                .with_timer(ChronoLocal::rfc_3339())
                .with_target(false)
                .with_level(true)
                .with_ansi(true)
                .with_file(true)
                .with_line_number(true)
                .compact(),
        )
        .init();

    tracing::info!(hostname = %get_hostname(), "Logger initialized");
}

#[cfg(feature = "json")]
pub fn init_logger_json() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(env_filter("info"))
        .with(
            fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(true)
                .with_span_list(true),
        )
        .init();

    tracing::info!(hostname = %get_hostname(), "Logger initialized (JSON format)");
}

static TEST_LOGGER: Once = Once::new();

/// Quiet logger for tests; safe to call from every test.
pub fn init_test_logger() {
    use tracing_subscriber::fmt::TestWriter;

    TEST_LOGGER.call_once(|| {
        let _ = tracing_subscriber::registry()
            .with(env_filter("error"))
            .with(
                fmt::layer()
                    .with_writer(TestWriter::default())
                    .with_target(false)
                    .with_ansi(false)
                    .compact(),
            )
            .try_init();
    });
}

pub fn get_hostname() -> &'static str {
    &HOSTNAME
}
