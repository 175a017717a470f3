use std::env;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const FILTER_ENV: &str = "IMAGE_UPLOADER_LOG";
const FILE_ENV: &str = "IMAGE_UPLOADER_LOG_FILE";

/// Installs the global subscriber. Keep the returned guard alive for as long
/// as file logging should flush.
pub fn init_logger() -> Option<WorkerGuard> {
    let filter = env::var(FILTER_ENV).unwrap_or_else(|_| "info".to_string());
    let filter_layer = EnvFilter::new(filter);

    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_file(false)
        .without_time()
        .with_ansi(true);

    let (file_layer, guard) = match env::var(FILE_ENV) {
        Ok(path) => {
            let file_appender = tracing_appender::rolling::never("./", path);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer().with_writer(non_blocking).with_ansi(false);
            (Some(layer), Some(guard))
        }
        Err(_) => (None, None),
    };

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .with(filter_layer)
        .init();

    info!(file_logging = guard.is_some(), "Logging initialized");
    guard
}
