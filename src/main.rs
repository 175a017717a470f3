mod app;
mod config;
mod error;
mod layout;
mod logging;
mod settings;
mod upload;
mod utils;

use app::ImageUploader;
use config::AppConfig;
use eframe::CreationContext;
use settings::FileSettingsStore;
use upload::HttpTransport;
use tracing::{error, info, warn};

fn main() {
    let _guard = logging::init_logger();

    let config = config::load().unwrap_or_else(|e| {
        warn!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });
    let settings = FileSettingsStore::open_default();
    info!(settings = %settings.path().display(), "Settings store opened");
    let transport = match HttpTransport::new() {
        Ok(transport) => transport,
        Err(e) => {
            error!("Failed to start: {}", e);
            return;
        }
    };

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_inner_size([900.0, 700.0])
            .with_min_inner_size([400.0, 500.0]),
        ..Default::default()
    };

    if let Err(e) = eframe::run_native(
        "Image Uploader",
        options,
        Box::new(move |cc: &CreationContext| {
            Box::new(ImageUploader::new(cc, config, Box::new(settings), transport))
        }),
    ) {
        error!("Application error: {}", e);
    }
}
