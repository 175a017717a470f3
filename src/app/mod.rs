pub mod controller;
mod state;
mod ui;

use crate::config::AppConfig;
use crate::settings::SettingsStore;
use crate::upload::{HttpTransport, Uploader, UploaderOptions};
use eframe::{egui, App};
use std::time::{Duration, Instant};
use tracing::info;

use controller::UploadController;
use state::UiState;

const REPAINT_INTERVAL: Duration = Duration::from_millis(100);

pub struct ImageUploader {
    controller: UploadController<Uploader<HttpTransport>>,
    state: UiState,
}

impl ImageUploader {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        config: AppConfig,
        settings: Box<dyn SettingsStore>,
        transport: HttpTransport,
    ) -> Self {
        info!(mode = ?config.mode, page_size = config.page_size, "Initializing image uploader");
        let options = UploaderOptions {
            restrictions: config.restrictions(),
            ..UploaderOptions::default()
        };
        let uploader = Uploader::new(options, transport);
        Self {
            controller: UploadController::new(uploader, &config, settings),
            state: UiState::default(),
        }
    }

    pub fn update_state(&mut self, ctx: &egui::Context) {
        if self.controller.sync() {
            let snapshot = self.controller.shared_snapshot();
            self.state
                .textures
                .retain(|id| snapshot.as_ref().is_some_and(|s| s.contains(id)));
            ctx.request_repaint();
        }
        self.handle_dropped_files(ctx);
    }

    /// Background work reports through channels, which do not wake the UI.
    fn needs_polling(&self) -> bool {
        self.controller.status().is_uploading()
            || self.controller.has_pending_visibility()
            || self.controller.has_queued_thumbnails()
    }
}

impl App for ImageUploader {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.update_state(ctx);
        self.render(ctx);
        self.controller.tick(Instant::now());
        if self.needs_polling() {
            ctx.request_repaint_after(REPAINT_INTERVAL);
        }
    }
}

impl Drop for ImageUploader {
    fn drop(&mut self) {
        self.state.clear();
        if self.controller.teardown() {
            info!("Image uploader closed");
        }
    }
}
