use super::controller::StartOutcome;
use super::state::CredentialsForm;
use super::ImageUploader;
use crate::config::UploadMode;
use crate::layout::masonry::CARD_PADDING;
use crate::upload::{AggregatedStatus, CardStatus, FileId, ManagedFile};
use crate::utils::color::Palette;
use eframe::egui::{self, Align2, Color32, Rect, RichText, Sense, Stroke};
use rfd::FileDialog;
use std::time::Instant;
use tracing::{error, warn};

const CARD_MARGIN: f32 = 300.0;
const SENTINEL_MARGIN: f32 = 400.0;
const SENTINEL_HEIGHT: f32 = 1.0;
const UPLOAD_PRESET_DOCS: &str = "https://cloudinary.com/documentation/upload_presets";

impl ImageUploader {
    pub fn render(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("action_bar")
            .min_height(48.0)
            .show(ctx, |ui| {
                ui.add_space(8.0);
                self.render_action_bar(ui);
                ui.add_space(8.0);
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.heading("Image Uploader");
                ui.label(
                    RichText::new("Drop images here or pick them from disk")
                        .color(ui.visuals().text_color().gamma_multiply(0.7)),
                );
            });
            ui.add_space(10.0);
            self.render_drop_zone(ui);
            self.render_notices(ui);
            ui.add_space(10.0);

            egui::ScrollArea::vertical()
                .auto_shrink([false, false])
                .show(ui, |ui| self.render_previews(ui));
        });

        if self.controller.is_credentials_open() {
            self.render_credentials(ctx);
        } else {
            self.state.form_loaded = false;
        }
    }

    pub fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        let (dropped, hovered) = ctx.input(|i| {
            (
                i.raw.dropped_files.clone(),
                !i.raw.hovered_files.is_empty(),
            )
        });
        self.state.drop_hovered = hovered;

        for file in dropped {
            match (&file.path, &file.bytes) {
                (Some(path), _) if path.is_dir() => {
                    self.controller.add_folder(path);
                }
                (Some(path), _) => {
                    self.controller.add_path(path);
                }
                (None, Some(bytes)) => {
                    self.controller.add_bytes(&file.name, bytes.to_vec());
                }
                (None, None) => warn!(name = %file.name, "Dropped file has no content"),
            }
        }
    }

    fn render_drop_zone(&mut self, ui: &mut egui::Ui) {
        let fill = if self.state.drop_hovered {
            Palette::color(Palette::DROP_ACTIVE)
        } else {
            ui.visuals().extreme_bg_color
        };
        let extensions = self.controller.restrictions().dialog_extensions();
        let hint = self.controller.restrictions().summary();
        egui::Frame::none()
            .fill(fill)
            .stroke(Stroke::new(1.0, Palette::color(Palette::MUTED)))
            .rounding(8.0)
            .inner_margin(16.0)
            .show(ui, |ui| {
                ui.set_width(ui.available_width());
                ui.vertical_centered(|ui| {
                    ui.label("Drag & drop images, or");
                    ui.horizontal(|ui| {
                        if ui.button("🖼 Select Files").clicked() {
                            let mut dialog = FileDialog::new();
                            if !extensions.is_empty() {
                                dialog = dialog.add_filter("Images", extensions.as_slice());
                            }
                            if let Some(paths) = dialog.pick_files() {
                                self.controller.add_paths(&paths);
                            }
                        }
                        if ui.button("📁 Select Folder").clicked() {
                            if let Some(folder) = FileDialog::new().pick_folder() {
                                self.controller.add_folder(&folder);
                            }
                        }
                    });
                    ui.label(
                        RichText::new(hint)
                            .small()
                            .color(Palette::color(Palette::MUTED)),
                    );
                });
            });
    }

    fn render_notices(&mut self, ui: &mut egui::Ui) {
        let mut dismissed = None;
        for (index, notice) in self.controller.notices().iter().enumerate() {
            ui.horizontal(|ui| {
                ui.colored_label(Palette::color(Palette::DANGER), &notice.reason);
                if ui.small_button("✕").clicked() {
                    dismissed = Some(index);
                }
            });
        }
        if let Some(index) = dismissed {
            self.controller.dismiss_notice(index);
        }
    }

    fn render_previews(&mut self, ui: &mut egui::Ui) {
        let now = Instant::now();
        let width = ui.available_width();
        let layout = self.controller.layout(width);
        let masonry = *self.controller.masonry();
        let offset = masonry.centering_offset(width, layout.columns);
        let Some(snapshot) = self.controller.shared_snapshot() else {
            return;
        };

        let (area, _) = ui.allocate_exact_size(
            egui::vec2(width, layout.container_height + SENTINEL_HEIGHT),
            Sense::hover(),
        );
        let clip = ui.clip_rect();
        let mut removed: Option<FileId> = None;

        for placement in &layout.items {
            let Some(file) = snapshot.file(&placement.id) else {
                continue;
            };
            let height = file.thumbnail_height().unwrap_or(masonry.default_height)
                + masonry.chrome_height;
            let rect = Rect::from_min_size(
                area.min + egui::vec2(offset + placement.left, placement.top),
                egui::vec2(masonry.item_width, height),
            );

            if self.controller.is_observing_card(&file.id) {
                let near = clip.expand2(egui::vec2(0.0, CARD_MARGIN)).intersects(rect);
                self.controller.report_card(&file.id, near, now);
            }
            if ui.is_rect_visible(rect) && self.render_card(ui, rect, file) {
                removed = Some(file.id.clone());
            }
        }

        if self.controller.is_observing_sentinel() {
            let sentinel = Rect::from_min_size(
                egui::pos2(area.min.x, area.min.y + layout.container_height),
                egui::vec2(width, SENTINEL_HEIGHT),
            );
            let reach = Rect::from_min_max(clip.min, clip.max + egui::vec2(0.0, SENTINEL_MARGIN));
            self.controller.report_sentinel(reach.intersects(sentinel), now);
        }

        if let Some(id) = removed {
            self.controller.remove_file(&id);
        }
    }

    /// Draws one card. Returns whether its remove button was clicked.
    fn render_card(&mut self, ui: &mut egui::Ui, rect: Rect, file: &ManagedFile) -> bool {
        let status = CardStatus::of(file);
        let content_width = rect.width() - 2.0 * CARD_PADDING;
        let mut remove = false;

        ui.painter()
            .rect_filled(rect, 8.0, ui.visuals().faint_bg_color);
        ui.allocate_ui_at_rect(rect.shrink(CARD_PADDING), |ui| {
            match &file.preview {
                Some(preview) => {
                    let texture = self.state.textures.get_or_load(ui.ctx(), &file.id, preview);
                    let size = egui::vec2(content_width, preview.scaled_height(content_width));
                    ui.add(egui::Image::new(egui::load::SizedTexture::new(
                        texture.id(),
                        size,
                    )));
                }
                None => {
                    let (placeholder, _) = ui.allocate_exact_size(
                        egui::vec2(content_width, self.controller.masonry().default_height),
                        Sense::hover(),
                    );
                    ui.painter()
                        .rect_filled(placeholder, 4.0, Palette::color(Palette::PLACEHOLDER));
                    ui.painter().text(
                        placeholder.center(),
                        Align2::CENTER_CENTER,
                        "🖼",
                        egui::FontId::proportional(32.0),
                        Palette::color(Palette::MUTED),
                    );
                }
            }

            ui.horizontal(|ui| {
                ui.add(egui::Label::new(RichText::new(&file.name).strong()).truncate(true));
                if status.is_removable() {
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.small_button("✕").on_hover_text("Remove").clicked() {
                            remove = true;
                        }
                    });
                }
            });
            ui.label(RichText::new(status.label(file.size)).small().color(card_color(status)));
        });

        remove
    }

    fn render_action_bar(&mut self, ui: &mut egui::Ui) {
        let status = self.controller.status();
        ui.horizontal(|ui| match status {
            AggregatedStatus::Idle => {
                let has_files = self.controller.file_count() > 0;
                ui.add_enabled_ui(has_files, |ui| {
                    let upload = egui::Button::new(RichText::new("📤 Upload").color(Color32::WHITE))
                        .fill(Palette::color(Palette::ACCENT))
                        .min_size(egui::vec2(120.0, 32.0));
                    if ui.add(upload).clicked() {
                        if let StartOutcome::NeedsCredentials = self.controller.start_upload() {
                            self.state.form_loaded = false;
                        }
                    }
                    if ui.button("Cancel").clicked() {
                        self.controller.cancel();
                    }
                });

                if self.controller.mode() == UploadMode::Cloudinary {
                    ui.separator();
                    let credentials = self.controller.credentials();
                    if credentials.is_complete() {
                        ui.label(format!(
                            "Cloud: {} · Preset: {}",
                            credentials.cloud_name, credentials.upload_preset
                        ));
                    }
                    let link = RichText::new("Add/Update Cloudinary Details")
                        .color(Palette::color(Palette::LINK));
                    if ui.link(link).clicked() {
                        self.controller.open_credentials();
                    }
                }

                if let Some(error) = self.controller.start_error() {
                    ui.colored_label(Palette::color(Palette::DANGER), error);
                }
            }
            AggregatedStatus::Uploading => {
                let progress = self.controller.progress();
                let fraction = self
                    .controller
                    .snapshot()
                    .map_or(0.0, |s| f32::from(s.total_progress) / 100.0);
                ui.add(egui::Spinner::new());
                ui.label(progress.summary());
                ui.add(
                    egui::ProgressBar::new(fraction)
                        .show_percentage()
                        .fill(Palette::color(Palette::ACCENT)),
                );
            }
            AggregatedStatus::Completed => {
                ui.colored_label(Palette::color(Palette::SUCCESS), "✅ All files uploaded");
                if ui.button("Done").clicked() {
                    self.controller.done();
                }
            }
            AggregatedStatus::Errored => {
                let message = self
                    .controller
                    .snapshot()
                    .and_then(|s| s.error.clone())
                    .unwrap_or_default();
                ui.colored_label(Palette::color(Palette::DANGER), message);
                if ui.button("🔄 Retry Failed").clicked() {
                    self.controller.retry();
                }
                if ui.button("Cancel").clicked() {
                    self.controller.cancel();
                }
            }
        });
    }

    fn render_credentials(&mut self, ctx: &egui::Context) {
        if !self.state.form_loaded {
            self.state.form = CredentialsForm::from_saved(self.controller.credentials());
            self.state.form_loaded = true;
        }

        let mut save = false;
        let mut close = false;
        egui::Window::new("Cloudinary Details")
            .collapsible(false)
            .resizable(false)
            .anchor(Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                let form = &mut self.state.form;
                ui.label("Uploads go to your Cloudinary account through an unsigned preset.");
                ui.add_space(8.0);
                egui::Grid::new("credentials_grid")
                    .num_columns(2)
                    .spacing([8.0, 6.0])
                    .show(ui, |ui| {
                        ui.label("Cloud name");
                        ui.add(egui::TextEdit::singleline(&mut form.cloud_name).hint_text("my-cloud"));
                        ui.end_row();
                        ui.label("Upload preset");
                        ui.add(
                            egui::TextEdit::singleline(&mut form.upload_preset)
                                .hint_text("unsigned_preset"),
                        );
                        ui.end_row();
                    });

                if ui.link("How do I create an upload preset?").clicked() {
                    if let Err(e) = open::that(UPLOAD_PRESET_DOCS) {
                        error!("Failed to open link: {}", e);
                    }
                }
                if let Some(message) = &form.error {
                    ui.colored_label(Palette::color(Palette::DANGER), message);
                }

                ui.add_space(8.0);
                ui.horizontal(|ui| {
                    save = ui.button("Save").clicked();
                    close = ui.button("Cancel").clicked();
                });
            });

        if save {
            let form = &self.state.form;
            match self
                .controller
                .save_credentials(&form.cloud_name, &form.upload_preset)
            {
                Ok(true) => self.state.form_loaded = false,
                Ok(false) => {
                    self.state.form.error =
                        Some("Both cloud name and upload preset are required".to_string());
                }
                Err(e) => {
                    error!("Failed to save Cloudinary details: {}", e);
                    self.state.form.error = Some(format!("Could not save details: {}", e));
                }
            }
        } else if close {
            self.controller.close_credentials();
            self.state.form_loaded = false;
        }
    }
}

fn card_color(status: CardStatus) -> Color32 {
    match status {
        CardStatus::Pending => Palette::color(Palette::MUTED),
        CardStatus::Uploading { .. } => Palette::color(Palette::ACCENT),
        CardStatus::Completed => Palette::color(Palette::SUCCESS),
        CardStatus::Failed => Palette::color(Palette::DANGER),
    }
}
