use crate::settings::CloudCredentials;
use crate::upload::{FileId, Preview};
use eframe::egui::{self, ColorImage, TextureHandle, TextureOptions};
use std::collections::HashMap;

/// Editable copy of the Cloudinary details shown in the prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialsForm {
    pub cloud_name: String,
    pub upload_preset: String,
    pub error: Option<String>,
}

impl CredentialsForm {
    pub fn from_saved(credentials: &CloudCredentials) -> Self {
        Self {
            cloud_name: credentials.cloud_name.clone(),
            upload_preset: credentials.upload_preset.clone(),
            error: None,
        }
    }
}

/// GPU textures for previews, keyed by file.
#[derive(Default)]
pub struct TextureCache {
    textures: HashMap<FileId, TextureHandle>,
}

impl TextureCache {
    pub fn get_or_load(
        &mut self,
        ctx: &egui::Context,
        id: &FileId,
        preview: &Preview,
    ) -> &TextureHandle {
        self.textures.entry(id.clone()).or_insert_with(|| {
            let image = ColorImage::from_rgba_unmultiplied(
                [preview.width as usize, preview.height as usize],
                &preview.pixels,
            );
            ctx.load_texture(format!("preview-{id}"), image, TextureOptions::LINEAR)
        })
    }

    /// Releases textures of files that are gone.
    pub fn retain(&mut self, mut keep: impl FnMut(&FileId) -> bool) {
        self.textures.retain(|id, _| keep(id));
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn clear(&mut self) {
        self.textures.clear();
    }
}

#[derive(Default)]
pub struct UiState {
    pub textures: TextureCache,
    pub form: CredentialsForm,
    pub form_loaded: bool,
    pub drop_hovered: bool,
}

impl UiState {
    pub fn clear(&mut self) {
        *self = UiState::default();
    }
}
