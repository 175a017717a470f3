use super::transport::UploadTarget;
use super::types::{BatchId, CandidateFile, FileId, Meta, NewFile, UploadSnapshot};
use crate::error::{AdmissionError, UploadError};
use crate::utils::file_size::FileSizeUtils;
use std::path::Path;
use std::sync::mpsc::Receiver;
use std::sync::Arc;

pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;
pub const DEFAULT_ALLOWED_EXTENSIONS: [&str; 5] = [".jpg", ".jpeg", ".png", ".gif", ".webp"];

/// Everything the widget needs from an upload manager.
pub trait UploadManager {
    /// Admits a file or explains why it was refused. Nothing is added on error.
    fn add_file(&self, file: NewFile) -> Result<FileId, AdmissionError>;
    fn remove_file(&self, id: &FileId);
    /// Cancels in-flight uploads and removes every file.
    fn clear(&self);
    /// Cancels in-flight uploads and resets unfinished progress.
    fn cancel_all(&self);
    /// Starts a batch with every file that has not been uploaded yet.
    fn upload(&self) -> Result<BatchId, UploadError>;
    /// Re-submits exactly the files that failed.
    fn retry_all(&self) -> Result<BatchId, UploadError>;
    /// Merges `meta` into one file's metadata.
    fn set_file_meta(&self, id: &FileId, meta: Meta);
    /// Merges `meta` into the upload-wide metadata and every file's metadata.
    fn set_meta(&self, meta: Meta);
    fn set_target(&self, target: UploadTarget);
    fn request_thumbnail(&self, id: &FileId);
    fn cancel_thumbnail(&self, id: &FileId);
    fn is_thumbnail_queued(&self, id: &FileId) -> bool;
    fn subscribe(&self) -> Receiver<Arc<UploadSnapshot>>;
    /// `None` until the first change.
    fn snapshot(&self) -> Option<Arc<UploadSnapshot>>;
    /// Releases workers and subscribers. Returns `false` if already destroyed.
    fn destroy(&self) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Restrictions {
    pub max_file_size: Option<u64>,
    /// Lower-case extensions including the dot, e.g. `.png`.
    pub allowed_extensions: Vec<String>,
}

impl Default for Restrictions {
    fn default() -> Self {
        Self {
            max_file_size: Some(DEFAULT_MAX_FILE_SIZE),
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl Restrictions {
    pub fn check(&self, candidate: &CandidateFile) -> Result<(), AdmissionError> {
        if !self.allows_name(&candidate.name) {
            return Err(AdmissionError::DisallowedType {
                name: candidate.name.clone(),
                allowed: self.allowed_extensions.join(", "),
            });
        }
        if let Some(max) = self.max_file_size {
            if candidate.size > max {
                return Err(AdmissionError::TooLarge {
                    name: candidate.name.clone(),
                    size: candidate.size,
                    max: FileSizeUtils::format_size(max),
                });
            }
        }
        Ok(())
    }

    /// Extensions without the dot, as file dialogs take them.
    pub fn dialog_extensions(&self) -> Vec<String> {
        self.allowed_extensions
            .iter()
            .map(|ext| ext.trim_start_matches('.').to_string())
            .collect()
    }

    /// Drop-zone hint, e.g. "PNG or GIF, up to 10.00 MB each".
    pub fn summary(&self) -> String {
        let mut names: Vec<String> = self
            .dialog_extensions()
            .into_iter()
            .map(|ext| ext.to_uppercase())
            .collect();
        let types = match names.pop() {
            None => "Any file".to_string(),
            Some(last) if names.is_empty() => last,
            Some(last) => format!("{} or {}", names.join(", "), last),
        };
        match self.max_file_size {
            Some(max) => format!("{types}, up to {} each", FileSizeUtils::format_size(max)),
            None => types,
        }
    }

    pub fn allows_name(&self, name: &str) -> bool {
        if self.allowed_extensions.is_empty() {
            return true;
        }
        let Some(ext) = Path::new(name).extension().and_then(|e| e.to_str()) else {
            return false;
        };
        let ext = format!(".{}", ext.to_lowercase());
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed.to_lowercase() == ext)
    }
}

/// Runs before each admission. May rewrite the candidate id; returns whether
/// to admit.
pub type Gatekeeper = Box<dyn Fn(&mut CandidateFile, &UploadSnapshot) -> bool + Send + Sync>;

/// Admits every file, giving a colliding id a random suffix.
pub fn dedupe_gatekeeper() -> Gatekeeper {
    Box::new(|candidate, snapshot| {
        if snapshot.contains(&candidate.id) {
            candidate.id = FileId::from(format!("{}-{}", candidate.id, uuid::Uuid::new_v4()));
        }
        true
    })
}

pub struct UploaderOptions {
    pub restrictions: Restrictions,
    /// Start uploading as soon as a file is admitted.
    pub auto_proceed: bool,
    pub on_before_file_added: Option<Gatekeeper>,
}

impl Default for UploaderOptions {
    fn default() -> Self {
        Self {
            restrictions: Restrictions::default(),
            auto_proceed: false,
            on_before_file_added: Some(dedupe_gatekeeper()),
        }
    }
}
