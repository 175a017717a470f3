use derivative::Derivative;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Free-form metadata attached to a file or to the whole upload.
pub type Meta = Map<String, Value>;

pub const META_RELATIVE_PATH: &str = "relativePath";
pub const META_THUMBNAIL_HEIGHT: &str = "thumbnailHeight";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileId(String);

impl FileId {
    /// Derives an id from what identifies a local file. The same file added
    /// twice yields the same id, which the admission gate then resolves.
    pub fn generate(name: &str, mime: &str, size: u64) -> Self {
        let slug: String = name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '-'
                }
            })
            .collect();
        let mime_slug = mime.replace('/', "-");
        Self(format!("uploader-{slug}-{mime_slug}-{size}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for FileId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for FileId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub type BatchId = u64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileProgress {
    pub upload_started: bool,
    pub bytes_uploaded: u64,
    pub upload_complete: bool,
}

/// Decoded thumbnail pixels (RGBA8, row-major).
#[derive(Derivative, Clone, PartialEq, Eq)]
#[derivative(Debug)]
pub struct Preview {
    pub width: u32,
    pub height: u32,
    #[derivative(Debug = "ignore")]
    pub pixels: Arc<[u8]>,
}

impl Preview {
    /// Height of the preview when drawn `width` pixels wide.
    pub fn scaled_height(&self, width: f32) -> f32 {
        if self.width == 0 {
            return 0.0;
        }
        (self.height as f32 * width / self.width as f32).round()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResponse {
    pub status: u16,
    pub url: Option<String>,
}

#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct ManagedFile {
    pub id: FileId,
    pub name: String,
    pub mime: String,
    pub size: u64,
    #[derivative(Debug = "ignore")]
    pub data: Arc<[u8]>,
    pub source: String,
    pub meta: Meta,
    pub preview: Option<Arc<Preview>>,
    pub progress: FileProgress,
    pub error: Option<String>,
    pub response: Option<UploadResponse>,
}

impl ManagedFile {
    pub fn thumbnail_height(&self) -> Option<f32> {
        self.meta
            .get(META_THUMBNAIL_HEIGHT)
            .and_then(Value::as_f64)
            .map(|h| h as f32)
    }
}

/// A file offered to the uploader, before admission.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct NewFile {
    pub name: String,
    pub mime: String,
    #[derivative(Debug = "ignore")]
    pub data: Arc<[u8]>,
    pub source: String,
    pub meta: Meta,
}

impl NewFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            data: data.into(),
            source: "Local".to_string(),
            meta: Meta::new(),
        }
    }

    pub fn with_meta(mut self, key: &str, value: Value) -> Self {
        self.meta.insert(key.to_string(), value);
        self
    }
}

/// What the admission gate sees; it may rewrite `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    pub id: FileId,
    pub name: String,
    pub mime: String,
    pub size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadBatch {
    pub file_ids: Vec<FileId>,
}

/// Point-in-time state of the uploader. Never mutated once published.
#[derive(Debug, Clone, Default)]
pub struct UploadSnapshot {
    files: Vec<ManagedFile>,
    pub current_uploads: BTreeMap<BatchId, UploadBatch>,
    pub total_progress: u8,
    pub error: Option<String>,
    pub meta: Meta,
}

impl UploadSnapshot {
    /// Files in the order they were added.
    pub fn files(&self) -> &[ManagedFile] {
        &self.files
    }

    pub fn file(&self, id: &FileId) -> Option<&ManagedFile> {
        self.files.iter().find(|f| &f.id == id)
    }

    pub fn contains(&self, id: &FileId) -> bool {
        self.file(id).is_some()
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// The oldest batch still in flight.
    pub fn first_batch(&self) -> Option<&UploadBatch> {
        self.current_uploads.values().next()
    }

    pub(crate) fn file_mut(&mut self, id: &FileId) -> Option<&mut ManagedFile> {
        self.files.iter_mut().find(|f| &f.id == id)
    }

    pub(crate) fn files_mut(&mut self) -> impl Iterator<Item = &mut ManagedFile> {
        self.files.iter_mut()
    }

    pub(crate) fn push_file(&mut self, file: ManagedFile) {
        self.files.push(file);
    }

    pub(crate) fn remove_file(&mut self, id: &FileId) -> Option<ManagedFile> {
        let index = self.files.iter().position(|f| &f.id == id)?;
        Some(self.files.remove(index))
    }

    pub(crate) fn clear_files(&mut self) {
        self.files.clear();
    }

    #[cfg(test)]
    pub(crate) fn with_files(files: Vec<ManagedFile>) -> Self {
        Self {
            files,
            ..Self::default()
        }
    }
}

#[cfg(test)]
pub(crate) fn test_file(id: &str, size: u64) -> ManagedFile {
    ManagedFile {
        id: FileId::from(id),
        name: format!("{id}.png"),
        mime: "image/png".to_string(),
        size,
        data: Arc::from(Vec::new()),
        source: "Local".to_string(),
        meta: Meta::new(),
        preview: None,
        progress: FileProgress::default(),
        error: None,
        response: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn same_file_gets_the_same_id() {
        let a = FileId::generate("My Photo.JPG", "image/jpeg", 42);
        let b = FileId::generate("My Photo.JPG", "image/jpeg", 42);
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "uploader-my-photo-jpg-image-jpeg-42");
    }

    #[test]
    fn thumbnail_height_reads_numeric_meta() {
        let mut file = test_file("a", 1);
        assert_eq!(file.thumbnail_height(), None);
        file.meta.insert(META_THUMBNAIL_HEIGHT.to_string(), json!(180));
        assert_eq!(file.thumbnail_height(), Some(180.0));
    }

    #[test]
    fn preview_scales_to_the_card_width() {
        let preview = Preview {
            width: 256,
            height: 128,
            pixels: Arc::from(Vec::new()),
        };
        assert_eq!(preview.scaled_height(224.0), 112.0);
    }

    #[test]
    fn first_batch_is_the_oldest() {
        let mut snapshot = UploadSnapshot::default();
        snapshot.current_uploads.insert(
            7,
            UploadBatch {
                file_ids: vec![FileId::from("late")],
            },
        );
        snapshot.current_uploads.insert(
            3,
            UploadBatch {
                file_ids: vec![FileId::from("early")],
            },
        );
        assert_eq!(
            snapshot.first_batch().map(|b| b.file_ids[0].as_str()),
            Some("early")
        );
    }
}
