use super::types::{ManagedFile, UploadSnapshot};
use crate::utils::file_size::FileSizeUtils;

/// Overall state of the uploader as shown in the action bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AggregatedStatus {
    #[default]
    Idle,
    Uploading,
    Completed,
    Errored,
}

impl AggregatedStatus {
    pub fn derive(snapshot: Option<&UploadSnapshot>) -> Self {
        let Some(snapshot) = snapshot else {
            return Self::Idle;
        };

        if !snapshot.current_uploads.is_empty() {
            Self::Uploading
        } else if snapshot.error.is_some() {
            Self::Errored
        } else if snapshot.total_progress == 100 {
            Self::Completed
        } else {
            Self::Idle
        }
    }

    pub fn is_uploading(self) -> bool {
        self == Self::Uploading
    }

    pub fn is_completed(self) -> bool {
        self == Self::Completed
    }

    pub fn is_errored(self) -> bool {
        self == Self::Errored
    }
}

/// Progress counters for the in-flight batch. All zero when nothing uploads.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UploadProgress {
    pub total_upload_bytes: u64,
    /// Approximation from the aggregate percentage; may be fractional.
    pub uploaded_bytes: f64,
    pub total_upload_files_count: usize,
    pub current_uploaded_files_count: usize,
}

impl UploadProgress {
    pub fn derive(snapshot: Option<&UploadSnapshot>) -> Self {
        let Some(snapshot) = snapshot else {
            return Self::default();
        };
        let Some(batch) = snapshot.first_batch() else {
            return Self::default();
        };

        let batch_files = || batch.file_ids.iter().filter_map(|id| snapshot.file(id));
        let total_upload_bytes: u64 = batch_files().map(|f| f.size).sum();
        let current_uploaded_files_count = batch_files()
            .filter(|f| f.progress.upload_complete)
            .count();

        Self {
            total_upload_bytes,
            uploaded_bytes: total_upload_bytes as f64 * f64::from(snapshot.total_progress) / 100.0,
            total_upload_files_count: batch.file_ids.len(),
            current_uploaded_files_count,
        }
    }

    pub fn summary(&self) -> String {
        let noun = if self.total_upload_files_count == 1 {
            "file"
        } else {
            "files"
        };
        format!(
            "{} of {} · {} of {} {}",
            FileSizeUtils::format_bytes(self.uploaded_bytes),
            FileSizeUtils::format_size(self.total_upload_bytes),
            self.current_uploaded_files_count,
            self.total_upload_files_count,
            noun
        )
    }
}

/// Per-card upload state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardStatus {
    Pending,
    Uploading { bytes_uploaded: u64, size: u64 },
    Completed,
    Failed,
}

impl CardStatus {
    pub fn of(file: &ManagedFile) -> Self {
        if file.error.is_none()
            && file.progress.upload_started
            && !file.progress.upload_complete
        {
            CardStatus::Uploading {
                bytes_uploaded: file.progress.bytes_uploaded,
                size: file.size,
            }
        } else if file.progress.upload_complete {
            CardStatus::Completed
        } else if file.error.is_some() {
            CardStatus::Failed
        } else {
            CardStatus::Pending
        }
    }

    /// Files can be removed until they start uploading or finish.
    pub fn is_removable(self) -> bool {
        matches!(self, CardStatus::Pending | CardStatus::Failed)
    }

    pub fn label(self, size: u64) -> String {
        let formatted = FileSizeUtils::format_size(size);
        match self {
            CardStatus::Uploading { bytes_uploaded, .. } => format!(
                "Uploading: {} of {}",
                FileSizeUtils::format_size(bytes_uploaded),
                formatted
            ),
            CardStatus::Completed => format!("Uploaded: {formatted}"),
            CardStatus::Failed => format!("Upload Failed: {formatted}"),
            CardStatus::Pending => formatted,
        }
    }
}
