use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid configuration: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Failed to serialize configuration: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("Failed to decode image: {0}")]
    Image(#[from] image::ImageError),
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Why a file was refused before it entered the upload set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    #[error("{name} exceeds maximum allowed size of {max}")]
    TooLarge { name: String, size: u64, max: String },
    #[error("{name}: you can only upload {allowed}")]
    DisallowedType { name: String, allowed: String },
    #[error("{name} was rejected")]
    Rejected { name: String },
    #[error("Cannot add the duplicate file '{name}', it already exists")]
    Duplicate { name: String },
}

impl AdmissionError {
    pub fn file_name(&self) -> &str {
        match self {
            AdmissionError::TooLarge { name, .. }
            | AdmissionError::DisallowedType { name, .. }
            | AdmissionError::Rejected { name }
            | AdmissionError::Duplicate { name } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error("No files to upload")]
    NothingToUpload,
    #[error("Upload destination is not configured")]
    TargetNotConfigured,
    #[error("Failed to send request: {0}")]
    Request(String),
    #[error("Upload failed with status: {0}")]
    Status(u16),
    #[error("Failed to start upload runtime: {0}")]
    Runtime(String),
}
