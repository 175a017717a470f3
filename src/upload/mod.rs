mod manager;
mod status;
mod store;
mod thumbnail;
mod transport;
mod types;
mod uploader;

pub use manager::{
    Restrictions, UploadManager, UploaderOptions, DEFAULT_ALLOWED_EXTENSIONS,
    DEFAULT_MAX_FILE_SIZE,
};
pub use status::{AggregatedStatus, CardStatus, UploadProgress};
pub use transport::{HttpTransport, UploadTarget};
pub use types::{
    BatchId, FileId, ManagedFile, Meta, NewFile, Preview, UploadSnapshot, META_RELATIVE_PATH,
    META_THUMBNAIL_HEIGHT,
};
pub use uploader::Uploader;

#[cfg(test)]
pub(crate) use thumbnail::png_bytes;
#[cfg(test)]
pub(crate) use uploader::tests::MockTransport;
