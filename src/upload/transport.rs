use super::types::{Meta, UploadResponse};
use crate::error::{Result as CrateResult, UploadError};
use futures_util::stream;
use reqwest::multipart::{Form, Part};
use reqwest::Body;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

const CLOUDINARY_API: &str = "https://api.cloudinary.com/v1_1";
const CHUNK_SIZE: usize = 64 * 1024;
const USER_AGENT: &str = concat!("image-uploader/", env!("CARGO_PKG_VERSION"));

/// Called with the number of bytes of the file handed to the connection so far.
pub type ProgressFn = Arc<dyn Fn(u64) + Send + Sync>;

/// Where files go and which metadata travels with them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    pub endpoint: String,
    pub field_name: String,
    pub allowed_meta_fields: Vec<String>,
}

impl UploadTarget {
    pub fn local(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            field_name: "file".to_string(),
            allowed_meta_fields: ["name", "resource_type", "upload_preset"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    pub fn cloudinary(cloud_name: &str) -> Self {
        Self::local(format!("{CLOUDINARY_API}/{}/upload", cloud_name.trim()))
    }

    /// Text fields sent alongside the file, in `allowed_meta_fields` order.
    pub fn form_fields(&self, meta: &Meta) -> Vec<(String, String)> {
        self.allowed_meta_fields
            .iter()
            .filter_map(|key| {
                let value = match meta.get(key)? {
                    Value::Null => return None,
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Some((key.clone(), value))
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file_name: String,
    pub mime: String,
    pub data: Arc<[u8]>,
    pub fields: Vec<(String, String)>,
}

/// Sends a single file. Implementations must not retry on their own.
pub trait Transport: Send + Sync + 'static {
    fn send(
        &self,
        target: &UploadTarget,
        request: UploadRequest,
        progress: ProgressFn,
    ) -> impl Future<Output = Result<UploadResponse, UploadError>> + Send;
}

/// Multipart form POST over reqwest.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> CrateResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    async fn send(
        &self,
        target: &UploadTarget,
        request: UploadRequest,
        progress: ProgressFn,
    ) -> Result<UploadResponse, UploadError> {
        let mut form = Form::new();
        for (key, value) in request.fields {
            form = form.text(key, value);
        }
        let length = request.data.len() as u64;
        let body = Body::wrap_stream(chunked(request.data, progress));
        let part = Part::stream_with_length(body, length)
            .file_name(request.file_name.clone())
            .mime_str(&request.mime)
            .map_err(|e| UploadError::Request(e.to_string()))?;
        form = form.part(target.field_name.clone(), part);

        debug!(file = %request.file_name, endpoint = %target.endpoint, "Posting file");
        let response = self
            .client
            .post(&target.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| UploadError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Status(status.as_u16()));
        }

        let url = response
            .json::<Value>()
            .await
            .ok()
            .as_ref()
            .and_then(response_url);

        Ok(UploadResponse {
            status: status.as_u16(),
            url,
        })
    }
}

/// Splits the file into chunks, reporting the running total as each one is
/// pulled by the request body.
fn chunked(
    data: Arc<[u8]>,
    progress: ProgressFn,
) -> impl futures_util::Stream<Item = std::io::Result<Vec<u8>>> + Send + Sync + 'static {
    let len = data.len();
    let chunks = (0..len).step_by(CHUNK_SIZE).map(move |start| {
        let end = (start + CHUNK_SIZE).min(len);
        progress(end as u64);
        Ok(data[start..end].to_vec())
    });
    stream::iter(chunks)
}

fn response_url(body: &Value) -> Option<String> {
    body.get("secure_url")
        .or_else(|| body.get("url"))
        .and_then(Value::as_str)
        .map(str::to_string)
}
