use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder};

use crate::errors::Error;
use crate::resolver::join_path;
use crate::retry::OperationKind;

const UPLOAD_CHUNK_BYTES: usize = 64 * 1024;

/// Called with `(bytes_sent, total_bytes)` while an upload body is streamed.
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// One file submitted as a multipart form field.
#[derive(Clone, Debug)]
pub struct FileUpload {
    pub field_name: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl FileUpload {
    pub fn new(file_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            field_name: "file".to_string(),
            file_name: file_name.into(),
            content_type: None,
            data: data.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn from_path(path: impl AsRef<std::path::Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| Error::Config(format!("'{}' has no file name", path.display())))?;
        Ok(Self::new(file_name, data))
    }
}

#[derive(Clone, Debug)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    Multipart(FileUpload),
}

/// Outgoing request relative to the resolved base URL. Cloned freely so the
/// same request can be re-issued after a wake-up.
#[derive(Clone)]
pub struct ApiRequest {
    pub operation: OperationKind,
    pub method: Method,
    pub path: String,
    pub body: RequestBody,
    pub headers: HeaderMap,
    pub timeout: Option<Duration>,
    progress: Option<ProgressFn>,
    retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            operation: OperationKind::Custom,
            method,
            path: path.into(),
            body: RequestBody::Empty,
            headers: HeaderMap::new(),
            timeout: None,
            progress: None,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_operation(mut self, operation: OperationKind) -> Self {
        self.operation = operation;
        self
    }

    pub fn with_json(mut self, body: serde_json::Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn with_upload(mut self, upload: FileUpload) -> Self {
        self.body = RequestBody::Multipart(upload);
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn on_progress<F>(mut self, progress: F) -> Self
    where
        F: Fn(u64, u64) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(progress));
        self
    }

    /// Whether this request already went through its one wake-and-retry cycle.
    pub fn retried(&self) -> bool {
        self.retried
    }

    pub(crate) fn mark_retried(&mut self) {
        self.retried = true;
    }

    /// The request's own timeout, or `fallback` when none was set.
    pub fn effective_timeout(&self, fallback: Duration) -> Duration {
        self.timeout.unwrap_or(fallback)
    }

    pub(crate) fn build(
        &self,
        http: &Client,
        base_url: &str,
        fallback_timeout: Duration,
    ) -> Result<RequestBuilder, Error> {
        let url = join_path(base_url, &self.path);
        let mut builder = http
            .request(self.method.clone(), url)
            .headers(self.headers.clone())
            .timeout(self.effective_timeout(fallback_timeout));
        builder = match &self.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart(upload) => builder.multipart(self.form(upload)?),
        };
        Ok(builder)
    }

    fn form(&self, upload: &FileUpload) -> Result<Form, Error> {
        let total = upload.data.len() as u64;
        let body = progress_body(upload.data.clone(), self.progress.clone());
        let mut part = Part::stream_with_length(body, total).file_name(upload.file_name.clone());
        if let Some(content_type) = &upload.content_type {
            part = part.mime_str(content_type)?;
        }
        Ok(Form::new().part(upload.field_name.clone(), part))
    }
}

impl fmt::Debug for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiRequest")
            .field("operation", &self.operation)
            .field("method", &self.method)
            .field("path", &self.path)
            .field("body", &self.body)
            .field("timeout", &self.timeout)
            .field("retried", &self.retried)
            .finish()
    }
}

fn progress_body(data: Bytes, progress: Option<ProgressFn>) -> reqwest::Body {
    let total = data.len() as u64;
    let chunks: Vec<Bytes> = (0..data.len())
        .step_by(UPLOAD_CHUNK_BYTES)
        .map(|start| data.slice(start..(start + UPLOAD_CHUNK_BYTES).min(data.len())))
        .collect();
    let mut sent = 0u64;
    let stream = futures_util::stream::iter(chunks.into_iter().map(move |chunk| {
        sent += chunk.len() as u64;
        if let Some(progress) = &progress {
            progress(sent, total);
        }
        Ok::<Bytes, std::io::Error>(chunk)
    }));
    reqwest::Body::wrap_stream(stream)
}
