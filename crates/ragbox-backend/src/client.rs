use std::path::Path;

use futures::stream;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use ragbox_core::Engine;

use crate::answer;

const QUERY_MODE: &str = "hybrid";
const UPLOAD_CHUNK_BYTES: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx response. `message` is the error/message field of a
    /// structured body when one exists, else a generic text with the code.
    #[error("{message}")]
    Server { status: u16, message: String },
}

/// A file staged for upload, with its contents already in memory so the
/// request body can be re-chunked for progress reporting.
#[derive(Debug, Clone)]
pub struct UploadSource {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadSource {
    pub fn from_bytes(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .map(|value| value.to_string_lossy().to_string())
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("invalid file path: {}", path.display()),
                )
            })?;
        let bytes = tokio::fs::read(path).await?;
        Ok(Self { file_name, bytes })
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
    mode: &'a str,
}

/// HTTP client for the retrieval backend. The backend is an opaque
/// collaborator: two endpoints, no auth, no retries, no timeouts.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sends one query to `POST {base}/query/{engine}` and extracts answer
    /// text through the graceful-degradation chain in [`answer`].
    pub async fn query(&self, engine: Engine, query: &str) -> Result<String, BackendError> {
        let endpoint = format!("{}/query/{}", self.base_url, engine);
        let response = self
            .http
            .post(endpoint)
            .json(&QueryRequest {
                query,
                mode: QUERY_MODE,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.text().await {
                Ok(text) if !text.trim().is_empty() => text,
                _ => format!("Request failed: {}", status.as_u16()),
            };
            return Err(BackendError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.contains("application/json"))
            .unwrap_or(false);

        match response.text().await {
            Ok(body) => {
                let text = answer::extract(&body, is_json);
                if text.is_empty() {
                    warn!(engine = %engine, "empty answer content");
                }
                Ok(text)
            }
            Err(error) => {
                warn!(engine = %engine, %error, "unreadable response body");
                Ok(answer::PARSE_FAILURE_PLACEHOLDER.to_owned())
            }
        }
    }

    /// Uploads one file as a multipart `file` field to `POST {base}/upload`.
    /// `progress` receives cumulative percent as body chunks are handed to
    /// the transport; granularity is transport-dependent.
    pub async fn upload<F>(&self, source: UploadSource, progress: F) -> Result<(), BackendError>
    where
        F: Fn(u8) + Send + Sync + 'static,
    {
        let endpoint = format!("{}/upload", self.base_url);
        let total = source.size();

        let body = if source.bytes.is_empty() {
            progress(100);
            Body::from(Vec::new())
        } else {
            progress_body(source.bytes, progress)
        };

        let part = Part::stream_with_length(body, total).file_name(source.file_name);
        let form = Form::new().part("file", part);

        let response = self.http.post(endpoint).multipart(form).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(BackendError::Server {
            status: status.as_u16(),
            message: upload_error_message(status.as_u16(), &body),
        })
    }
}

fn progress_body<F>(bytes: Vec<u8>, progress: F) -> Body
where
    F: Fn(u8) + Send + Sync + 'static,
{
    let total = bytes.len();
    let chunks: Vec<Vec<u8>> = bytes
        .chunks(UPLOAD_CHUNK_BYTES)
        .map(|chunk| chunk.to_vec())
        .collect();

    let mut sent = 0usize;
    let iter = chunks.into_iter().map(move |chunk| {
        sent += chunk.len();
        let percent = (sent as f64 / total as f64 * 100.0).round() as u8;
        progress(percent);
        Ok::<_, std::convert::Infallible>(chunk)
    });
    Body::wrap_stream(stream::iter(iter))
}

/// Prefers the `error`/`message` field of a structured failure body, else a
/// generic message carrying the status code.
fn upload_error_message(status: u16, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        let field = value
            .get("error")
            .and_then(Value::as_str)
            .or_else(|| value.get("message").and_then(Value::as_str));
        if let Some(text) = field {
            if !text.is_empty() {
                return text.to_owned();
            }
        }
    }
    format!("Upload failed ({status})")
}
