//! Content loading for remote sources.
//!
//! The controller talks to a [`ContentLoader`] rather than to reqwest
//! directly, so tests can substitute canned or failing sources.

use std::io::Read;
use std::time::Duration;

use reqwest::header;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::errors::ExtractError;

const READ_CHUNK: usize = 8 * 1024;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Failure while fetching content.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The request or response failed at the HTTP level.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Reading the response body failed.
    #[error("content read failed: {0}")]
    Io(#[from] std::io::Error),

    /// The cancellation probe fired mid-download.
    #[error("download cancelled")]
    Cancelled,
}

impl From<LoadError> for ExtractError {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::Http(e) => ExtractError::Web(e),
            LoadError::Io(e) => ExtractError::Io(e),
            LoadError::Cancelled => ExtractError::Cancelled,
        }
    }
}

/// What to fetch and how to identify ourselves.
#[derive(Clone, Debug)]
pub struct FetchRequest {
    pub url: Url,
    pub user_agent: String,
    pub api_key: Option<String>,
}

/// A fully fetched body.
#[derive(Clone, Debug, Default)]
pub struct LoadedContent {
    pub bytes: Vec<u8>,
    pub http_status: Option<u16>,
}

/// Fetches the bytes behind a request.
///
/// Implementations report download progress in percent through
/// `progress` and poll `cancelled` between chunks, returning
/// [`LoadError::Cancelled`] as soon as it turns true.
pub trait ContentLoader: Send + Sync {
    fn fetch(
        &self,
        request: &FetchRequest,
        progress: &mut dyn FnMut(u8),
        cancelled: &dyn Fn() -> bool,
    ) -> Result<LoadedContent, LoadError>;
}

/// Blocking HTTP loader used outside of tests.
pub struct HttpLoader {
    client: reqwest::blocking::Client,
}

impl HttpLoader {
    pub fn new() -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::blocking::Client::new());
        Self { client }
    }
}

impl Default for HttpLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentLoader for HttpLoader {
    fn fetch(
        &self,
        request: &FetchRequest,
        progress: &mut dyn FnMut(u8),
        cancelled: &dyn Fn() -> bool,
    ) -> Result<LoadedContent, LoadError> {
        debug!(url = %request.url, "fetching content");
        let mut builder = self
            .client
            .get(request.url.as_str())
            .header(header::USER_AGENT, &request.user_agent);
        if let Some(key) = &request.api_key {
            builder = builder.header("X-API-KEY", key);
        }

        let response = builder.send()?;
        let status = response.status().as_u16();
        let mut response = response.error_for_status()?;

        let total = response.content_length();
        let mut bytes = Vec::new();
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if cancelled() {
                return Err(LoadError::Cancelled);
            }
            let read = response.read(&mut chunk)?;
            if read == 0 {
                break;
            }
            bytes.extend_from_slice(&chunk[..read]);
            if let Some(total) = total.filter(|&t| t > 0) {
                let percent = (bytes.len() as u64 * 100 / total).min(100) as u8;
                progress(percent);
            }
        }
        progress(100);
        debug!(status, len = bytes.len(), "content fetched");

        Ok(LoadedContent {
            bytes,
            http_status: Some(status),
        })
    }
}
