//! Body template locations and the fetcher that loads them.
//!
//! A body template file may be given as an absolute local path or as a
//! `file://`, `http://` or `https://` URL. Anything else is rejected before
//! any I/O happens.

use crate::error::{ConfigError, FetchError};
use async_trait::async_trait;
use reqwest::Url;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Maximum size of a body template (1MB).
pub const MAX_TEMPLATE_SIZE: u64 = 1024 * 1024;

/// Timeout for fetching a template over HTTP.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Where an external body template lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateLocation {
    /// Local file, from an absolute path or a `file://` URL.
    Path(PathBuf),
    /// Remote file, from an `http://` or `https://` URL.
    Url(Url),
}

impl TemplateLocation {
    /// Classify a user supplied template location.
    ///
    /// # Errors
    ///
    /// `ConfigError::ValidationError` for relative paths, malformed URLs and
    /// unsupported schemes.
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        if Path::new(input).is_absolute() {
            return Ok(TemplateLocation::Path(PathBuf::from(input)));
        }

        if !input.contains("://") {
            return Err(ConfigError::invalid(format!(
                "not a fully qualified local file or URL: {}",
                input
            )));
        }

        let url = Url::parse(input).map_err(|e| {
            ConfigError::invalid(format!("invalid template URL '{}': {}", input, e))
        })?;

        // Url normalizes the scheme to lowercase.
        match url.scheme() {
            "file" => url.to_file_path().map(TemplateLocation::Path).map_err(|_| {
                ConfigError::invalid(format!("file URL does not name a local path: {}", input))
            }),
            "http" | "https" => Ok(TemplateLocation::Url(url)),
            other => Err(ConfigError::invalid(format!(
                "unsupported scheme {}://",
                other
            ))),
        }
    }
}

impl std::fmt::Display for TemplateLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TemplateLocation::Path(path) => write!(f, "{}", path.display()),
            TemplateLocation::Url(url) => write!(f, "{}", url),
        }
    }
}

/// Loads raw template text from a [`TemplateLocation`].
///
/// Abstracted so validation can be exercised without touching the network.
#[async_trait]
pub trait TemplateFetcher: Send + Sync {
    async fn fetch(&self, location: &TemplateLocation) -> Result<String, FetchError>;
}

/// Reads local files with tokio and remote files with reqwest.
pub struct DefaultTemplateFetcher {
    client: reqwest::Client,
}

impl DefaultTemplateFetcher {
    pub fn new() -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| ConfigError::invalid(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    async fn read_file(&self, path: &Path) -> Result<String, FetchError> {
        let metadata = tokio::fs::metadata(path).await?;
        check_size(metadata.len())?;
        let bytes = tokio::fs::read(path).await?;
        tracing::debug!(path = %path.display(), size = bytes.len(), "Body template read from file");
        into_text(bytes)
    }

    async fn download(&self, url: &Url) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await?
            .error_for_status()?;

        if let Some(length) = response.content_length() {
            check_size(length)?;
        }
        let bytes = response.bytes().await?;
        check_size(bytes.len() as u64)?;
        tracing::debug!(url = %url, size = bytes.len(), "Body template downloaded");
        into_text(bytes.to_vec())
    }
}

#[async_trait]
impl TemplateFetcher for DefaultTemplateFetcher {
    async fn fetch(&self, location: &TemplateLocation) -> Result<String, FetchError> {
        match location {
            TemplateLocation::Path(path) => self.read_file(path).await,
            TemplateLocation::Url(url) => self.download(url).await,
        }
    }
}

fn check_size(size: u64) -> Result<(), FetchError> {
    if size > MAX_TEMPLATE_SIZE {
        return Err(FetchError::TooLarge {
            size,
            limit: MAX_TEMPLATE_SIZE,
        });
    }
    Ok(())
}

fn into_text(bytes: Vec<u8>) -> Result<String, FetchError> {
    String::from_utf8(bytes).map_err(|_| FetchError::NotUtf8)
}
