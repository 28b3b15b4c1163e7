//! HTTP byte source for resolved media URLs.

use async_trait::async_trait;
use futures_util::TryStreamExt;
use reqwest::Client;
use tokio_util::io::StreamReader;
use tracing::{debug, instrument};

use super::error::TransferError;
use super::source::{ByteSource, SourceOpener};
use crate::config::HttpSettings;
use crate::http_client::{HttpClientError, build_http_client};

/// HTTP client that streams response bodies into the transfer engine.
///
/// Create once and reuse for every item to benefit from connection pooling.
///
/// # Example
///
/// ```no_run
/// use mediadl_core::config::HttpSettings;
/// use mediadl_core::download::{HttpClient, SourceOpener};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::new(&HttpSettings::default())?;
/// let source = client.open("https://example.com/video.flv").await?;
/// println!("announced length: {:?}", source.content_length());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Builds a client from transport settings.
    ///
    /// # Errors
    ///
    /// Returns [`HttpClientError`] when the underlying client cannot be built.
    pub fn new(settings: &HttpSettings) -> Result<Self, HttpClientError> {
        Ok(Self {
            client: build_http_client(settings, false)?,
        })
    }

    /// Wraps an existing reqwest client.
    #[must_use]
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SourceOpener for HttpClient {
    #[instrument(level = "debug", skip(self))]
    async fn open(&self, url: &str) -> Result<ByteSource, TransferError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| TransferError::network(url, source))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::http_status(url, status.as_u16()));
        }

        let content_length = response.content_length();
        debug!(status = status.as_u16(), ?content_length, "media response received");

        let stream = response.bytes_stream().map_err(std::io::Error::other);
        Ok(ByteSource::new(StreamReader::new(stream), content_length))
    }
}
