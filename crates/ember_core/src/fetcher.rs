//! Resource fetching for content referenced by the configuration.
//!
//! Supported sources:
//!
//! - `data:` URLs, percent-encoded or `;base64`
//! - `file://` URLs and bare absolute paths
//! - `http://` and `https://` URLs, retried on server errors

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::{debug, warn};

use crate::error::{FetchError, FetchResult};

/// Retrieves the bytes behind a source reference.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, source: &str) -> FetchResult<Vec<u8>>;
}

/// Options for [`DefaultFetcher`].
#[derive(Debug, Clone)]
pub struct FetcherOptions {
    /// Per-request HTTP timeout
    pub timeout: Duration,
    /// Attempts made for HTTP sources before giving up
    pub max_attempts: u32,
    /// Delay between HTTP attempts
    pub retry_delay: Duration,
}

impl Default for FetcherOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_attempts: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// Fetcher used by the CLI.
pub struct DefaultFetcher {
    client: reqwest::Client,
    options: FetcherOptions,
}

impl DefaultFetcher {
    pub fn new(options: FetcherOptions) -> FetchResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(Self { client, options })
    }

    async fn fetch_http(&self, url: &str) -> FetchResult<Vec<u8>> {
        let attempts = self.options.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                tokio::time::sleep(self.options.retry_delay).await;
            }

            let response = match self.client.get(url).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    warn!("GET {} failed (attempt {}/{}): {}", url, attempt + 1, attempts, e);
                    last_error = Some(FetchError::Network(e.to_string()));
                    continue;
                }
            };

            let status = response.status();
            if status.is_server_error() {
                warn!("GET {} returned {} (attempt {}/{})", url, status, attempt + 1, attempts);
                last_error = Some(FetchError::Http {
                    status: status.as_u16(),
                    url: url.to_string(),
                });
                continue;
            }
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(FetchError::NotFound(url.to_string()));
            }
            if !status.is_success() {
                return Err(FetchError::Http {
                    status: status.as_u16(),
                    url: url.to_string(),
                });
            }

            let body = response
                .bytes()
                .await
                .map_err(|e| FetchError::Network(e.to_string()))?;
            return Ok(body.to_vec());
        }

        Err(last_error.unwrap_or_else(|| FetchError::Network(url.to_string())))
    }
}

#[async_trait]
impl Fetcher for DefaultFetcher {
    async fn fetch(&self, source: &str) -> FetchResult<Vec<u8>> {
        debug!("Fetching {}", source);

        if let Some(rest) = source.strip_prefix("data:") {
            return decode_data_url(rest);
        }
        if source.starts_with("http://") || source.starts_with("https://") {
            return self.fetch_http(source).await;
        }

        let path = source.strip_prefix("file://").unwrap_or(source);
        if !Path::new(path).is_absolute() {
            return Err(FetchError::UnsupportedScheme(source.to_string()));
        }
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(FetchError::NotFound(source.to_string()))
            }
            Err(e) => Err(FetchError::Io(e)),
        }
    }
}

/// Decode the part of a data URL after `data:`.
///
/// The payload is percent-decoded first, then base64-decoded when the
/// media type carries `;base64`.
fn decode_data_url(rest: &str) -> FetchResult<Vec<u8>> {
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| FetchError::Malformed(format!("data:{}", rest)))?;
    let bytes = urlencoding::decode_binary(payload.as_bytes());

    let mut params = meta.split(';').skip(1);
    if !params.any(|p| p.eq_ignore_ascii_case("base64")) {
        return Ok(bytes.into_owned());
    }
    STANDARD
        .decode(&*bytes)
        .map_err(|e| FetchError::Malformed(format!("data:{},...: {}", meta, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fetcher() -> DefaultFetcher {
        DefaultFetcher::new(FetcherOptions::default()).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_data_url() {
        let bytes = fetcher().fetch("data:,hello%20world%0A").await.unwrap();
        assert_eq!(bytes, b"hello world\n");

        let bytes = fetcher().fetch("data:text/plain;charset=utf-8,ok").await.unwrap();
        assert_eq!(bytes, b"ok");
    }

    #[tokio::test]
    async fn test_fetch_data_url_base64() {
        let bytes = fetcher().fetch("data:;base64,aGVsbG8=").await.unwrap();
        assert_eq!(bytes, b"hello");

        let bytes = fetcher()
            .fetch("data:text/plain;charset=utf-8;base64,bm9kZS0xCg%3D%3D")
            .await
            .unwrap();
        assert_eq!(bytes, b"node-1\n");
    }

    #[tokio::test]
    async fn test_fetch_data_url_malformed() {
        assert!(matches!(
            fetcher().fetch("data:no-comma").await.unwrap_err(),
            FetchError::Malformed(_)
        ));
        assert!(matches!(
            fetcher().fetch("data:;base64,not*base64").await.unwrap_err(),
            FetchError::Malformed(_)
        ));
    }

    #[tokio::test]
    async fn test_fetch_data_url_keeps_invalid_escapes_literal() {
        assert_eq!(fetcher().fetch("data:,%+1").await.unwrap(), b"%+1");
        assert_eq!(fetcher().fetch("data:,bad%zz").await.unwrap(), b"bad%zz");
    }

    #[tokio::test]
    async fn test_fetch_local_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("payload");
        std::fs::write(&path, b"local").unwrap();

        let bare = fetcher().fetch(path.to_str().unwrap()).await.unwrap();
        assert_eq!(bare, b"local");

        let url = format!("file://{}", path.display());
        assert_eq!(fetcher().fetch(&url).await.unwrap(), b"local");

        let missing = format!("file://{}", temp_dir.path().join("nope").display());
        assert!(matches!(
            fetcher().fetch(&missing).await.unwrap_err(),
            FetchError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_fetch_unknown_scheme() {
        let err = fetcher().fetch("tftp://boot/server").await.unwrap_err();
        assert!(matches!(err, FetchError::UnsupportedScheme(_)));
    }
}
