//! `reqwest` implementation of the fetch port.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, trace};

use crate::domain::entities::Locator;
use crate::domain::errors::{CacheError, CacheResult};
use crate::domain::ports::ResourceFetcher;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Fetches assets over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Creates a fetcher whose requests time out after `timeout`.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn new(timeout: Duration) -> CacheResult<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| CacheError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }

    async fn send(&self, locator: &Locator) -> CacheResult<reqwest::Response> {
        let response = self
            .client
            .get(locator.url().clone())
            .send()
            .await
            .map_err(|e| CacheError::network(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CacheError::network(format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        trace!(locator = %locator, status = status.as_u16(), "Response received");
        Ok(response)
    }
}

#[async_trait]
impl ResourceFetcher for HttpFetcher {
    async fn fetch(&self, locator: &Locator) -> CacheResult<Bytes> {
        let response = self.send(locator).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| CacheError::network(format!("Failed to read body: {e}")))?;

        debug!(locator = %locator, size = bytes.len(), "Downloaded asset");
        Ok(bytes)
    }

    async fn download_to(&self, locator: &Locator, dest: &Path) -> CacheResult<u64> {
        let response = self.send(locator).await?;

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| CacheError::storage(format!("Failed to create download file: {e}")))?;

        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| CacheError::network(format!("Failed to read body: {e}")))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| CacheError::storage(format!("Failed to write download: {e}")))?;
            written += chunk.len() as u64;
        }

        file.sync_all()
            .await
            .map_err(|e| CacheError::storage(format!("Failed to flush download: {e}")))?;

        debug!(locator = %locator, size = written, path = %dest.display(), "Streamed asset to disk");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    /// Serves one canned HTTP response per accepted connection.
    async fn serve(status_line: &'static str, body: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let head = format!(
                    "HTTP/1.1 {status_line}\r\nContent-Length: {}\r\nContent-Type: application/octet-stream\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(body).await;
                let _ = socket.shutdown().await;
            }
        });

        format!("http://{addr}/asset")
    }

    fn fetcher() -> HttpFetcher {
        let client = Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        HttpFetcher { client }
    }

    #[test]
    fn test_new_builds_client() {
        assert!(HttpFetcher::new(Duration::from_secs(DEFAULT_TIMEOUT_SECS)).is_ok());
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let url = serve("200 OK", b"payload").await;
        let fetcher = fetcher();

        let bytes = fetcher.fetch(&Locator::parse(&url).unwrap()).await.unwrap();

        assert_eq!(bytes, Bytes::from_static(b"payload"));
    }

    #[tokio::test]
    async fn test_non_success_status_is_network_failure() {
        let url = serve("404 Not Found", b"missing").await;
        let fetcher = fetcher();

        let err = fetcher
            .fetch(&Locator::parse(&url).unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, CacheError::NetworkFailure(ref m) if m.contains("404")));
    }

    #[tokio::test]
    async fn test_download_to_streams_body() {
        let url = serve("200 OK", b"0123456789").await;
        let fetcher = fetcher();
        let dir = tempfile::TempDir::new().unwrap();
        let dest = dir.path().join("clip.part");

        let written = fetcher
            .download_to(&Locator::parse(&url).unwrap(), &dest)
            .await
            .unwrap();

        assert_eq!(written, 10);
        assert_eq!(std::fs::read(&dest).unwrap(), b"0123456789");
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_failure() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let fetcher = fetcher();

        let result = fetcher
            .fetch(&Locator::parse(&format!("http://{addr}/gone")).unwrap())
            .await;

        tokio_test::assert_err!(&result);
        assert!(matches!(result, Err(CacheError::NetworkFailure(_))));
    }
}
