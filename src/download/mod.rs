use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ORIGIN, REFERER, USER_AGENT};
use reqwest::{Client, Response};

use crate::config::DEFAULT_MAX_UPLOAD_BYTES;
use crate::PipelineError;

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Fetches audio that an extraction strategy handed back as a URL
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioDownloader: Send + Sync {
    async fn download(&self, url: &str) -> Result<Vec<u8>, PipelineError>;
}

/// Drain a response body into memory, stopping with `PayloadTooLarge` once it passes `limit`
///
/// A declared `Content-Length` above the limit is rejected before any body is read.
pub(crate) async fn read_body_capped<F>(response: Response, limit: usize, on_error: F) -> Result<Vec<u8>, PipelineError>
where
    F: Fn(String) -> PipelineError,
{
    let declared = response.content_length();
    if let Some(size) = declared {
        if size > limit as u64 {
            return Err(PipelineError::PayloadTooLarge {
                size: size as usize,
                limit,
            });
        }
    }

    let mut data = Vec::with_capacity(declared.unwrap_or(0) as usize);
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| on_error(e.to_string()))?;
        data.extend_from_slice(&chunk);

        if data.len() > limit {
            return Err(PipelineError::PayloadTooLarge { size: data.len(), limit });
        }
    }

    Ok(data)
}

/// Single GET with browser-like headers; no retries
pub struct HttpAudioDownloader {
    client: Client,
    referer: String,
    max_bytes: usize,
}

impl HttpAudioDownloader {
    pub fn new(client: Client, referer: String) -> Self {
        Self {
            client,
            referer,
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));

        let referer = format!("{}/", self.referer.trim_end_matches('/'));
        if let Ok(value) = HeaderValue::from_str(&referer) {
            headers.insert(REFERER, value);
        }
        if let Ok(value) = HeaderValue::from_str(self.referer.trim_end_matches('/')) {
            headers.insert(ORIGIN, value);
        }

        headers
    }
}

#[async_trait]
impl AudioDownloader for HttpAudioDownloader {
    async fn download(&self, url: &str) -> Result<Vec<u8>, PipelineError> {
        tracing::info!(url = %url, "Downloading extracted audio");

        let response = self
            .client
            .get(url)
            .headers(self.headers())
            .send()
            .await
            .map_err(|e| PipelineError::DownloadFailed {
                status: None,
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::DownloadFailed {
                status: Some(status.as_u16()),
                reason: format!("HTTP {}", status),
            });
        }

        let data = read_body_capped(response, self.max_bytes, |reason| PipelineError::DownloadFailed {
            status: Some(status.as_u16()),
            reason,
        })
        .await?;

        tracing::debug!(bytes = data.len(), "Audio download complete");
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;

    #[test]
    fn test_browser_headers() {
        let downloader = HttpAudioDownloader::new(Client::new(), "https://www.youtube.com".into());
        let headers = downloader.headers();

        assert_eq!(headers.get(REFERER).unwrap(), "https://www.youtube.com/");
        assert_eq!(headers.get(ORIGIN).unwrap(), "https://www.youtube.com");
        assert!(headers.get(USER_AGENT).unwrap().to_str().unwrap().starts_with("Mozilla/5.0"));
    }

    #[tokio::test]
    async fn test_transport_failure_has_no_status() {
        let downloader = HttpAudioDownloader::new(Client::new(), "https://www.youtube.com".into());
        let result = downloader.download("http://127.0.0.1:9/audio.mp3").await;
        assert!(matches!(result, Err(PipelineError::DownloadFailed { status: None, .. })));
    }

    fn audio_host() -> Router {
        Router::new()
            .route("/ok.mp3", get(|| async { vec![7u8; 64] }))
            .route("/big.mp3", get(|| async { vec![7u8; 4096] }))
            .route(
                "/chunked.mp3",
                get(|| async {
                    let chunks = (0..8).map(|_| Ok::<_, std::io::Error>(vec![1u8; 600]));
                    Body::from_stream(futures_util::stream::iter(chunks))
                }),
            )
            .route("/forbidden.mp3", get(|| async { (StatusCode::FORBIDDEN, "expired signature") }))
    }

    #[tokio::test]
    async fn test_download_reads_body() {
        let base = test_server::spawn(|_| audio_host()).await;
        let downloader = HttpAudioDownloader::new(Client::new(), "https://www.youtube.com".into());

        let data = downloader.download(&format!("{}/ok.mp3", base)).await.unwrap();
        assert_eq!(data, vec![7u8; 64]);
    }

    #[tokio::test]
    async fn test_non_success_status_is_reported() {
        let base = test_server::spawn(|_| audio_host()).await;
        let downloader = HttpAudioDownloader::new(Client::new(), "https://www.youtube.com".into());

        let result = downloader.download(&format!("{}/forbidden.mp3", base)).await;
        assert!(matches!(result, Err(PipelineError::DownloadFailed { status: Some(403), .. })));
    }

    #[tokio::test]
    async fn test_body_over_cap_is_rejected() {
        let base = test_server::spawn(|_| audio_host()).await;
        let downloader =
            HttpAudioDownloader::new(Client::new(), "https://www.youtube.com".into()).with_max_bytes(1024);

        let result = downloader.download(&format!("{}/big.mp3", base)).await;
        assert!(matches!(
            result,
            Err(PipelineError::PayloadTooLarge { size, limit: 1024 }) if size > 1024
        ));

        let result = downloader.download(&format!("{}/chunked.mp3", base)).await;
        assert!(matches!(
            result,
            Err(PipelineError::PayloadTooLarge { size, limit: 1024 }) if size > 1024
        ));

        let at_cap = HttpAudioDownloader::new(Client::new(), "https://www.youtube.com".into()).with_max_bytes(64);
        assert_eq!(at_cap.download(&format!("{}/ok.mp3", base)).await.unwrap().len(), 64);
    }

    #[tokio::test]
    async fn test_truncated_body_fails_with_status() {
        let base = test_server::spawn_truncated(1000, b"only a few bytes").await;
        let downloader = HttpAudioDownloader::new(Client::new(), "https://www.youtube.com".into());

        let result = downloader.download(&format!("{}/cut.mp3", base)).await;
        assert!(matches!(result, Err(PipelineError::DownloadFailed { status: Some(200), .. })));
    }
}
