//! Local HTTP fixtures for exercising the real clients in tests.

use axum::Router;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serve the router built for the bound base URL; returns that base URL
pub(crate) async fn spawn<F>(build: F) -> String
where
    F: FnOnce(String) -> Router,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let router = build(base.clone());
    tokio::spawn(async move { axum::serve(listener, router).await });
    base
}

/// Answer every connection with a body shorter than its declared length, then hang up
pub(crate) async fn spawn_truncated(declared: usize, sent: &'static [u8]) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await;
            let head = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: audio/mpeg\r\ncontent-length: {}\r\n\r\n",
                declared
            );
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.write_all(sent).await;
            let _ = socket.shutdown().await;
        }
    });

    base
}

/// Player API body listing one audio-only format served at `url`
pub(crate) fn player_json(url: &str, content_length: Option<usize>) -> serde_json::Value {
    let mut format = serde_json::json!({
        "url": url,
        "mimeType": "audio/mp4; codecs=\"mp4a.40.2\"",
        "bitrate": 48000,
    });
    if let Some(length) = content_length {
        format["contentLength"] = serde_json::json!(length.to_string());
    }

    serde_json::json!({
        "playabilityStatus": { "status": "OK" },
        "videoDetails": { "title": "Questions That Lead" },
        "streamingData": { "adaptiveFormats": [format] },
    })
}
