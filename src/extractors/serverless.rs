use async_trait::async_trait;
use reqwest::header::{CONTENT_RANGE, USER_AGENT};
use reqwest::{Client, StatusCode};

use super::innertube::{self, InnertubeClient};
use super::{AudioExtractor, AudioPayload};
use crate::config::{YoutubeConfig, DEFAULT_MAX_UPLOAD_BYTES};
use crate::download::read_body_capped;
use crate::video::VideoId;
use crate::PipelineError;

/// Bytes requested per ranged fetch; larger single requests get throttled
const CHUNK_SIZE: u64 = 10 * 1024 * 1024;

/// One ranged response
struct RangeChunk {
    data: Vec<u8>,

    /// False when the host ignored the range and sent the whole body
    partial: bool,
}

/// Uses the mobile client profile and pulls the stream in ranged chunks
pub struct ServerlessStreamExtractor {
    innertube: InnertubeClient,
    chunk_size: u64,
    max_bytes: usize,
}

impl ServerlessStreamExtractor {
    pub fn new(client: Client, config: YoutubeConfig) -> Self {
        Self {
            innertube: InnertubeClient::new(client, config.base_url, innertube::IOS),
            chunk_size: CHUNK_SIZE,
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    #[cfg(test)]
    fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    async fn fetch_range(&self, url: &str, start: u64, end: u64) -> Result<RangeChunk, PipelineError> {
        let response = self
            .innertube
            .http()
            .get(format!("{}&range={}-{}", url, start, end))
            .header(USER_AGENT, self.innertube.profile().user_agent)
            .send()
            .await
            .map_err(|e| PipelineError::StreamError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PipelineError::StreamError(format!(
                "range {}-{} returned HTTP {}",
                start,
                end,
                response.status()
            )));
        }

        let partial = response.status() == StatusCode::PARTIAL_CONTENT || response.headers().contains_key(CONTENT_RANGE);
        let data = read_body_capped(response, self.max_bytes, PipelineError::StreamError).await?;

        Ok(RangeChunk { data, partial })
    }

    fn check_size(&self, size: usize) -> Result<(), PipelineError> {
        if size > self.max_bytes {
            return Err(PipelineError::PayloadTooLarge {
                size,
                limit: self.max_bytes,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl AudioExtractor for ServerlessStreamExtractor {
    async fn extract(&self, video_id: &VideoId) -> Result<AudioPayload, PipelineError> {
        let audio = self.innertube.resolve_audio(video_id).await?;

        tracing::info!(
            video_id = %video_id,
            mime = %audio.mime_type,
            size = ?audio.content_length,
            "Fetching audio in ranged chunks"
        );

        let mut data = Vec::new();

        match audio.content_length {
            Some(total) => {
                self.check_size(total as usize)?;

                for (start, end) in chunk_ranges(total, self.chunk_size) {
                    let chunk = self.fetch_range(&audio.url, start, end).await?;
                    if !chunk.partial {
                        data = chunk.data;
                        break;
                    }
                    if chunk.data.is_empty() {
                        break;
                    }
                    data.extend_from_slice(&chunk.data);
                    self.check_size(data.len())?;
                }
            }
            None => {
                // Length unknown: keep requesting until the host returns a short chunk
                let mut start = 0;
                loop {
                    let chunk = self
                        .fetch_range(&audio.url, start, start + self.chunk_size - 1)
                        .await?;
                    if !chunk.partial {
                        tracing::debug!(video_id = %video_id, "Host ignored range request, using full body");
                        data = chunk.data;
                        break;
                    }

                    let received = chunk.data.len() as u64;
                    data.extend_from_slice(&chunk.data);
                    self.check_size(data.len())?;

                    if received < self.chunk_size {
                        break;
                    }
                    start += received;
                }
            }
        }

        if data.is_empty() {
            return Err(PipelineError::StreamError("media host returned no data".to_string()));
        }

        tracing::debug!(video_id = %video_id, bytes = data.len(), "Ranged download finished");

        Ok(AudioPayload::Buffer {
            data,
            filename: audio.filename,
        })
    }

    fn strategy_name(&self) -> &'static str {
        "serverless-stream"
    }
}

/// Inclusive byte ranges covering `total` bytes
fn chunk_ranges(total: u64, chunk: u64) -> Vec<(u64, u64)> {
    (0..total)
        .step_by(chunk as usize)
        .map(|start| (start, (start + chunk).min(total) - 1))
        .collect()
}
