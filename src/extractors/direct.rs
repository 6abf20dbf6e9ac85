use async_trait::async_trait;
use reqwest::Client;

use super::innertube::{self, InnertubeClient};
use super::{AudioExtractor, AudioPayload};
use crate::config::{YoutubeConfig, DEFAULT_MAX_UPLOAD_BYTES};
use crate::download::read_body_capped;
use crate::video::VideoId;
use crate::PipelineError;

/// Negotiates an audio-only format with the host and streams it into memory
pub struct DirectStreamExtractor {
    innertube: InnertubeClient,
    max_bytes: usize,
}

impl DirectStreamExtractor {
    pub fn new(client: Client, config: YoutubeConfig) -> Self {
        Self {
            innertube: InnertubeClient::new(client, config.base_url, innertube::WEB),
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }
}

#[async_trait]
impl AudioExtractor for DirectStreamExtractor {
    async fn extract(&self, video_id: &VideoId) -> Result<AudioPayload, PipelineError> {
        let audio = self.innertube.resolve_audio(video_id).await?;

        tracing::info!(
            video_id = %video_id,
            mime = %audio.mime_type,
            size = ?audio.content_length,
            "Streaming audio format"
        );

        if let Some(size) = audio.content_length {
            if size > self.max_bytes as u64 {
                return Err(PipelineError::PayloadTooLarge {
                    size: size as usize,
                    limit: self.max_bytes,
                });
            }
        }

        let response = self
            .innertube
            .http()
            .get(&audio.url)
            .header(reqwest::header::USER_AGENT, self.innertube.profile().user_agent)
            .send()
            .await
            .map_err(|e| PipelineError::StreamError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PipelineError::StreamError(format!(
                "media host returned HTTP {}",
                response.status()
            )));
        }

        let data = read_body_capped(response, self.max_bytes, PipelineError::StreamError).await?;

        tracing::debug!(video_id = %video_id, bytes = data.len(), "Audio stream finished");

        Ok(AudioPayload::Buffer {
            data,
            filename: audio.filename,
        })
    }

    fn strategy_name(&self) -> &'static str {
        "direct-stream"
    }
}
