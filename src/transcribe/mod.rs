use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::TranscriptionConfig;
use crate::pipeline::TranscriptSegment;
use crate::utils::seconds_to_millis;
use crate::PipelineError;

pub mod processor;

/// Speech-to-text output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcription {
    /// Full transcribed text
    pub text: String,

    /// Timed segments in temporal order
    pub segments: Vec<TimedSegment>,
}

/// Segment boundaries as reported by the provider, in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl TimedSegment {
    /// Offset/duration form shared with caption segments
    pub fn to_transcript_segment(&self) -> TranscriptSegment {
        let offset_ms = seconds_to_millis(self.start);
        let end_ms = seconds_to_millis(self.end);
        TranscriptSegment {
            text: self.text.trim().to_string(),
            offset_ms,
            duration_ms: end_ms.saturating_sub(offset_ms),
        }
    }
}

/// Whether a buffer fits under the provider's upload ceiling
pub fn is_file_size_valid(buffer: &[u8], max_bytes: usize) -> bool {
    buffer.len() <= max_bytes
}

/// Submits audio to a speech-to-text provider
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranscriptionService: Send + Sync {
    /// Whether credentials are present; checked before any extraction work
    fn is_configured(&self) -> bool;

    async fn transcribe(&self, audio: Vec<u8>, filename: &str) -> Result<Transcription, PipelineError>;
}

/// OpenAI-compatible `/audio/transcriptions` client
pub struct WhisperService {
    client: Client,
    config: TranscriptionConfig,
}

impl WhisperService {
    pub fn new(client: Client, config: TranscriptionConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl TranscriptionService for WhisperService {
    fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }

    async fn transcribe(&self, audio: Vec<u8>, filename: &str) -> Result<Transcription, PipelineError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| PipelineError::ServiceNotConfigured("Transcription service (OPENAI_API_KEY)".to_string()))?;

        let size = audio.len();
        tracing::info!(filename = %filename, bytes = size, model = %self.config.model, "Submitting audio for transcription");

        let part = Part::bytes(audio)
            .file_name(filename.to_string())
            .mime_str(processor::mime_for_filename(filename))
            .map_err(|e| PipelineError::TranscriptionFailed(e.to_string()))?;

        let form = Form::new()
            .part("file", part)
            .text("model", self.config.model.clone())
            .text("response_format", "verbose_json");

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.config.api_url.trim_end_matches('/')))
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| PipelineError::TranscriptionFailed(format!("request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PipelineError::TranscriptionFailed(e.to_string()))?;

        if !status.is_success() {
            tracing::error!(status = %status, body = %body, "Transcription provider returned an error");
            return Err(PipelineError::TranscriptionFailed(format!("provider returned HTTP {}", status)));
        }

        let transcription = processor::parse_verbose_json(&body)?;
        tracing::info!(
            characters = transcription.text.len(),
            segments = transcription.segments.len(),
            "Transcription complete"
        );

        Ok(transcription)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: usize = 1024 * 1024;

    #[test]
    fn test_size_gate_boundary() {
        let limit = 25 * MIB;
        assert!(is_file_size_valid(&vec![0u8; limit], limit));
        assert!(!is_file_size_valid(&vec![0u8; limit + 1], limit));
        assert!(is_file_size_valid(&[], limit));
    }

    #[test]
    fn test_segment_conversion_to_millis() {
        let segment = TimedSegment {
            start: 1.5,
            end: 4.25,
            text: " Welcome everyone ".into(),
        };
        assert_eq!(
            segment.to_transcript_segment(),
            TranscriptSegment {
                text: "Welcome everyone".into(),
                offset_ms: 1500,
                duration_ms: 2750,
            }
        );

        let inverted = TimedSegment {
            start: 3.0,
            end: 2.0,
            text: "x".into(),
        };
        assert_eq!(inverted.to_transcript_segment().duration_ms, 0);
    }

    #[tokio::test]
    async fn test_missing_key_fails_fast() {
        let service = WhisperService::new(Client::new(), TranscriptionConfig::default());
        assert!(!service.is_configured());

        let result = service.transcribe(vec![1, 2, 3], "a.m4a").await;
        assert!(matches!(result, Err(PipelineError::ServiceNotConfigured(_))));
    }
}
