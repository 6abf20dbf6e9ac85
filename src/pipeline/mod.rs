use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::captions::{CaptionTranscriptFetcher, YoutubeCaptionFetcher};
use crate::config::Config;
use crate::download::{AudioDownloader, HttpAudioDownloader};
use crate::extractors::{self, AudioExtractor, AudioPayload};
use crate::transcribe::{is_file_size_valid, TranscriptionService, WhisperService};
use crate::utils::normalize_whitespace;
use crate::video::{OEmbedResolver, VideoId, VideoInfo, VideoInfoResolver};
use crate::PipelineError;

/// Individual transcript segment with timing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Segment text
    pub text: String,

    /// Start offset in milliseconds
    #[serde(rename = "offset")]
    pub offset_ms: u64,

    /// Duration in milliseconds
    #[serde(rename = "duration")]
    pub duration_ms: u64,
}

/// Where a transcript came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TranscriptSource {
    #[serde(rename = "youtube-captions")]
    Captions,
    #[serde(rename = "whisper")]
    Transcribed,
    #[serde(rename = "manual")]
    Manual,
}

impl std::fmt::Display for TranscriptSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranscriptSource::Captions => write!(f, "youtube-captions"),
            TranscriptSource::Transcribed => write!(f, "whisper"),
            TranscriptSource::Manual => write!(f, "manual"),
        }
    }
}

/// Transcript with video metadata, handed to the extraction step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptResult {
    pub video_id: VideoId,
    pub title: String,
    pub channel_title: String,
    #[serde(rename = "thumbnail")]
    pub thumbnail_url: String,

    /// Whitespace-normalised full text; never empty
    #[serde(rename = "transcript")]
    pub full_text: String,

    /// Ordered segments; empty only for manual transcripts
    pub segments: Vec<TranscriptSegment>,
    pub source: TranscriptSource,
}

impl TranscriptResult {
    fn new(
        video_id: &VideoId,
        info: VideoInfo,
        full_text: String,
        segments: Vec<TranscriptSegment>,
        source: TranscriptSource,
    ) -> Self {
        Self {
            video_id: video_id.clone(),
            title: info.title,
            channel_title: info.channel_title,
            thumbnail_url: info.thumbnail_url,
            full_text,
            segments,
            source,
        }
    }

    /// Build a result from text the user pasted in
    pub fn manual(video_id: &VideoId, info: VideoInfo, text: &str) -> Result<Self, PipelineError> {
        let full_text = normalize_whitespace(text);
        if full_text.is_empty() {
            return Err(PipelineError::InvalidInput("Transcript text is empty".to_string()));
        }

        Ok(Self::new(video_id, info, full_text, Vec::new(), TranscriptSource::Manual))
    }
}

/// Join segment texts into one whitespace-normalised string
pub fn join_segments(segments: &[TranscriptSegment]) -> String {
    let joined = segments.iter().map(|s| s.text.as_str()).collect::<Vec<_>>().join(" ");
    normalize_whitespace(&joined)
}

/// Captions first; otherwise extract audio, download if needed, and transcribe
pub struct TranscriptAcquisitionPipeline {
    resolver: Arc<dyn VideoInfoResolver>,
    captions: Arc<dyn CaptionTranscriptFetcher>,
    extractor: Arc<dyn AudioExtractor>,
    downloader: Arc<dyn AudioDownloader>,
    transcriber: Arc<dyn TranscriptionService>,
    max_upload_bytes: usize,
    deadline: Duration,
}

impl TranscriptAcquisitionPipeline {
    pub fn new(
        resolver: Arc<dyn VideoInfoResolver>,
        captions: Arc<dyn CaptionTranscriptFetcher>,
        extractor: Arc<dyn AudioExtractor>,
        downloader: Arc<dyn AudioDownloader>,
        transcriber: Arc<dyn TranscriptionService>,
    ) -> Self {
        Self {
            resolver,
            captions,
            extractor,
            downloader,
            transcriber,
            max_upload_bytes: crate::config::DEFAULT_MAX_UPLOAD_BYTES,
            deadline: Duration::from_secs(240),
        }
    }

    /// Wire the HTTP-backed implementations selected in configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = config.http_client()?;

        let pipeline = Self::new(
            Arc::new(OEmbedResolver::new(client.clone(), config.youtube.clone())),
            Arc::new(YoutubeCaptionFetcher::new(client.clone(), config.youtube.clone())),
            extractors::build_extractor(config, client.clone()),
            Arc::new(
                HttpAudioDownloader::new(client.clone(), config.youtube.base_url.clone())
                    .with_max_bytes(config.transcription.max_upload_bytes),
            ),
            Arc::new(WhisperService::new(
                config.transcription_client()?,
                config.transcription.clone(),
            )),
        )
        .with_max_upload_bytes(config.transcription.max_upload_bytes)
        .with_deadline(config.deadline());

        Ok(pipeline)
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Metadata only; never fails
    pub async fn video_info(&self, video_id: &VideoId) -> VideoInfo {
        self.resolver.resolve(video_id).await
    }

    /// Run the fallback chain once, bounded by the overall deadline
    pub async fn acquire(&self, video_id: &VideoId) -> Result<TranscriptResult, PipelineError> {
        let outcome = tokio::time::timeout(self.deadline, self.run(video_id))
            .await
            .unwrap_or_else(|_| Err(PipelineError::DeadlineExceeded(self.deadline.as_secs())));

        match &outcome {
            Ok(result) => tracing::info!(
                video_id = %video_id,
                source = %result.source,
                characters = result.full_text.len(),
                "Transcript acquired"
            ),
            Err(e) => tracing::warn!(video_id = %video_id, error = %e, "Transcript acquisition failed"),
        }

        outcome
    }

    async fn run(&self, video_id: &VideoId) -> Result<TranscriptResult, PipelineError> {
        let info = self.resolver.resolve(video_id).await;

        match self.captions.fetch(video_id).await {
            Ok(segments) => {
                let full_text = join_segments(&segments);
                if !full_text.is_empty() {
                    return Ok(TranscriptResult::new(
                        video_id,
                        info,
                        full_text,
                        segments,
                        TranscriptSource::Captions,
                    ));
                }
                tracing::info!(video_id = %video_id, "Caption track is blank, falling back to transcription");
            }
            Err(e) => {
                tracing::info!(video_id = %video_id, reason = %e, "Captions unavailable, falling back to transcription");
            }
        }

        if !self.transcriber.is_configured() {
            return Err(PipelineError::ServiceNotConfigured("Transcription service".to_string()));
        }

        tracing::info!(video_id = %video_id, strategy = self.extractor.strategy_name(), "Extracting audio");
        let payload = self
            .extractor
            .extract(video_id)
            .await
            .map_err(extractors::classify_failure)?;

        let (audio, filename) = match payload {
            AudioPayload::Buffer { data, filename } => (data, filename),
            AudioPayload::Url { url, filename } => (self.downloader.download(&url).await?, filename),
        };

        if !is_file_size_valid(&audio, self.max_upload_bytes) {
            return Err(PipelineError::PayloadTooLarge {
                size: audio.len(),
                limit: self.max_upload_bytes,
            });
        }

        let transcription = self
            .transcriber
            .transcribe(audio, &filename)
            .await
            .map_err(|e| match e {
                PipelineError::TranscriptionFailed(_) | PipelineError::ServiceNotConfigured(_) => e,
                other => PipelineError::TranscriptionFailed(other.to_string()),
            })?;

        let full_text = normalize_whitespace(&transcription.text);
        if full_text.is_empty() {
            return Err(PipelineError::TranscriptionFailed("provider returned an empty transcript".to_string()));
        }

        let mut segments: Vec<TranscriptSegment> = transcription
            .segments
            .iter()
            .map(|s| s.to_transcript_segment())
            .collect();

        // Untimed provider output still yields one segment covering the whole text
        if segments.is_empty() {
            segments.push(TranscriptSegment {
                text: full_text.clone(),
                offset_ms: 0,
                duration_ms: 0,
            });
        }

        Ok(TranscriptResult::new(
            video_id,
            info,
            full_text,
            segments,
            TranscriptSource::Transcribed,
        ))
    }
}
