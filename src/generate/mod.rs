pub mod anthropic;
pub mod content;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::pipeline::{TranscriptResult, TranscriptSource};
use crate::sheets::{GenerationLog, GenerationLogger, SheetsLogger};
use crate::usage::UsageGate;
use crate::video::UNKNOWN_SPEAKER;
use crate::PipelineError;

const UNKNOWN_TALK: &str = "Unknown Talk";

/// Placeholder for blank title or channel in log rows
const UNKNOWN_LOGGED: &str = "Unknown";

pub use anthropic::AnthropicExtractor;
pub use content::ExtractedContent;

/// What the model sees for one talk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionInput {
    pub video_id: String,
    pub youtube_url: String,
    pub speaker_name: String,
    pub talk_title: String,
    pub transcript: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    async fn extract(&self, input: &ExtractionInput) -> Result<ExtractedContent, PipelineError>;
}

/// Body of a generation request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    #[serde(default)]
    pub video_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub channel_title: Option<String>,
    #[serde(default)]
    pub transcript: String,
    #[serde(default)]
    pub transcript_source: Option<TranscriptSource>,
}

impl From<&TranscriptResult> for GenerationRequest {
    fn from(result: &TranscriptResult) -> Self {
        Self {
            video_id: result.video_id.to_string(),
            title: Some(result.title.clone()),
            channel_title: Some(result.channel_title.clone()),
            transcript: result.full_text.clone(),
            transcript_source: Some(result.source),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub success: bool,
    pub content: ExtractedContent,
}

/// Authenticated, quota-checked framework generation
pub struct GenerationRequestHandler {
    usage: UsageGate,
    extractor: Arc<dyn ContentExtractor>,
    logger: Arc<dyn GenerationLogger>,
    watch_base_url: String,
    pending_logs: Mutex<Vec<JoinHandle<()>>>,
}

impl GenerationRequestHandler {
    pub fn new(
        usage: UsageGate,
        extractor: Arc<dyn ContentExtractor>,
        logger: Arc<dyn GenerationLogger>,
        watch_base_url: String,
    ) -> Self {
        Self {
            usage,
            extractor,
            logger,
            watch_base_url,
            pending_logs: Mutex::new(Vec::new()),
        }
    }

    pub fn from_config(config: &Config, usage: UsageGate) -> Result<Self> {
        let client = config.http_client()?;

        Ok(Self::new(
            usage,
            Arc::new(AnthropicExtractor::new(client.clone(), config.generation.clone())),
            Arc::new(SheetsLogger::new(client, config.sheets.webhook_url.clone())),
            config.youtube.base_url.clone(),
        ))
    }

    pub fn usage(&self) -> &UsageGate {
        &self.usage
    }

    /// Run one generation for `user_id`
    ///
    /// The usage counter moves only after the model reply parsed; the log row is
    /// written in the background.
    pub async fn handle(
        &self,
        user_id: Option<&str>,
        request: GenerationRequest,
    ) -> Result<GenerationResponse, PipelineError> {
        let user_id = user_id
            .filter(|id| !id.trim().is_empty())
            .ok_or(PipelineError::Unauthorized)?;

        self.usage.check(user_id).await?;

        if request.video_id.trim().is_empty() || request.transcript.trim().is_empty() {
            return Err(PipelineError::InvalidInput(
                "Video ID and transcript are required".to_string(),
            ));
        }

        let user_email = self
            .usage
            .user_email(user_id)
            .await
            .unwrap_or_else(|| "unknown".to_string());

        let speaker_name = non_blank(request.channel_title.as_deref()).unwrap_or(UNKNOWN_SPEAKER);
        let talk_title = non_blank(request.title.as_deref()).unwrap_or(UNKNOWN_TALK);
        let youtube_url = format!(
            "{}/watch?v={}",
            self.watch_base_url.trim_end_matches('/'),
            request.video_id
        );

        let input = ExtractionInput {
            video_id: request.video_id.clone(),
            youtube_url: youtube_url.clone(),
            speaker_name: speaker_name.to_string(),
            talk_title: talk_title.to_string(),
            transcript: request.transcript.clone(),
        };

        let mut content = self.extractor.extract(&input).await?;
        content.video_id = request.video_id.clone();
        content.youtube_url = youtube_url;

        match self.usage.record(user_id).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!(user_id = %user_id, "Generation completed after quota was used up elsewhere"),
            Err(e) => tracing::error!(user_id = %user_id, error = %e, "Failed to record generation"),
        }

        let result_length = serde_json::to_string(&content).map(|s| s.len()).unwrap_or(0);
        let entry = GenerationLog {
            timestamp: Utc::now(),
            user_email,
            user_id: user_id.to_string(),
            video_id: request.video_id,
            video_title: non_blank(request.title.as_deref()).unwrap_or(UNKNOWN_LOGGED).to_string(),
            video_channel: non_blank(request.channel_title.as_deref())
                .unwrap_or(UNKNOWN_LOGGED)
                .to_string(),
            transcript_source: request.transcript_source.unwrap_or(TranscriptSource::Captions),
            transcript_length: request.transcript.len(),
            result_length,
        };

        let logger = self.logger.clone();
        let task = tokio::spawn(async move { logger.log(entry).await });
        if let Ok(mut pending) = self.pending_logs.lock() {
            pending.retain(|handle| !handle.is_finished());
            pending.push(task);
        }

        Ok(GenerationResponse {
            success: true,
            content,
        })
    }

    /// Wait for background log writes; one-shot callers use this before exiting
    pub async fn flush_logs(&self) {
        let pending = match self.pending_logs.lock() {
            Ok(mut pending) => std::mem::take(&mut *pending),
            Err(_) => return,
        };

        for handle in pending {
            let _ = handle.await;
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
