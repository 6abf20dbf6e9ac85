use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::pipeline::TranscriptSource;

/// One row in the generation log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationLog {
    pub timestamp: DateTime<Utc>,
    pub user_email: String,
    pub user_id: String,
    pub video_id: String,
    pub video_title: String,
    pub video_channel: String,
    pub transcript_source: TranscriptSource,
    pub transcript_length: usize,
    pub result_length: usize,
}

/// Receives one event per successful generation; failures never reach the caller
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerationLogger: Send + Sync {
    async fn log(&self, entry: GenerationLog);
}

/// Posts rows to a spreadsheet script webhook
pub struct SheetsLogger {
    client: Client,
    webhook_url: Option<String>,
}

impl SheetsLogger {
    pub fn new(client: Client, webhook_url: Option<String>) -> Self {
        Self { client, webhook_url }
    }
}

#[async_trait]
impl GenerationLogger for SheetsLogger {
    async fn log(&self, entry: GenerationLog) {
        tracing::info!(
            target: "talk_to_landing::generation",
            user_id = %entry.user_id,
            user_email = %entry.user_email,
            video_id = %entry.video_id,
            video_title = %entry.video_title,
            video_channel = %entry.video_channel,
            transcript_source = %entry.transcript_source,
            transcript_length = entry.transcript_length,
            result_length = entry.result_length,
            "[GENERATION]"
        );

        let Some(url) = &self.webhook_url else {
            tracing::info!("GOOGLE_SHEETS_WEBHOOK_URL not configured, skipping Sheets log");
            return;
        };

        match self.client.post(url).json(&entry).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::info!("Logged generation to Google Sheets");
            }
            Ok(response) => {
                tracing::error!(status = %response.status(), "Failed to log to Google Sheets");
            }
            Err(e) => {
                tracing::error!(error = %e, "Error logging to Google Sheets");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> GenerationLog {
        GenerationLog {
            timestamp: DateTime::parse_from_rfc3339("2026-10-18T09:30:00Z").unwrap().with_timezone(&Utc),
            user_email: "ada@example.com".into(),
            user_id: "user_1".into(),
            video_id: "dQw4w9WgXcQ".into(),
            video_title: "Questions That Lead".into(),
            video_channel: "Ada Speaker".into(),
            transcript_source: TranscriptSource::Captions,
            transcript_length: 1200,
            result_length: 5400,
        }
    }

    #[test]
    fn test_row_shape() {
        let json = serde_json::to_value(entry()).unwrap();
        assert_eq!(json["timestamp"], "2026-10-18T09:30:00Z");
        assert_eq!(json["userEmail"], "ada@example.com");
        assert_eq!(json["videoChannel"], "Ada Speaker");
        assert_eq!(json["transcriptSource"], "youtube-captions");
    }

    #[test]
    fn test_unconfigured_webhook_is_skipped() {
        let logger = SheetsLogger::new(Client::new(), None);
        tokio_test::block_on(logger.log(entry()));
    }

    #[tokio::test]
    async fn test_unreachable_webhook_does_not_fail() {
        let logger = SheetsLogger::new(Client::new(), Some("http://127.0.0.1:9/exec".into()));
        logger.log(entry()).await;
    }
}
