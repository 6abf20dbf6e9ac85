use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::sleep;

use super::{AudioExtractor, AudioPayload};
use crate::config::ExtractionConfig;
use crate::utils::sanitize_filename;
use crate::video::VideoId;
use crate::PipelineError;

/// One status report from the asynchronous extraction API
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PollResponse {
    Ok {
        link: String,
        #[serde(default)]
        title: Option<String>,
    },
    Processing {
        #[serde(default)]
        progress: Option<serde_json::Value>,
    },
    Fail {
        #[serde(default)]
        msg: Option<String>,
    },
    Error {
        #[serde(default)]
        msg: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

/// Submits or re-checks the extraction job for a video
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExtractionJobApi: Send + Sync {
    async fn check(&self, video_id: &VideoId) -> Result<PollResponse, PipelineError>;
}

/// The API gateway flavour: the same GET both starts the job and reports its state
pub struct RapidApiJobs {
    client: Client,
    url: String,
    host: String,
    api_key: Option<String>,
}

impl RapidApiJobs {
    pub fn new(client: Client, config: &ExtractionConfig) -> Self {
        Self {
            client,
            url: config.polling_api_url.clone(),
            host: config.polling_api_host.clone(),
            api_key: config.polling_api_key.clone(),
        }
    }
}

#[async_trait]
impl ExtractionJobApi for RapidApiJobs {
    async fn check(&self, video_id: &VideoId) -> Result<PollResponse, PipelineError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| PipelineError::ServiceNotConfigured("Polling extraction API (RAPIDAPI_KEY)".to_string()))?;

        let response = self
            .client
            .get(&self.url)
            .query(&[("id", video_id.as_str())])
            .header("X-RapidAPI-Key", api_key)
            .header("X-RapidAPI-Host", &self.host)
            .send()
            .await
            .map_err(|e| PipelineError::ExtractionFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PipelineError::ExtractionFailed(format!(
                "extraction API returned HTTP {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| PipelineError::ExtractionFailed(e.to_string()))?;

        serde_json::from_str(&body)
            .map_err(|e| PipelineError::UnexpectedProviderResponse(format!("{}: {}", e, truncate(&body, 200))))
    }
}

/// Polls a job-based extraction API until it yields a download link
pub struct PollingExtractor {
    api: Box<dyn ExtractionJobApi>,
    interval: Duration,
    max_attempts: u32,
}

impl PollingExtractor {
    pub fn new(client: Client, config: &ExtractionConfig) -> Self {
        Self::with_api(
            Box::new(RapidApiJobs::new(client, config)),
            Duration::from_millis(config.poll_interval_ms),
            config.max_poll_attempts,
        )
    }

    pub fn with_api(api: Box<dyn ExtractionJobApi>, interval: Duration, max_attempts: u32) -> Self {
        Self {
            api,
            interval,
            max_attempts,
        }
    }
}

#[async_trait]
impl AudioExtractor for PollingExtractor {
    async fn extract(&self, video_id: &VideoId) -> Result<AudioPayload, PipelineError> {
        for attempt in 1..=self.max_attempts {
            match self.api.check(video_id).await? {
                PollResponse::Ok { link, title } => {
                    tracing::info!(video_id = %video_id, attempt, "Extraction job finished");
                    let name = title.filter(|t| !t.is_empty()).unwrap_or_else(|| video_id.to_string());
                    return Ok(AudioPayload::Url {
                        url: link,
                        filename: format!("{}.mp3", sanitize_filename(&name)),
                    });
                }
                PollResponse::Processing { progress } => {
                    tracing::debug!(
                        video_id = %video_id,
                        attempt,
                        progress = %progress.unwrap_or_default(),
                        "Extraction job still processing"
                    );
                    if attempt < self.max_attempts {
                        sleep(self.interval).await;
                    }
                }
                PollResponse::Fail { msg } | PollResponse::Error { msg } => {
                    return Err(PipelineError::ExtractionFailed(
                        msg.unwrap_or_else(|| "provider reported failure".to_string()),
                    ));
                }
                PollResponse::Unknown => {
                    return Err(PipelineError::UnexpectedProviderResponse(
                        "unrecognised job status".to_string(),
                    ));
                }
            }
        }

        tracing::warn!(video_id = %video_id, attempts = self.max_attempts, "Extraction job never finished");
        Err(PipelineError::ExtractionTimeout {
            attempts: self.max_attempts,
        })
    }

    fn strategy_name(&self) -> &'static str {
        "polling-api"
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::Sequence;

    fn video_id() -> VideoId {
        VideoId::parse("dQw4w9WgXcQ").unwrap()
    }

    fn processing() -> PollResponse {
        PollResponse::Processing {
            progress: Some(serde_json::json!(42)),
        }
    }

    #[test]
    fn test_response_shapes() {
        let ok: PollResponse =
            serde_json::from_str(r#"{"status":"ok","link":"https://cdn/x.mp3","title":"Talk","progress":100}"#).unwrap();
        assert_eq!(
            ok,
            PollResponse::Ok {
                link: "https://cdn/x.mp3".into(),
                title: Some("Talk".into())
            }
        );

        let processing: PollResponse = serde_json::from_str(r#"{"status":"processing","progress":"12"}"#).unwrap();
        assert!(matches!(processing, PollResponse::Processing { .. }));

        let fail: PollResponse = serde_json::from_str(r#"{"status":"fail","msg":"Long audio of more than 2 hour"}"#).unwrap();
        assert!(matches!(fail, PollResponse::Fail { msg: Some(_) }));

        let unknown: PollResponse = serde_json::from_str(r#"{"status":"queued"}"#).unwrap();
        assert_eq!(unknown, PollResponse::Unknown);
    }

    #[tokio::test]
    async fn test_always_processing_times_out_after_exactly_thirty_attempts() {
        let mut api = MockExtractionJobApi::new();
        api.expect_check().times(30).returning(|_| Ok(processing()));

        let extractor = PollingExtractor::with_api(Box::new(api), Duration::ZERO, 30);
        let result = extractor.extract(&video_id()).await;

        assert!(matches!(result, Err(PipelineError::ExtractionTimeout { attempts: 30 })));
    }

    #[tokio::test]
    async fn test_link_after_processing_is_returned_as_url() {
        let mut seq = Sequence::new();
        let mut api = MockExtractionJobApi::new();
        api.expect_check()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_| Ok(processing()));
        api.expect_check().times(1).in_sequence(&mut seq).returning(|_| {
            Ok(PollResponse::Ok {
                link: "https://cdn.example/talk.mp3".into(),
                title: Some("My Talk!".into()),
            })
        });

        let extractor = PollingExtractor::with_api(Box::new(api), Duration::ZERO, 30);
        let payload = extractor.extract(&video_id()).await.unwrap();

        assert_eq!(
            payload,
            AudioPayload::Url {
                url: "https://cdn.example/talk.mp3".into(),
                filename: "My_Talk_.mp3".into()
            }
        );
    }

    #[tokio::test]
    async fn test_fail_status_surfaces_provider_message() {
        let mut api = MockExtractionJobApi::new();
        api.expect_check().times(1).returning(|_| {
            Ok(PollResponse::Fail {
                msg: Some("Invalid video id".into()),
            })
        });

        let extractor = PollingExtractor::with_api(Box::new(api), Duration::ZERO, 30);
        match extractor.extract(&video_id()).await {
            Err(PipelineError::ExtractionFailed(msg)) => assert_eq!(msg, "Invalid video id"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_key_is_not_configured() {
        let config = ExtractionConfig::default();
        let extractor = PollingExtractor::new(Client::new(), &config);
        assert!(matches!(
            extractor.extract(&video_id()).await,
            Err(PipelineError::ServiceNotConfigured(_))
        ));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("hi", 10), "hi");
    }
}
