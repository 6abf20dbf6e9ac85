use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{AudioExtractor, AudioPayload};
use crate::config::ExtractionConfig;
use crate::utils::sanitize_filename;
use crate::video::VideoId;
use crate::PipelineError;

/// Every response shape the tunnel provider is known to send
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TunnelResponse {
    Error {
        #[serde(default)]
        error: Option<serde_json::Value>,
        #[serde(default)]
        text: Option<String>,
    },
    Tunnel {
        url: String,
        #[serde(default)]
        filename: Option<String>,
    },
    Redirect {
        url: String,
        #[serde(default)]
        filename: Option<String>,
    },
    Stream {
        url: String,
        #[serde(default)]
        filename: Option<String>,
    },
    Picker {
        #[serde(default)]
        picker: Vec<PickerItem>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PickerItem {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
}

/// Sends the single synchronous extraction request
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TunnelApi: Send + Sync {
    async fn request(&self, video_id: &VideoId) -> Result<TunnelResponse, PipelineError>;
}

pub struct CobaltApi {
    client: Client,
    api_url: String,
    api_key: Option<String>,
    watch_base: String,
}

impl CobaltApi {
    pub fn new(client: Client, config: &ExtractionConfig, watch_base: String) -> Self {
        Self {
            client,
            api_url: config.tunnel_api_url.clone(),
            api_key: config.tunnel_api_key.clone(),
            watch_base,
        }
    }
}

#[async_trait]
impl TunnelApi for CobaltApi {
    async fn request(&self, video_id: &VideoId) -> Result<TunnelResponse, PipelineError> {
        let body = json!({
            "url": video_id.watch_url(&self.watch_base),
            "downloadMode": "audio",
            "audioFormat": "mp3",
        });

        let mut request = self
            .client
            .post(&self.api_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body);

        if let Some(key) = &self.api_key {
            request = request.header(reqwest::header::AUTHORIZATION, format!("Api-Key {}", key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| PipelineError::ExtractionFailed(e.to_string()))?;

        // Error bodies arrive with 4xx statuses but keep the same JSON shape
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| PipelineError::ExtractionFailed(e.to_string()))?;

        serde_json::from_str(&text).map_err(|e| {
            PipelineError::UnexpectedProviderResponse(format!("HTTP {} with unreadable body: {}", status, e))
        })
    }
}

/// One request, one answer: no polling
pub struct TunnelExtractor {
    api: Box<dyn TunnelApi>,
}

impl TunnelExtractor {
    pub fn new(client: Client, config: &ExtractionConfig, watch_base: String) -> Self {
        Self::with_api(Box::new(CobaltApi::new(client, config, watch_base)))
    }

    pub fn with_api(api: Box<dyn TunnelApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl AudioExtractor for TunnelExtractor {
    async fn extract(&self, video_id: &VideoId) -> Result<AudioPayload, PipelineError> {
        let response = self.api.request(video_id).await?;
        let url = select_url(response)?;

        tracing::info!(video_id = %video_id, "Tunnel provider returned an audio URL");

        Ok(AudioPayload::Url {
            url,
            filename: format!("{}.mp3", sanitize_filename(video_id.as_str())),
        })
    }

    fn strategy_name(&self) -> &'static str {
        "tunnel-api"
    }
}

/// Resolve a provider answer to the URL to download
pub fn select_url(response: TunnelResponse) -> Result<String, PipelineError> {
    match response {
        TunnelResponse::Tunnel { url, .. } | TunnelResponse::Redirect { url, .. } | TunnelResponse::Stream { url, .. } => {
            Ok(url)
        }
        TunnelResponse::Picker { picker } => {
            let mut candidates = picker.into_iter();
            let first = candidates
                .next()
                .ok_or_else(|| PipelineError::UnexpectedProviderResponse("picker without candidates".to_string()))?;

            if first.kind == "audio" {
                return Ok(first.url);
            }

            Ok(candidates.find(|item| item.kind == "audio").unwrap_or(first).url)
        }
        TunnelResponse::Error { error, text } => Err(PipelineError::ExtractionFailed(error_message(error, text))),
        TunnelResponse::Unknown => Err(PipelineError::UnexpectedProviderResponse(
            "unrecognised response status".to_string(),
        )),
    }
}

fn error_message(error: Option<serde_json::Value>, text: Option<String>) -> String {
    match error {
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Object(obj)) => obj
            .get("code")
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| serde_json::Value::Object(obj).to_string()),
        _ => text.unwrap_or_else(|| "provider reported an error".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> TunnelResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_direct_url_shapes() {
        for status in ["tunnel", "redirect", "stream"] {
            let response = parse(&format!(r#"{{"status":"{}","url":"https://t/x.mp3","filename":"x.mp3"}}"#, status));
            assert_eq!(select_url(response).unwrap(), "https://t/x.mp3");
        }
    }

    #[test]
    fn test_picker_prefers_audio_candidate() {
        let response = parse(
            r#"{"status":"picker","picker":[
                {"type":"video","url":"https://t/video.mp4"},
                {"type":"audio","url":"https://t/audio.mp3"}
            ]}"#,
        );
        assert_eq!(select_url(response).unwrap(), "https://t/audio.mp3");
    }

    #[test]
    fn test_picker_without_audio_takes_first() {
        let response = parse(
            r#"{"status":"picker","picker":[
                {"type":"photo","url":"https://t/1.jpg"},
                {"type":"video","url":"https://t/2.mp4"}
            ]}"#,
        );
        assert_eq!(select_url(response).unwrap(), "https://t/1.jpg");

        let empty = parse(r#"{"status":"picker","picker":[]}"#);
        assert!(matches!(select_url(empty), Err(PipelineError::UnexpectedProviderResponse(_))));
    }

    #[test]
    fn test_error_shapes() {
        let coded = parse(r#"{"status":"error","error":{"code":"error.api.content.video.age"}}"#);
        assert!(matches!(select_url(coded), Err(PipelineError::ExtractionFailed(m)) if m == "error.api.content.video.age"));

        let legacy = parse(r#"{"status":"error","text":"i couldn't process your request"}"#);
        assert!(matches!(select_url(legacy), Err(PipelineError::ExtractionFailed(m)) if m.starts_with("i couldn't")));
    }

    #[test]
    fn test_unknown_status_is_fatal() {
        let response = parse(r#"{"status":"local-processing","tunnel":[]}"#);
        assert_eq!(response, TunnelResponse::Unknown);
        assert!(matches!(select_url(response), Err(PipelineError::UnexpectedProviderResponse(_))));
    }

    #[tokio::test]
    async fn test_extractor_wraps_picker_audio_as_url_payload() {
        let mut api = MockTunnelApi::new();
        api.expect_request().times(1).returning(|_| {
            Ok(TunnelResponse::Picker {
                picker: vec![
                    PickerItem {
                        kind: "video".into(),
                        url: "https://t/video.mp4".into(),
                    },
                    PickerItem {
                        kind: "audio".into(),
                        url: "https://t/audio.mp3".into(),
                    },
                ],
            })
        });

        let extractor = TunnelExtractor::with_api(Box::new(api));
        let payload = extractor.extract(&VideoId::parse("dQw4w9WgXcQ").unwrap()).await.unwrap();

        assert_eq!(
            payload,
            AudioPayload::Url {
                url: "https://t/audio.mp3".into(),
                filename: "dQw4w9WgXcQ.mp3".into()
            }
        );
    }
}
