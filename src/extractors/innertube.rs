//! Minimal client for the host's internal player API.
//!
//! Both streaming strategies ask the player endpoint for the adaptive format list and
//! pick an audio-only stream; they differ in client profile and in how bytes are pulled.

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::extension_for_mime;
use crate::utils::sanitize_filename;
use crate::video::VideoId;
use crate::PipelineError;

/// Client identity presented to the player API
#[derive(Debug, Clone, Copy)]
pub struct ClientProfile {
    pub name: &'static str,
    pub version: &'static str,
    pub user_agent: &'static str,
    pub device_model: Option<&'static str>,
}

pub const WEB: ClientProfile = ClientProfile {
    name: "WEB",
    version: "2.20240726.00.00",
    user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36",
    device_model: None,
};

/// Mobile client whose streams are served without a signature challenge
pub const IOS: ClientProfile = ClientProfile {
    name: "IOS",
    version: "19.29.1",
    user_agent: "com.google.ios.youtube/19.29.1 (iPhone16,2; U; CPU iOS 17_5_1 like Mac OS X;)",
    device_model: Some("iPhone16,2"),
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PlayerResponse {
    playability_status: Option<PlayabilityStatus>,
    video_details: Option<VideoDetails>,
    streaming_data: Option<StreamingData>,
}

#[derive(Debug, Deserialize)]
struct PlayabilityStatus {
    status: String,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideoDetails {
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamingData {
    #[serde(default)]
    adaptive_formats: Vec<AdaptiveFormat>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AdaptiveFormat {
    url: Option<String>,
    mime_type: String,
    bitrate: Option<u64>,
    content_length: Option<String>,
}

/// A directly fetchable audio stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAudio {
    pub url: String,
    pub mime_type: String,
    pub content_length: Option<u64>,
    pub filename: String,
}

pub struct InnertubeClient {
    client: Client,
    base_url: String,
    profile: ClientProfile,
}

impl InnertubeClient {
    pub fn new(client: Client, base_url: String, profile: ClientProfile) -> Self {
        Self {
            client,
            base_url,
            profile,
        }
    }

    pub fn profile(&self) -> &ClientProfile {
        &self.profile
    }

    pub fn http(&self) -> &Client {
        &self.client
    }

    async fn player(&self, video_id: &VideoId) -> Result<PlayerResponse, PipelineError> {
        let mut client_context = json!({
            "clientName": self.profile.name,
            "clientVersion": self.profile.version,
            "hl": "en",
            "gl": "US",
        });
        if let Some(model) = self.profile.device_model {
            client_context["deviceModel"] = json!(model);
        }

        let body = json!({
            "videoId": video_id.as_str(),
            "context": { "client": client_context },
            "contentCheckOk": true,
            "racyCheckOk": true,
        });

        let response = self
            .client
            .post(format!("{}/youtubei/v1/player?prettyPrint=false", self.base_url.trim_end_matches('/')))
            .header(reqwest::header::USER_AGENT, self.profile.user_agent)
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::ExtractionFailed(format!("player request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(PipelineError::ExtractionFailed(format!(
                "player API returned HTTP {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| PipelineError::UnexpectedProviderResponse(format!("player response: {}", e)))
    }

    /// Ask the player API for this video and pick the audio stream to download
    pub async fn resolve_audio(&self, video_id: &VideoId) -> Result<ResolvedAudio, PipelineError> {
        let player = self.player(video_id).await?;
        resolve_from_player(player, video_id)
    }
}

pub(crate) fn resolve_from_player(player: PlayerResponse, video_id: &VideoId) -> Result<ResolvedAudio, PipelineError> {
    if let Some(status) = &player.playability_status {
        if status.status != "OK" {
            return Err(PipelineError::ExtractionFailed(format!(
                "{}: {}",
                status.status,
                status.reason.as_deref().unwrap_or("not playable")
            )));
        }
    }

    let formats = player
        .streaming_data
        .map(|data| data.adaptive_formats)
        .unwrap_or_default();

    let format = select_audio_format(&formats).ok_or(PipelineError::NoAudioFormatAvailable)?;
    let url = format.url.clone().ok_or(PipelineError::NoAudioFormatAvailable)?;

    let title = player
        .video_details
        .and_then(|details| details.title)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| video_id.to_string());

    Ok(ResolvedAudio {
        url,
        filename: format!("{}.{}", sanitize_filename(&title), extension_for_mime(&format.mime_type)),
        mime_type: format.mime_type.clone(),
        content_length: format.content_length.as_deref().and_then(|l| l.parse().ok()),
    })
}

/// Audio-only streams with a plain URL; mp4 preferred, smallest bitrate first
fn select_audio_format(formats: &[AdaptiveFormat]) -> Option<&AdaptiveFormat> {
    let audio = || {
        formats
            .iter()
            .filter(|f| f.mime_type.starts_with("audio/") && f.url.is_some())
    };

    audio()
        .filter(|f| f.mime_type.starts_with("audio/mp4"))
        .min_by_key(|f| f.bitrate.unwrap_or(u64::MAX))
        .or_else(|| audio().min_by_key(|f| f.bitrate.unwrap_or(u64::MAX)))
}
