use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::YoutubeConfig;
use crate::PipelineError;

pub const UNKNOWN_TITLE: &str = "Unknown Title";
pub const UNKNOWN_SPEAKER: &str = "Unknown Speaker";

/// Identifier of a hosted video (11 characters of `[A-Za-z0-9_-]`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    /// Parse a bare id or any of the common watch/share/embed URL shapes
    pub fn parse(input: &str) -> Result<Self, PipelineError> {
        let input = input.trim();

        if Self::is_valid_id(input) {
            return Ok(Self(input.to_string()));
        }

        let with_scheme = if input.starts_with("http://") || input.starts_with("https://") {
            input.to_string()
        } else {
            format!("https://{}", input)
        };

        let url = Url::parse(&with_scheme)
            .map_err(|_| PipelineError::InvalidInput(format!("Not a video URL or id: {}", input)))?;

        Self::from_url(&url)
            .ok_or_else(|| PipelineError::InvalidInput(format!("Could not find a video id in: {}", input)))
    }

    fn from_url(url: &Url) -> Option<Self> {
        let host = url.host_str()?.trim_start_matches("www.").trim_start_matches("m.");
        let mut segments = url.path_segments()?.filter(|s| !s.is_empty());

        let candidate = match host {
            "youtu.be" => segments.next().map(str::to_string),
            "youtube.com" | "music.youtube.com" | "youtube-nocookie.com" => match segments.next() {
                Some("watch") => url
                    .query_pairs()
                    .find(|(k, _)| k == "v")
                    .map(|(_, v)| v.into_owned()),
                Some("embed" | "shorts" | "live" | "v") => segments.next().map(str::to_string),
                _ => None,
            },
            _ => None,
        }?;

        Self::is_valid_id(&candidate).then_some(Self(candidate))
    }

    fn is_valid_id(s: &str) -> bool {
        s.len() == 11 && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical watch page URL on the given host
    pub fn watch_url(&self, base_url: &str) -> String {
        format!("{}/watch?v={}", base_url.trim_end_matches('/'), self.0)
    }
}

impl std::fmt::Display for VideoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Display metadata for a video
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInfo {
    pub title: String,
    pub channel_title: String,
    pub thumbnail_url: String,
}

impl VideoInfo {
    /// Placeholder used whenever metadata cannot be fetched
    pub fn fallback(thumbnail_url: String) -> Self {
        Self {
            title: UNKNOWN_TITLE.to_string(),
            channel_title: UNKNOWN_SPEAKER.to_string(),
            thumbnail_url,
        }
    }
}

/// Resolves cosmetic metadata; never fails the caller
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VideoInfoResolver: Send + Sync {
    async fn resolve(&self, video_id: &VideoId) -> VideoInfo;
}

#[derive(Debug, Deserialize)]
struct OEmbedResponse {
    title: Option<String>,
    author_name: Option<String>,
}

/// Metadata lookups against the public oEmbed endpoint
pub struct OEmbedResolver {
    client: Client,
    config: YoutubeConfig,
}

impl OEmbedResolver {
    pub fn new(client: Client, config: YoutubeConfig) -> Self {
        Self { client, config }
    }

    pub fn thumbnail_url(&self, video_id: &VideoId) -> String {
        thumbnail_url(&self.config.thumbnail_template, video_id)
    }

    fn oembed_request_url(&self, video_id: &VideoId) -> String {
        format!(
            "{}?url={}&format=json",
            self.config.oembed_url,
            urlencoding::encode(&video_id.watch_url(&self.config.base_url))
        )
    }

    async fn fetch(&self, video_id: &VideoId) -> anyhow::Result<OEmbedResponse> {
        let response = self.client.get(self.oembed_request_url(video_id)).send().await?;

        if !response.status().is_success() {
            anyhow::bail!("oEmbed returned HTTP {}", response.status());
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl VideoInfoResolver for OEmbedResolver {
    async fn resolve(&self, video_id: &VideoId) -> VideoInfo {
        let thumbnail = self.thumbnail_url(video_id);

        match self.fetch(video_id).await {
            Ok(data) => VideoInfo {
                title: data.title.filter(|t| !t.is_empty()).unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
                channel_title: data
                    .author_name
                    .filter(|a| !a.is_empty())
                    .unwrap_or_else(|| UNKNOWN_SPEAKER.to_string()),
                thumbnail_url: thumbnail,
            },
            Err(e) => {
                tracing::debug!(video_id = %video_id, error = %e, "Metadata lookup failed, using fallback");
                VideoInfo::fallback(thumbnail)
            }
        }
    }
}

pub fn thumbnail_url(template: &str, video_id: &VideoId) -> String {
    template.replace("{id}", video_id.as_str())
}
