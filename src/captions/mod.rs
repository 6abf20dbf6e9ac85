use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::config::YoutubeConfig;
use crate::pipeline::TranscriptSegment;
use crate::video::VideoId;
use crate::{PipelineError, Result};

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Source of platform-hosted caption tracks
///
/// Any error means "no captions for this run"; callers fall back regardless of the cause.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CaptionTranscriptFetcher: Send + Sync {
    async fn fetch(&self, video_id: &VideoId) -> Result<Vec<TranscriptSegment>>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptionTrack {
    base_url: String,
    language_code: String,
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TimedText {
    #[serde(default)]
    events: Vec<TimedTextEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimedTextEvent {
    #[serde(default)]
    t_start_ms: u64,
    #[serde(default)]
    d_duration_ms: u64,
    #[serde(default)]
    segs: Vec<TimedTextSeg>,
}

#[derive(Debug, Deserialize)]
struct TimedTextSeg {
    #[serde(default)]
    utf8: String,
}

/// Reads the caption track list from the watch page and downloads one track as json3
pub struct YoutubeCaptionFetcher {
    client: Client,
    config: YoutubeConfig,
}

impl YoutubeCaptionFetcher {
    pub fn new(client: Client, config: YoutubeConfig) -> Self {
        Self { client, config }
    }

    async fn list_tracks(&self, video_id: &VideoId) -> Result<Vec<CaptionTrack>> {
        let response = self
            .client
            .get(video_id.watch_url(&self.config.base_url))
            .header(reqwest::header::USER_AGENT, BROWSER_USER_AGENT)
            .header(reqwest::header::ACCEPT_LANGUAGE, format!("{},en;q=0.8", self.config.caption_language))
            .send()
            .await
            .context("Failed to fetch watch page")?;

        if !response.status().is_success() {
            anyhow::bail!("Watch page returned HTTP {}", response.status());
        }

        let html = response.text().await?;

        if html.contains("class=\"g-recaptcha\"") {
            anyhow::bail!("Host is rate limiting caption requests");
        }

        let tracks_json = extract_json_array(&html, "\"captionTracks\":").ok_or_else(|| {
            PipelineError::CaptionsUnavailable(format!("no caption tracks listed for {}", video_id))
        })?;

        let tracks: Vec<CaptionTrack> =
            serde_json::from_str(tracks_json).context("Failed to parse caption track list")?;

        Ok(tracks)
    }

    /// Prefer a human track in the configured language, then any track in it, then the first
    fn pick_track<'a>(&self, tracks: &'a [CaptionTrack]) -> Option<&'a CaptionTrack> {
        let lang = self.config.caption_language.as_str();
        let in_lang = |t: &&CaptionTrack| t.language_code == lang || t.language_code.starts_with(&format!("{}-", lang));

        tracks
            .iter()
            .filter(in_lang)
            .find(|t| t.kind.as_deref() != Some("asr"))
            .or_else(|| tracks.iter().find(in_lang))
            .or_else(|| tracks.first())
    }
}

#[async_trait]
impl CaptionTranscriptFetcher for YoutubeCaptionFetcher {
    async fn fetch(&self, video_id: &VideoId) -> Result<Vec<TranscriptSegment>> {
        let tracks = self.list_tracks(video_id).await?;
        let track = self.pick_track(&tracks).ok_or_else(|| {
            PipelineError::CaptionsUnavailable(format!("empty caption track list for {}", video_id))
        })?;

        tracing::debug!(video_id = %video_id, language = %track.language_code, "Downloading caption track");

        let timed: TimedText = self
            .client
            .get(format!("{}&fmt=json3", track.base_url))
            .header(reqwest::header::USER_AGENT, BROWSER_USER_AGENT)
            .send()
            .await
            .context("Failed to download caption track")?
            .error_for_status()?
            .json()
            .await
            .context("Failed to parse caption track")?;

        let segments = segments_from_timed_text(timed);
        if segments.is_empty() {
            return Err(PipelineError::CaptionsUnavailable(format!("caption track for {} is empty", video_id)).into());
        }

        Ok(segments)
    }
}

fn segments_from_timed_text(timed: TimedText) -> Vec<TranscriptSegment> {
    timed
        .events
        .into_iter()
        .filter_map(|event| {
            let text: String = event.segs.iter().map(|s| s.utf8.as_str()).collect();
            let text = text.trim();
            (!text.is_empty()).then(|| TranscriptSegment {
                text: text.to_string(),
                offset_ms: event.t_start_ms,
                duration_ms: event.d_duration_ms,
            })
        })
        .collect()
}

/// Slice out the JSON array that follows `key` in an HTML page, honouring string escapes
fn extract_json_array<'a>(html: &'a str, key: &str) -> Option<&'a str> {
    let start = html.find(key)? + key.len();
    let rest = html[start..].trim_start();
    let offset = html.len() - rest.len();

    if !rest.starts_with('[') {
        return None;
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in rest.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '[' | '{' => depth += 1,
            ']' | '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&html[offset..offset + i + 1]);
                }
            }
            _ => {}
        }
    }

    None
}
