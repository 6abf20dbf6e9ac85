use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;

pub mod direct;
pub mod innertube;
pub mod polling;
pub mod serverless;
pub mod tunnel;

use crate::config::{Config, StrategyKind};
use crate::video::VideoId;
use crate::PipelineError;

/// Audio produced by an extraction strategy: bytes in hand, or a URL to fetch once
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioPayload {
    Buffer { data: Vec<u8>, filename: String },
    Url { url: String, filename: String },
}

impl AudioPayload {
    /// Name declared to the transcription provider; the extension selects the decoder
    pub fn filename(&self) -> &str {
        match self {
            AudioPayload::Buffer { filename, .. } | AudioPayload::Url { filename, .. } => filename,
        }
    }
}

/// Trait for obtaining playable audio for a video that has no captions
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioExtractor: Send + Sync {
    /// Extract audio for the given video
    async fn extract(&self, video_id: &VideoId) -> Result<AudioPayload, PipelineError>;

    /// Get the name of this strategy
    fn strategy_name(&self) -> &'static str;
}

/// Build the single strategy selected in configuration
pub fn build_extractor(config: &Config, client: Client) -> Arc<dyn AudioExtractor> {
    tracing::debug!(strategy = %config.extraction.strategy, "Configuring audio extraction");

    let max_bytes = config.transcription.max_upload_bytes;

    match config.extraction.strategy {
        StrategyKind::DirectStream => Arc::new(
            direct::DirectStreamExtractor::new(client, config.youtube.clone()).with_max_bytes(max_bytes),
        ),
        StrategyKind::ServerlessStream => Arc::new(
            serverless::ServerlessStreamExtractor::new(client, config.youtube.clone()).with_max_bytes(max_bytes),
        ),
        StrategyKind::PollingApi => Arc::new(polling::PollingExtractor::new(client, &config.extraction)),
        StrategyKind::TunnelApi => Arc::new(tunnel::TunnelExtractor::new(
            client,
            &config.extraction,
            config.youtube.base_url.clone(),
        )),
    }
}

/// Map provider failure text onto the content-specific categories the user can act on
pub fn classify_failure(error: PipelineError) -> PipelineError {
    let message = match &error {
        PipelineError::ExtractionFailed(m)
        | PipelineError::StreamError(m)
        | PipelineError::UnexpectedProviderResponse(m) => m.to_lowercase(),
        _ => return error,
    };

    const RESTRICTED: &[&str] = &[
        "sign in",
        "sign-in",
        "login_required",
        "login required",
        "age-restricted",
        "age restricted",
        "confirm your age",
        "age_restricted",
        "content.video.age",
    ];
    const UNAVAILABLE: &[&str] = &["private", "unavailable", "not available", "removed", "does not exist"];

    if RESTRICTED.iter().any(|needle| message.contains(needle)) {
        PipelineError::AccessRestricted
    } else if UNAVAILABLE.iter().any(|needle| message.contains(needle)) {
        PipelineError::VideoUnavailable
    } else {
        match error {
            PipelineError::StreamError(m) => PipelineError::ExtractionFailed(m),
            other => other,
        }
    }
}

/// File extension for an audio MIME type such as `audio/mp4; codecs="mp4a.40.2"`
pub fn extension_for_mime(mime_type: &str) -> &'static str {
    let essence = mime_type.split(';').next().unwrap_or_default().trim();
    match essence {
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" => "m4a",
        "audio/webm" => "webm",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/ogg" => "ogg",
        "audio/wav" | "audio/x-wav" => "wav",
        _ => "m4a",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_restricted_and_unavailable() {
        let restricted = classify_failure(PipelineError::ExtractionFailed(
            "LOGIN_REQUIRED: Sign in to confirm your age".into(),
        ));
        assert!(matches!(restricted, PipelineError::AccessRestricted));

        let private = classify_failure(PipelineError::StreamError("Video is private".into()));
        assert!(matches!(private, PipelineError::VideoUnavailable));

        let gone = classify_failure(PipelineError::UnexpectedProviderResponse(
            "error.api.content.video.unavailable".into(),
        ));
        assert!(matches!(gone, PipelineError::VideoUnavailable));

        let coded = classify_failure(PipelineError::ExtractionFailed("error.api.content.video.age".into()));
        assert!(matches!(coded, PipelineError::AccessRestricted));
    }

    #[test]
    fn test_classify_keeps_other_failures() {
        let generic = classify_failure(PipelineError::StreamError("connection reset".into()));
        assert!(matches!(generic, PipelineError::ExtractionFailed(m) if m == "connection reset"));

        let page = classify_failure(PipelineError::ExtractionFailed("bad page token".into()));
        assert!(matches!(page, PipelineError::ExtractionFailed(_)));

        let timeout = classify_failure(PipelineError::ExtractionTimeout { attempts: 30 });
        assert!(matches!(timeout, PipelineError::ExtractionTimeout { attempts: 30 }));

        assert!(matches!(
            classify_failure(PipelineError::NoAudioFormatAvailable),
            PipelineError::NoAudioFormatAvailable
        ));
    }

    #[test]
    fn test_extension_for_mime() {
        assert_eq!(extension_for_mime("audio/mp4; codecs=\"mp4a.40.2\""), "m4a");
        assert_eq!(extension_for_mime("audio/webm; codecs=\"opus\""), "webm");
        assert_eq!(extension_for_mime("audio/mpeg"), "mp3");
    }

    #[test]
    fn test_payload_filename() {
        let payload = AudioPayload::Url {
            url: "https://cdn.example/a.mp3".into(),
            filename: "talk.mp3".into(),
        };
        assert_eq!(payload.filename(), "talk.mp3");
    }
}
