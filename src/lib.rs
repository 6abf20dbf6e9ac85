//! Talk to Landing - turn a recorded talk into a thought-leadership landing page
//!
//! This library acquires a transcript for a hosted video (captions first, then audio
//! extraction and speech-to-text as a fallback), gates generations behind a per-user
//! usage quota, and asks a language model to extract a structured framework from the
//! transcript.

pub mod captions;
pub mod cli;
pub mod config;
pub mod download;
pub mod extractors;
pub mod generate;
pub mod output;
pub mod pipeline;
pub mod server;
pub mod sheets;
pub mod transcribe;
pub mod usage;
pub mod utils;
pub mod video;

#[cfg(test)]
pub(crate) mod test_server;

pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use extractors::{AudioExtractor, AudioPayload};
pub use generate::{GenerationRequest, GenerationRequestHandler};
pub use pipeline::{TranscriptAcquisitionPipeline, TranscriptResult, TranscriptSegment, TranscriptSource};
pub use usage::{UsageGate, UsageStatus};
pub use video::VideoId;

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Coarse, HTTP-like classification of a failure as seen by the end user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    PayloadTooLarge,
    ServiceUnavailable,
    UpstreamError,
    Timeout,
}

impl ErrorCategory {
    /// HTTP status code the server answers with for this category
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorCategory::BadRequest => 400,
            ErrorCategory::Unauthorized => 401,
            ErrorCategory::Forbidden => 403,
            ErrorCategory::NotFound => 404,
            ErrorCategory::PayloadTooLarge => 413,
            ErrorCategory::ServiceUnavailable => 503,
            ErrorCategory::UpstreamError => 502,
            ErrorCategory::Timeout => 504,
        }
    }
}

/// Error types specific to transcript acquisition and generation
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("No captions available: {0}")]
    CaptionsUnavailable(String),

    #[error("{0} is not configured")]
    ServiceNotConfigured(String),

    #[error("No audio formats available for this video")]
    NoAudioFormatAvailable,

    #[error("Audio stream failed: {0}")]
    StreamError(String),

    #[error("Audio extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Audio extraction did not finish after {attempts} attempts")]
    ExtractionTimeout { attempts: u32 },

    #[error("Unexpected provider response: {0}")]
    UnexpectedProviderResponse(String),

    #[error("Video requires sign-in or is age-restricted")]
    AccessRestricted,

    #[error("Video is private or unavailable")]
    VideoUnavailable,

    #[error("Audio download failed: {reason}")]
    DownloadFailed { status: Option<u16>, reason: String },

    #[error("Audio is {size} bytes, above the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("Transcript acquisition exceeded {0}s")]
    DeadlineExceeded(u64),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not authenticated")]
    Unauthorized,

    #[error("Usage limit of {limit} generations reached")]
    UsageExceeded { limit: u32 },

    #[error("Content generation failed: {0}")]
    GenerationFailed(String),

    #[error("Usage store unavailable: {0}")]
    UsageUnavailable(String),
}

impl PipelineError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            PipelineError::CaptionsUnavailable(_) | PipelineError::ServiceNotConfigured(_) => {
                ErrorCategory::NotFound
            }
            PipelineError::PayloadTooLarge { .. } => ErrorCategory::PayloadTooLarge,
            PipelineError::AccessRestricted | PipelineError::VideoUnavailable => ErrorCategory::NotFound,
            PipelineError::NoAudioFormatAvailable
            | PipelineError::StreamError(_)
            | PipelineError::ExtractionFailed(_)
            | PipelineError::UnexpectedProviderResponse(_)
            | PipelineError::TranscriptionFailed(_)
            | PipelineError::GenerationFailed(_) => ErrorCategory::UpstreamError,
            PipelineError::ExtractionTimeout { .. }
            | PipelineError::DownloadFailed { .. }
            | PipelineError::UsageUnavailable(_) => {
                ErrorCategory::ServiceUnavailable
            }
            PipelineError::DeadlineExceeded(_) => ErrorCategory::Timeout,
            PipelineError::InvalidInput(_) => ErrorCategory::BadRequest,
            PipelineError::Unauthorized => ErrorCategory::Unauthorized,
            PipelineError::UsageExceeded { .. } => ErrorCategory::Forbidden,
        }
    }

    /// Whether the caller should fall back to a pasted transcript for this video
    pub fn offers_manual_entry(&self) -> bool {
        !matches!(
            self,
            PipelineError::VideoUnavailable
                | PipelineError::InvalidInput(_)
                | PipelineError::Unauthorized
                | PipelineError::UsageExceeded { .. }
                | PipelineError::GenerationFailed(_)
                | PipelineError::UsageUnavailable(_)
        )
    }

    /// Provider-neutral message that is safe to show to the end user
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::CaptionsUnavailable(_) | PipelineError::ServiceNotConfigured(_) => {
                "This video does not have captions available. Please paste the transcript manually.".to_string()
            }
            PipelineError::AccessRestricted => {
                "This video is age-restricted or requires sign-in. Please try a different video or paste the transcript manually.".to_string()
            }
            PipelineError::VideoUnavailable => {
                "This video is private or unavailable. Please check the URL.".to_string()
            }
            PipelineError::PayloadTooLarge { .. } => {
                "This video is too long to transcribe. Please choose a shorter video or paste the transcript manually.".to_string()
            }
            PipelineError::NoAudioFormatAvailable
            | PipelineError::StreamError(_)
            | PipelineError::ExtractionFailed(_)
            | PipelineError::ExtractionTimeout { .. }
            | PipelineError::UnexpectedProviderResponse(_)
            | PipelineError::DownloadFailed { .. } => {
                "Could not extract audio from this video. Please paste the transcript manually.".to_string()
            }
            PipelineError::TranscriptionFailed(_) => {
                "Failed to transcribe this video. Please paste the transcript manually.".to_string()
            }
            PipelineError::DeadlineExceeded(_) => {
                "Fetching the transcript took too long. Please paste the transcript manually.".to_string()
            }
            PipelineError::InvalidInput(msg) => msg.clone(),
            PipelineError::Unauthorized => "Please sign in to generate landing pages".to_string(),
            PipelineError::UsageExceeded { limit } => {
                format!("You've used all {} free generations. Contact us to upgrade.", limit)
            }
            PipelineError::GenerationFailed(_) => "Failed to generate content".to_string(),
            PipelineError::UsageUnavailable(_) => "Failed to check usage".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_status_codes() {
        assert_eq!(PipelineError::PayloadTooLarge { size: 2, limit: 1 }.category().status_code(), 413);
        assert_eq!(PipelineError::ServiceNotConfigured("OpenAI".into()).category().status_code(), 404);
        assert_eq!(PipelineError::UsageExceeded { limit: 3 }.category().status_code(), 403);
        assert_eq!(PipelineError::DeadlineExceeded(240).category(), ErrorCategory::Timeout);
        assert_eq!(PipelineError::ExtractionFailed("x".into()).category(), ErrorCategory::UpstreamError);
    }

    #[test]
    fn test_user_message_hides_provider_detail() {
        let err = PipelineError::ExtractionFailed("rapidapi quota 0x1f exhausted".into());
        assert!(!err.user_message().contains("rapidapi"));
        assert!(err.to_string().contains("rapidapi"));
    }

    #[test]
    fn test_manual_entry_follows_user_message() {
        let errors = [
            PipelineError::CaptionsUnavailable("none".into()),
            PipelineError::ServiceNotConfigured("OpenAI".into()),
            PipelineError::AccessRestricted,
            PipelineError::PayloadTooLarge { size: 2, limit: 1 },
            PipelineError::ExtractionTimeout { attempts: 30 },
            PipelineError::TranscriptionFailed("x".into()),
            PipelineError::DeadlineExceeded(240),
            PipelineError::VideoUnavailable,
            PipelineError::InvalidInput("bad id".into()),
            PipelineError::UsageExceeded { limit: 3 },
        ];

        for err in errors {
            assert_eq!(
                err.offers_manual_entry(),
                err.user_message().contains("paste the transcript manually"),
                "{:?}",
                err
            );
        }
    }

    #[test]
    fn test_usage_exceeded_message_names_limit() {
        let err = PipelineError::UsageExceeded { limit: 3 };
        assert!(err.user_message().contains("all 3 free generations"));
    }
}
