use serde::Deserialize;

use super::{TimedSegment, Transcription};
use crate::PipelineError;

/// Provider `verbose_json` transcription format
#[derive(Debug, Deserialize)]
struct VerboseTranscript {
    text: String,
    #[serde(default)]
    segments: Option<Vec<VerboseSegment>>,
}

#[derive(Debug, Deserialize)]
struct VerboseSegment {
    start: f64,
    end: f64,
    text: String,
}

/// Parse a `verbose_json` body into text plus ordered segments
pub fn parse_verbose_json(body: &str) -> Result<Transcription, PipelineError> {
    let transcript: VerboseTranscript = serde_json::from_str(body)
        .map_err(|e| PipelineError::TranscriptionFailed(format!("unreadable provider response: {}", e)))?;

    let mut segments: Vec<TimedSegment> = transcript
        .segments
        .unwrap_or_default()
        .into_iter()
        .map(|s| TimedSegment {
            start: s.start,
            end: s.end,
            text: s.text,
        })
        .collect();

    // Providers emit segments in order, but keep the temporal invariant regardless
    segments.sort_by(|a, b| a.start.total_cmp(&b.start));

    Ok(Transcription {
        text: transcript.text,
        segments,
    })
}

/// MIME type declared for the uploaded file, derived from its extension
pub fn mime_for_filename(filename: &str) -> &'static str {
    let extension = filename.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("m4a") | Some("mp4") => "audio/mp4",
        Some("webm") => "audio/webm",
        Some("ogg") | Some("oga") => "audio/ogg",
        Some("wav") => "audio/wav",
        Some("flac") => "audio/flac",
        _ => "audio/mpeg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_verbose_json() {
        let body = r#"{
            "task": "transcribe",
            "language": "english",
            "duration": 8.47,
            "text": "The answer is a question. Always.",
            "segments": [
                {"id": 1, "start": 4.2, "end": 8.47, "text": " Always.", "avg_logprob": -0.2},
                {"id": 0, "start": 0.0, "end": 4.2, "text": " The answer is a question.", "avg_logprob": -0.1}
            ]
        }"#;

        let transcription = parse_verbose_json(body).unwrap();
        assert_eq!(transcription.text, "The answer is a question. Always.");
        assert_eq!(transcription.segments.len(), 2);
        assert_eq!(transcription.segments[0].start, 0.0);
        assert_eq!(transcription.segments[1].text, " Always.");
    }

    #[test]
    fn test_parse_without_segments() {
        let transcription = parse_verbose_json(r#"{"text":"hi"}"#).unwrap();
        assert!(transcription.segments.is_empty());
    }

    #[test]
    fn test_parse_garbage_is_transcription_failure() {
        assert!(matches!(
            parse_verbose_json("<html>502</html>"),
            Err(PipelineError::TranscriptionFailed(_))
        ));
    }

    #[test]
    fn test_mime_for_filename() {
        assert_eq!(mime_for_filename("talk.m4a"), "audio/mp4");
        assert_eq!(mime_for_filename("talk.WEBM"), "audio/webm");
        assert_eq!(mime_for_filename("talk.mp3"), "audio/mpeg");
        assert_eq!(mime_for_filename("talk"), "audio/mpeg");
    }
}
