use anyhow::{bail, Result};

use crate::pipeline::TranscriptResult;
use crate::utils::format_srt_timestamp;

/// Metadata header followed by the full transcript
pub fn format_as_text(result: &TranscriptResult) -> String {
    format!(
        "{}\n{}\nSource: {}\n\n{}\n",
        result.title, result.channel_title, result.source, result.full_text
    )
}

pub fn format_as_json(result: &TranscriptResult) -> Result<String> {
    Ok(serde_json::to_string_pretty(result)?)
}

/// One cue per segment; pasted transcripts have no timing and cannot be rendered
pub fn format_as_srt(result: &TranscriptResult) -> Result<String> {
    if result.segments.is_empty() {
        bail!("Transcript from {} has no timed segments; use text or json output", result.source);
    }

    let mut srt = String::new();
    for (index, segment) in result.segments.iter().enumerate() {
        let end = segment.offset_ms + segment.duration_ms;
        srt.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            index + 1,
            format_srt_timestamp(segment.offset_ms),
            format_srt_timestamp(end),
            segment.text.trim()
        ));
    }

    Ok(srt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{TranscriptSegment, TranscriptSource};
    use crate::video::{VideoId, VideoInfo};

    fn captioned() -> TranscriptResult {
        TranscriptResult {
            video_id: VideoId::parse("dQw4w9WgXcQ").unwrap(),
            title: "Questions That Lead".into(),
            channel_title: "Ada Speaker".into(),
            thumbnail_url: "https://img/t.jpg".into(),
            full_text: "Start with why. Then ask how.".into(),
            segments: vec![
                TranscriptSegment {
                    text: "Start with why.".into(),
                    offset_ms: 0,
                    duration_ms: 2000,
                },
                TranscriptSegment {
                    text: " Then ask how.\n".into(),
                    offset_ms: 3_661_500,
                    duration_ms: 1500,
                },
            ],
            source: TranscriptSource::Captions,
        }
    }

    #[test]
    fn test_format_as_text() {
        let text = format_as_text(&captioned());
        assert!(text.starts_with("Questions That Lead\nAda Speaker\nSource: youtube-captions\n\n"));
        assert!(text.ends_with("Start with why. Then ask how.\n"));
    }

    #[test]
    fn test_format_as_srt() {
        let srt = format_as_srt(&captioned()).unwrap();
        assert!(srt.starts_with("1\n00:00:00,000 --> 00:00:02,000\nStart with why.\n\n"));
        assert!(srt.contains("2\n01:01:01,500 --> 01:01:03,000\nThen ask how.\n"));
    }

    #[test]
    fn test_manual_transcript_has_no_srt() {
        let id = VideoId::parse("dQw4w9WgXcQ").unwrap();
        let manual = TranscriptResult::manual(&id, VideoInfo::fallback("t".into()), "pasted").unwrap();
        assert!(format_as_srt(&manual).is_err());
        assert!(format_as_json(&manual).unwrap().contains("\"source\": \"manual\""));
    }
}
