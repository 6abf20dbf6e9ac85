use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::content::ExtractedContent;
use super::{ContentExtractor, ExtractionInput};
use crate::config::GenerationConfig;
use crate::PipelineError;

const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Framework extraction via the Messages API
pub struct AnthropicExtractor {
    client: Client,
    config: GenerationConfig,
}

impl AnthropicExtractor {
    pub fn new(client: Client, config: GenerationConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl ContentExtractor for AnthropicExtractor {
    async fn extract(&self, input: &ExtractionInput) -> Result<ExtractedContent, PipelineError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| PipelineError::GenerationFailed("ANTHROPIC_API_KEY is not set".to_string()))?;

        let body = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "messages": [{ "role": "user", "content": build_prompt(input) }],
        });

        tracing::info!(video_id = %input.video_id, model = %self.config.model, "Requesting framework extraction");

        let response = self
            .client
            .post(format!("{}/messages", self.config.api_url.trim_end_matches('/')))
            .header("x-api-key", api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::GenerationFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %text, "Model API returned an error");
            return Err(PipelineError::GenerationFailed(format!("model API returned HTTP {}", status)));
        }

        let message: MessagesResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::GenerationFailed(format!("unreadable model response: {}", e)))?;

        let text = message
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text)
            .ok_or_else(|| PipelineError::GenerationFailed("No text content in response".to_string()))?;

        parse_content(&text)
    }
}

/// Parse the outermost JSON object in a model reply
pub fn parse_content(reply: &str) -> Result<ExtractedContent, PipelineError> {
    let json = extract_json_object(reply)
        .ok_or_else(|| PipelineError::GenerationFailed("No JSON found in response".to_string()))?;

    serde_json::from_str(json).map_err(|e| {
        tracing::error!(error = %e, "Failed to parse model reply as JSON");
        PipelineError::GenerationFailed("Failed to parse AI response as JSON".to_string())
    })
}

/// Slice from the first `{` to the last `}`
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn build_prompt(input: &ExtractionInput) -> String {
    format!(
        "You are extracting a thought-leadership framework from a talk.\n\
         Speaker: {speaker}\n\
         Talk title: {title}\n\
         Video: {url} (id {id})\n\n\
         Reply with a single JSON object using these camelCase keys: speakerName, talkTitle, videoId, \
         youtubeUrl, corePhilosophy, signatureQuestion, originStories, transformationArc, ipAssets, \
         acronymFramework, threeLayerReframe, comparableExperts, positioning, serviceTiers, bookConcept, \
         workshopModules, speakerBio, pullQuote.\n\n\
         <transcript>\n{transcript}\n</transcript>",
        speaker = input.speaker_name,
        title = input.talk_title,
        url = input.youtube_url,
        id = input.video_id,
        transcript = input.transcript,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_content_ignores_surrounding_prose() {
        let reply = "Here is the framework:\n```json\n{\"speakerName\": \"Ada\", \"pullQuote\": \"Ask {first}.\"}\n```\nHope it helps.";
        let content = parse_content(reply).unwrap();
        assert_eq!(content.speaker_name, "Ada");
        assert_eq!(content.pull_quote, "Ask {first}.");
    }

    #[test]
    fn test_parse_content_errors() {
        assert!(matches!(parse_content("no json at all"), Err(PipelineError::GenerationFailed(m)) if m.contains("No JSON")));
        assert!(matches!(parse_content("{ not: json }"), Err(PipelineError::GenerationFailed(m)) if m.contains("parse")));
        assert!(extract_json_object("} {").is_none());
    }

    #[test]
    fn test_prompt_carries_metadata_and_transcript() {
        let input = ExtractionInput {
            video_id: "dQw4w9WgXcQ".into(),
            youtube_url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".into(),
            speaker_name: "Ada Speaker".into(),
            talk_title: "Questions That Lead".into(),
            transcript: "Start with why.".into(),
        };
        let prompt = build_prompt(&input);
        assert!(prompt.contains("Speaker: Ada Speaker"));
        assert!(prompt.contains("<transcript>\nStart with why.\n</transcript>"));
    }

    #[tokio::test]
    async fn test_missing_key() {
        let extractor = AnthropicExtractor::new(Client::new(), GenerationConfig::default());
        let input = ExtractionInput {
            video_id: "x".into(),
            youtube_url: "u".into(),
            speaker_name: "s".into(),
            talk_title: "t".into(),
            transcript: "tr".into(),
        };
        assert!(matches!(extractor.extract(&input).await, Err(PipelineError::GenerationFailed(_))));
    }
}
