use serde::{Deserialize, Serialize};

/// Structured framework extracted from a talk
///
/// Every field defaults so a partially filled model reply still renders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractedContent {
    pub speaker_name: String,
    pub talk_title: String,
    pub video_id: String,
    pub youtube_url: String,

    pub core_philosophy: CorePhilosophy,
    pub signature_question: SignatureQuestion,
    pub origin_stories: Vec<OriginStory>,
    pub transformation_arc: TransformationArc,
    pub ip_assets: Vec<IpAsset>,

    pub acronym_framework: AcronymFramework,
    pub three_layer_reframe: ThreeLayerReframe,
    pub comparable_experts: Vec<ComparableExpert>,

    pub positioning: Positioning,
    pub service_tiers: Vec<ServiceTier>,
    pub book_concept: BookConcept,
    pub workshop_modules: Vec<WorkshopModule>,

    pub speaker_bio: String,
    pub pull_quote: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CorePhilosophy {
    pub central_belief: String,
    pub powerful_quotes: Vec<String>,
    pub challenged_wisdom: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SignatureQuestion {
    pub question: String,
    pub reframing_power: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OriginStory {
    pub title: String,
    pub summary: String,
    pub emotional_resonance: String,
    pub framework_proof: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransformationArc {
    pub before_state: String,
    pub pivotal_moment: String,
    pub after_state: String,
    pub mission: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IpAssetKind {
    SignatureQuestion,
    CoreMetaphor,
    #[default]
    Framework,
    Story,
    Quote,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpAsset {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: IpAssetKind,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FrameworkLetter {
    pub letter: String,
    pub principle: String,
    pub explanation: String,
    pub discovery_questions: Vec<String>,
    pub supporting_quote: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AcronymFramework {
    pub acronym: String,
    pub full_name: String,
    pub letters: Vec<FrameworkLetter>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreeLayerReframe {
    #[serde(rename = "level1Think")]
    pub level1_think: String,
    #[serde(rename = "level2Say")]
    pub level2_say: String,
    #[serde(rename = "level3Actually")]
    pub level3_actually: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComparableExpert {
    pub name: String,
    pub known_for: String,
    pub framework: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Positioning {
    pub tagline: String,
    pub one_sentence: String,
    pub title_descriptor: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceTier {
    pub name: String,
    pub description: String,
    pub included: Vec<String>,
    pub ideal_for: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookPart {
    pub part: String,
    pub theme: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BookConcept {
    pub working_title: String,
    pub subtitle: String,
    pub three_part_structure: Vec<BookPart>,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkshopModule {
    pub name: String,
    pub duration: String,
    pub outcomes: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_reply_parses_with_defaults() {
        let content: ExtractedContent = serde_json::from_str(
            r#"{
                "speakerName": "Ada Speaker",
                "signatureQuestion": {"question": "What would you ask if you knew the answer?"},
                "ipAssets": [{"name": "ASK", "type": "framework", "description": "d"},
                             {"name": "Lantern", "type": "core_metaphor", "description": "m"}],
                "threeLayerReframe": {"level1Think": "a", "level2Say": "b", "level3Actually": "c"},
                "bookConcept": {"threePartStructure": [{"part": "I", "theme": "Ask"}]}
            }"#,
        )
        .unwrap();

        assert_eq!(content.speaker_name, "Ada Speaker");
        assert_eq!(content.ip_assets[1].kind, IpAssetKind::CoreMetaphor);
        assert_eq!(content.three_layer_reframe.level3_actually, "c");
        assert_eq!(content.book_concept.three_part_structure[0].theme, "Ask");
        assert!(content.service_tiers.is_empty());
    }

    #[test]
    fn test_serializes_in_camel_case() {
        let json = serde_json::to_value(ExtractedContent::default()).unwrap();
        assert!(json.get("corePhilosophy").is_some());
        assert!(json["threeLayerReframe"].get("level2Say").is_some());
        assert!(json.get("pullQuote").is_some());
    }
}
