//! Shapes the model is asked to return, one per route.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerMention {
    pub name: String,
    #[serde(default, alias = "observation", alias = "context")]
    pub note: String,
    #[serde(default)]
    pub skill_tags: Vec<String>,
    #[serde(default)]
    pub sentiment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttendanceExtraction {
    pub players_mentioned: Vec<PlayerMention>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationAnalysis {
    pub summary: String,
    #[serde(default)]
    pub players: Vec<PlayerMention>,
    #[serde(default)]
    pub skill_tags: Vec<String>,
    #[serde(default)]
    pub constraint_tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimpleObservationAnalysis {
    pub summary: String,
    #[serde(default)]
    pub skill_tags: Vec<String>,
    #[serde(default)]
    pub constraint_tags: Vec<String>,
    #[serde(default)]
    pub sentiment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReflectionAnalysis {
    pub summary: String,
    #[serde(default)]
    pub went_well: Vec<String>,
    #[serde(default)]
    pub needs_work: Vec<String>,
    #[serde(default)]
    pub players: Vec<PlayerMention>,
    #[serde(default)]
    pub themes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockFeedback {
    pub block_name: String,
    #[serde(default)]
    pub feedback: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionNotesAnalysis {
    pub summary: String,
    #[serde(default)]
    pub block_feedback: Vec<BlockFeedback>,
    #[serde(default)]
    pub players: Vec<PlayerMention>,
    #[serde(default)]
    pub follow_ups: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract_json;

    #[test]
    fn player_mentions_accept_common_aliases() {
        let parsed: AttendanceExtraction = extract_json(
            r#"{"players_mentioned": [{"name": "Maya", "context": "hit three corner threes"}]}"#,
            "attendance",
        )
        .unwrap();

        assert_eq!(parsed.players_mentioned[0].note, "hit three corner threes");
    }

    #[test]
    fn optional_sections_default_to_empty() {
        let parsed: ReflectionAnalysis =
            extract_json(r#"{"summary": "Flat energy after water break"}"#, "reflection").unwrap();

        assert!(parsed.players.is_empty());
        assert!(parsed.went_well.is_empty());
    }

    #[test]
    fn summary_is_required() {
        assert!(extract_json::<ObservationAnalysis>(r#"{"players": []}"#, "observation").is_err());
    }
}
