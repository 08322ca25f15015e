use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::job::ExpertiseTier;
use crate::models::Section;

/// A freelancer profile after the gateway's normalization step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedUserProfile {
    pub user_id: String,
    pub summary: String,
    pub skills: Vec<String>,
    pub credentials: Vec<String>,
    pub subject_matter_codes: Vec<String>,
    pub years_experience: u32,
    pub has_labeling_experience: bool,
    pub languages: Vec<String>,
    pub country: Option<String>,
}

/// Metadata stored alongside each user vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMetadata {
    pub user_id: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub section: Section,
    #[serde(default)]
    pub expertise_tier: ExpertiseTier,
    #[serde(default)]
    pub credentials: Vec<String>,
    #[serde(default)]
    pub subject_matter_codes: Vec<String>,
    #[serde(default)]
    pub years_experience: u32,
    #[serde(default)]
    pub has_labeling_experience: bool,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl UserMetadata {
    pub fn with_section(&self, section: Section) -> Self {
        Self {
            section,
            ..self.clone()
        }
    }

    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    pub fn from_map(map: &Map<String, Value>) -> Option<Self> {
        serde_json::from_value(Value::Object(map.clone())).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_metadata_round_trip() {
        let meta = UserMetadata {
            user_id: "u1".to_string(),
            entity_type: "user".to_string(),
            section: Section::Task,
            expertise_tier: ExpertiseTier::Intermediate,
            credentials: vec!["RN".to_string()],
            subject_matter_codes: vec!["medical:nursing".to_string()],
            years_experience: 4,
            has_labeling_experience: true,
            languages: vec!["English".to_string(), "Polish".to_string()],
            country: Some("PL".to_string()),
        };
        let map = meta.to_map();
        assert_eq!(map.get("type").and_then(Value::as_str), Some("user"));

        let parsed = UserMetadata::from_map(&map).expect("round trip");
        assert_eq!(parsed.user_id, "u1");
        assert!(parsed.has_labeling_experience);
        assert_eq!(parsed.languages.len(), 2);
    }

    #[test]
    fn test_absent_country_is_not_serialized() {
        let meta = UserMetadata {
            user_id: "u2".to_string(),
            entity_type: "user".to_string(),
            section: Section::Domain,
            expertise_tier: ExpertiseTier::Entry,
            credentials: vec![],
            subject_matter_codes: vec![],
            years_experience: 0,
            has_labeling_experience: false,
            languages: vec![],
            country: None,
        };
        assert!(!meta.to_map().contains_key("country"));
    }
}
