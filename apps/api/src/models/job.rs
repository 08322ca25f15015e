use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::Section;

/// Classification bucket driving channel weights and the subject-matter gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobClass {
    Specialized,
    Generic,
}

impl JobClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobClass::Specialized => "specialized",
            JobClass::Generic => "generic",
        }
    }
}

impl std::fmt::Display for JobClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subject-matter gate strictness. Maps to a cosine-similarity floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    Strict,
    #[default]
    Moderate,
    Lenient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpertiseTier {
    #[default]
    Entry,
    Intermediate,
    Expert,
    Specialist,
}

/// A job posting after the gateway's normalization step. All downstream
/// components consume this shape, never the raw request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedJobPosting {
    pub job_id: String,
    pub title: Option<String>,
    pub description: String,
    pub instructions: Option<String>,
    pub countries: Vec<String>,
    pub languages: Vec<String>,
    pub is_active: bool,
}

/// Metadata stored alongside each job vector. The two sections of one job
/// share identical metadata except for `section` itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobMetadata {
    pub job_id: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub section: Section,
    pub job_class: JobClass,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub required_credentials: Vec<String>,
    #[serde(default)]
    pub subject_matter_codes: Vec<String>,
    #[serde(default)]
    pub acceptable_subject_codes: Vec<String>,
    #[serde(default)]
    pub subject_matter_strictness: Strictness,
    #[serde(default)]
    pub required_experience_years: u32,
    #[serde(default)]
    pub expertise_tier: ExpertiseTier,
    #[serde(default)]
    pub countries: Vec<String>,
    #[serde(default)]
    pub languages: Vec<String>,
}

impl JobMetadata {
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

    fn sample() -> JobMetadata {
        JobMetadata {
            job_id: "j1".to_string(),
            entity_type: "job".to_string(),
            section: Section::Domain,
            job_class: JobClass::Specialized,
            title: Some("Radiology reviewer".to_string()),
            required_credentials: vec!["MD".to_string()],
            subject_matter_codes: vec!["medical:radiology".to_string()],
            acceptable_subject_codes: vec!["medical:imaging".to_string()],
            subject_matter_strictness: Strictness::Moderate,
            required_experience_years: 5,
            expertise_tier: ExpertiseTier::Expert,
            countries: vec!["US".to_string()],
            languages: vec!["English".to_string()],
        }
    }

    #[test]
    fn test_metadata_map_round_trip() {
        let meta = sample();
        let map = meta.to_map();
        assert_eq!(map.get("type").and_then(Value::as_str), Some("job"));
        assert_eq!(map.get("section").and_then(Value::as_str), Some("domain"));
        assert_eq!(
            map.get("job_class").and_then(Value::as_str),
            Some("specialized")
        );

        let parsed = JobMetadata::from_map(&map).expect("round trip");
        assert_eq!(parsed.job_id, "j1");
        assert_eq!(parsed.subject_matter_codes, meta.subject_matter_codes);
        assert_eq!(parsed.required_experience_years, 5);
    }

    #[test]
    fn test_with_section_only_changes_section() {
        let domain = sample();
        let task = domain.with_section(Section::Task);
        assert_eq!(task.section, Section::Task);

        let mut domain_map = domain.to_map();
        let mut task_map = task.to_map();
        domain_map.remove("section");
        task_map.remove("section");
        assert_eq!(domain_map, task_map);
    }

    #[test]
    fn test_from_map_defaults_missing_fields() {
        let mut map = Map::new();
        map.insert("job_id".to_string(), Value::from("j2"));
        map.insert("type".to_string(), Value::from("job"));
        map.insert("section".to_string(), Value::from("task"));
        map.insert("job_class".to_string(), Value::from("generic"));

        let parsed = JobMetadata::from_map(&map).expect("defaults");
        assert!(parsed.subject_matter_codes.is_empty());
        assert_eq!(parsed.subject_matter_strictness, Strictness::Moderate);
        assert_eq!(parsed.expertise_tier, ExpertiseTier::Entry);
    }
}
