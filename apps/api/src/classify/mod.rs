//! Job and user classification. The production classifier prompts the chat
//! model and falls back to a deterministic heuristic on any failure, so the
//! matching pipeline never blocks on the LLM.

pub mod heuristic;
pub mod llm;
pub mod prompts;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::job::{ExpertiseTier, JobClass, NormalizedJobPosting, Strictness};
use crate::models::user::NormalizedUserProfile;

pub use heuristic::HeuristicClassifier;
pub use llm::LlmClassifier;

/// Channel weights by job class: specialized jobs are matched almost
/// entirely on domain expertise, generic jobs mostly on task skills.
pub fn weight_profile(job_class: JobClass) -> (f64, f64) {
    match job_class {
        JobClass::Specialized => (0.85, 0.15),
        JobClass::Generic => (0.30, 0.70),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassificationSource {
    Llm,
    Fallback,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobRequirements {
    #[serde(default)]
    pub credentials: Vec<String>,
    #[serde(default)]
    pub minimum_experience_years: u32,
    #[serde(default)]
    pub subject_matter_codes: Vec<String>,
    #[serde(default)]
    pub acceptable_subject_codes: Vec<String>,
    #[serde(default)]
    pub subject_matter_strictness: Strictness,
    #[serde(default)]
    pub expertise_tier: ExpertiseTier,
    #[serde(default)]
    pub countries: Vec<String>,
    #[serde(default)]
    pub languages: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobClassification {
    pub job_class: JobClass,
    pub confidence: f64,
    pub requirements: JobRequirements,
    pub reasoning: String,
    pub source: ClassificationSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClassification {
    pub expertise_tier: ExpertiseTier,
    pub credentials: Vec<String>,
    pub subject_matter_codes: Vec<String>,
    pub years_experience: u32,
    pub has_labeling_experience: bool,
    pub confidence: f64,
    pub source: ClassificationSource,
}

/// Classification never fails: implementations degrade to the heuristic
/// rather than surfacing an error.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify_job(&self, job: &NormalizedJobPosting) -> JobClassification;
    async fn classify_user(&self, profile: &NormalizedUserProfile) -> UserClassification;
}

/// Enforces the classification contract regardless of where the record came
/// from: generic jobs carry no subject-matter codes, acceptable codes exist
/// only for specialized jobs, confidence stays in [0, 1], and empty
/// geo/language requirements inherit the posting's own values.
pub fn sanitize_job_classification(
    classification: &mut JobClassification,
    job: &NormalizedJobPosting,
) {
    if classification.job_class == JobClass::Generic {
        classification.requirements.subject_matter_codes.clear();
        classification.requirements.acceptable_subject_codes.clear();
    }
    if !classification.confidence.is_finite() {
        classification.confidence = 0.0;
    }
    classification.confidence = classification.confidence.clamp(0.0, 1.0);
    if classification.requirements.countries.is_empty() {
        classification.requirements.countries = job.countries.clone();
    }
    if classification.requirements.languages.is_empty() {
        classification.requirements.languages = job.languages.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> NormalizedJobPosting {
        NormalizedJobPosting {
            job_id: "j1".to_string(),
            title: None,
            description: "Label street signs".to_string(),
            instructions: None,
            countries: vec!["US".to_string()],
            languages: vec!["English".to_string()],
            is_active: true,
        }
    }

    #[test]
    fn test_weight_profile_by_class() {
        assert_eq!(weight_profile(JobClass::Specialized), (0.85, 0.15));
        assert_eq!(weight_profile(JobClass::Generic), (0.30, 0.70));
    }

    #[test]
    fn test_sanitize_clears_codes_on_generic() {
        let mut classification = JobClassification {
            job_class: JobClass::Generic,
            confidence: 0.9,
            requirements: JobRequirements {
                subject_matter_codes: vec!["medical:radiology".to_string()],
                acceptable_subject_codes: vec!["medical:imaging".to_string()],
                ..Default::default()
            },
            reasoning: String::new(),
            source: ClassificationSource::Llm,
        };
        sanitize_job_classification(&mut classification, &job());
        assert!(classification.requirements.subject_matter_codes.is_empty());
        assert!(classification.requirements.acceptable_subject_codes.is_empty());
    }

    #[test]
    fn test_sanitize_clamps_confidence_and_backfills_geo() {
        let mut classification = JobClassification {
            job_class: JobClass::Specialized,
            confidence: 3.2,
            requirements: JobRequirements::default(),
            reasoning: String::new(),
            source: ClassificationSource::Llm,
        };
        sanitize_job_classification(&mut classification, &job());
        assert_eq!(classification.confidence, 1.0);
        assert_eq!(classification.requirements.countries, vec!["US"]);
        assert_eq!(classification.requirements.languages, vec!["English"]);
    }

    #[test]
    fn test_sanitize_keeps_codes_on_specialized() {
        let mut classification = JobClassification {
            job_class: JobClass::Specialized,
            confidence: 0.8,
            requirements: JobRequirements {
                subject_matter_codes: vec!["legal:general".to_string()],
                ..Default::default()
            },
            reasoning: String::new(),
            source: ClassificationSource::Fallback,
        };
        sanitize_job_classification(&mut classification, &job());
        assert_eq!(
            classification.requirements.subject_matter_codes,
            vec!["legal:general"]
        );
    }
}
