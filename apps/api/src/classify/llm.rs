//! LLM-backed classifier. Prompts the chat model for strict JSON and falls
//! back to the deterministic heuristic on any failure so callers never see a
//! classification error.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::classify::prompts::{
    JOB_CLASSIFY_PROMPT_TEMPLATE, JOB_CLASSIFY_SYSTEM, USER_CLASSIFY_PROMPT_TEMPLATE,
    USER_CLASSIFY_SYSTEM,
};
use crate::classify::{
    sanitize_job_classification, ClassificationSource, Classifier, HeuristicClassifier,
    JobClassification, JobRequirements, UserClassification,
};
use crate::llm_client::LlmClient;
use crate::models::job::{ExpertiseTier, JobClass, NormalizedJobPosting};
use crate::models::user::NormalizedUserProfile;

#[derive(Debug, Deserialize)]
struct RawJobClassification {
    job_class: JobClass,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    requirements: JobRequirements,
}

#[derive(Debug, Deserialize)]
struct RawUserClassification {
    #[serde(default)]
    expertise_tier: ExpertiseTier,
    #[serde(default)]
    credentials: Vec<String>,
    #[serde(default)]
    subject_matter_codes: Vec<String>,
    #[serde(default)]
    years_experience: u32,
    #[serde(default)]
    has_labeling_experience: bool,
    #[serde(default)]
    confidence: f64,
}

pub struct LlmClassifier {
    llm: LlmClient,
    fallback: HeuristicClassifier,
}

impl LlmClassifier {
    pub fn new(llm: LlmClient) -> Self {
        Self {
            llm,
            fallback: HeuristicClassifier,
        }
    }
}

#[async_trait]
impl Classifier for LlmClassifier {
    async fn classify_job(&self, job: &NormalizedJobPosting) -> JobClassification {
        let job_json = serde_json::to_string_pretty(job).unwrap_or_default();
        let prompt = JOB_CLASSIFY_PROMPT_TEMPLATE.replace("{job_json}", &job_json);

        match self
            .llm
            .call_json::<RawJobClassification>(&prompt, JOB_CLASSIFY_SYSTEM)
            .await
        {
            Ok(raw) => {
                let mut classification = JobClassification {
                    job_class: raw.job_class,
                    confidence: raw.confidence,
                    requirements: raw.requirements,
                    reasoning: raw.reasoning,
                    source: ClassificationSource::Llm,
                };
                sanitize_job_classification(&mut classification, job);
                classification
            }
            Err(e) => {
                warn!(job_id = %job.job_id, "job classification fell back to heuristic: {e}");
                self.fallback.classify_job(job).await
            }
        }
    }

    async fn classify_user(&self, profile: &NormalizedUserProfile) -> UserClassification {
        let profile_json = serde_json::to_string_pretty(profile).unwrap_or_default();
        let prompt = USER_CLASSIFY_PROMPT_TEMPLATE.replace("{profile_json}", &profile_json);

        match self
            .llm
            .call_json::<RawUserClassification>(&prompt, USER_CLASSIFY_SYSTEM)
            .await
        {
            Ok(raw) => UserClassification {
                expertise_tier: raw.expertise_tier,
                credentials: raw.credentials,
                subject_matter_codes: raw.subject_matter_codes,
                years_experience: raw.years_experience,
                has_labeling_experience: raw.has_labeling_experience,
                confidence: if raw.confidence.is_finite() {
                    raw.confidence.clamp(0.0, 1.0)
                } else {
                    0.0
                },
                source: ClassificationSource::Llm,
            },
            Err(e) => {
                warn!(user_id = %profile.user_id, "user classification fell back to heuristic: {e}");
                self.fallback.classify_user(profile).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_job_classification_deserializes_with_defaults() {
        let raw: RawJobClassification =
            serde_json::from_str(r#"{"job_class": "generic"}"#).unwrap();
        assert_eq!(raw.job_class, JobClass::Generic);
        assert_eq!(raw.confidence, 0.0);
        assert!(raw.requirements.credentials.is_empty());
    }

    #[test]
    fn test_raw_job_classification_full_payload() {
        let raw: RawJobClassification = serde_json::from_str(
            r#"{
                "job_class": "specialized",
                "confidence": 0.92,
                "reasoning": "MD required",
                "requirements": {
                    "credentials": ["MD"],
                    "minimum_experience_years": 5,
                    "subject_matter_codes": ["medical:radiology"],
                    "acceptable_subject_codes": ["medical:imaging"],
                    "subject_matter_strictness": "strict",
                    "expertise_tier": "expert",
                    "countries": ["US"],
                    "languages": ["English"]
                }
            }"#,
        )
        .unwrap();
        assert_eq!(raw.job_class, JobClass::Specialized);
        assert_eq!(raw.requirements.subject_matter_codes, vec!["medical:radiology"]);
        assert_eq!(raw.requirements.minimum_experience_years, 5);
    }

    #[test]
    fn test_raw_user_classification_deserializes() {
        let raw: RawUserClassification = serde_json::from_str(
            r#"{"expertise_tier": "specialist", "credentials": ["JD"], "years_experience": 12, "has_labeling_experience": false, "confidence": 0.8}"#,
        )
        .unwrap();
        assert_eq!(raw.expertise_tier, ExpertiseTier::Specialist);
        assert_eq!(raw.credentials, vec!["JD"]);
        assert_eq!(raw.years_experience, 12);
    }
}
