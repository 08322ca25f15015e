//! Capsule builder: two short texts per entity, one describing subject-matter
//! expertise (domain channel), one describing task/labeling skills (task
//! channel). Output is deterministic for a given input so re-indexing is
//! idempotent.

use crate::classify::{JobClassification, UserClassification};
use crate::models::job::{JobMetadata, NormalizedJobPosting};
use crate::models::user::{NormalizedUserProfile, UserMetadata};
use crate::models::Section;

pub fn build_job_capsules(
    job: &NormalizedJobPosting,
    classification: &JobClassification,
) -> (String, String) {
    let requirements = &classification.requirements;

    let mut domain = String::new();
    if let Some(title) = &job.title {
        domain.push_str(&format!("Job: {title}. "));
    }
    domain.push_str(&job.description);
    if !requirements.subject_matter_codes.is_empty() {
        domain.push_str(&format!(
            " Subject matter: {}.",
            requirements.subject_matter_codes.join(", ")
        ));
    }
    if !requirements.credentials.is_empty() {
        domain.push_str(&format!(
            " Required credentials: {}.",
            requirements.credentials.join(", ")
        ));
    }
    if requirements.minimum_experience_years > 0 {
        domain.push_str(&format!(
            " Minimum experience: {} years.",
            requirements.minimum_experience_years
        ));
    }

    let mut task = String::new();
    task.push_str(&format!(
        "Task type: {} data work. ",
        classification.job_class
    ));
    task.push_str(&job.description);
    if let Some(instructions) = &job.instructions {
        task.push(' ');
        task.push_str(instructions);
    }
    if !job.languages.is_empty() {
        task.push_str(&format!(" Languages: {}.", job.languages.join(", ")));
    }

    (domain.trim().to_string(), task.trim().to_string())
}

pub fn build_user_capsules(
    profile: &NormalizedUserProfile,
    classification: &UserClassification,
) -> (String, String) {
    let mut domain = String::new();
    domain.push_str(&profile.summary);
    if !classification.subject_matter_codes.is_empty() {
        domain.push_str(&format!(
            " Subject matter expertise: {}.",
            classification.subject_matter_codes.join(", ")
        ));
    }
    if !classification.credentials.is_empty() {
        domain.push_str(&format!(
            " Credentials: {}.",
            classification.credentials.join(", ")
        ));
    }
    if classification.years_experience > 0 {
        domain.push_str(&format!(
            " {} years of experience.",
            classification.years_experience
        ));
    }

    let mut task = String::new();
    if !profile.skills.is_empty() {
        task.push_str(&format!("Skills: {}. ", profile.skills.join(", ")));
    }
    if classification.has_labeling_experience {
        task.push_str("Experienced with data labeling and annotation work. ");
    }
    task.push_str(&profile.summary);
    if !profile.languages.is_empty() {
        task.push_str(&format!(" Languages: {}.", profile.languages.join(", ")));
    }

    (domain.trim().to_string(), task.trim().to_string())
}

/// Domain-section metadata for a job; the task section is derived via
/// `with_section` so the non-section fields stay identical.
pub fn job_metadata(
    job: &NormalizedJobPosting,
    classification: &JobClassification,
) -> JobMetadata {
    let requirements = &classification.requirements;
    JobMetadata {
        job_id: job.job_id.clone(),
        entity_type: "job".to_string(),
        section: Section::Domain,
        job_class: classification.job_class,
        title: job.title.clone(),
        required_credentials: requirements.credentials.clone(),
        subject_matter_codes: requirements.subject_matter_codes.clone(),
        acceptable_subject_codes: requirements.acceptable_subject_codes.clone(),
        subject_matter_strictness: requirements.subject_matter_strictness,
        required_experience_years: requirements.minimum_experience_years,
        expertise_tier: requirements.expertise_tier,
        countries: requirements.countries.clone(),
        languages: requirements.languages.clone(),
    }
}

pub fn user_metadata(
    profile: &NormalizedUserProfile,
    classification: &UserClassification,
) -> UserMetadata {
    UserMetadata {
        user_id: profile.user_id.clone(),
        entity_type: "user".to_string(),
        section: Section::Domain,
        expertise_tier: classification.expertise_tier,
        credentials: classification.credentials.clone(),
        subject_matter_codes: classification.subject_matter_codes.clone(),
        years_experience: classification.years_experience,
        has_labeling_experience: classification.has_labeling_experience,
        languages: profile.languages.clone(),
        country: profile.country.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{ClassificationSource, JobRequirements};
    use crate::models::job::{ExpertiseTier, JobClass, Strictness};

    fn job() -> NormalizedJobPosting {
        NormalizedJobPosting {
            job_id: "j1".to_string(),
            title: Some("Radiology QA".to_string()),
            description: "Review chest X-ray annotations.".to_string(),
            instructions: Some("Flag mislabeled nodules.".to_string()),
            countries: vec!["US".to_string()],
            languages: vec!["English".to_string()],
            is_active: true,
        }
    }

    fn classification() -> JobClassification {
        JobClassification {
            job_class: JobClass::Specialized,
            confidence: 0.9,
            requirements: JobRequirements {
                credentials: vec!["MD".to_string()],
                minimum_experience_years: 5,
                subject_matter_codes: vec!["medical:radiology".to_string()],
                acceptable_subject_codes: vec![],
                subject_matter_strictness: Strictness::Moderate,
                expertise_tier: ExpertiseTier::Expert,
                countries: vec!["US".to_string()],
                languages: vec!["English".to_string()],
            },
            reasoning: String::new(),
            source: ClassificationSource::Llm,
        }
    }

    #[test]
    fn test_job_capsules_are_deterministic() {
        let (domain_a, task_a) = build_job_capsules(&job(), &classification());
        let (domain_b, task_b) = build_job_capsules(&job(), &classification());
        assert_eq!(domain_a, domain_b);
        assert_eq!(task_a, task_b);
    }

    #[test]
    fn test_job_capsules_separate_channels() {
        let (domain, task) = build_job_capsules(&job(), &classification());
        assert!(domain.contains("medical:radiology"));
        assert!(domain.contains("MD"));
        assert!(task.contains("Flag mislabeled nodules."));
        assert!(task.contains("Languages: English."));
        assert!(!task.contains("medical:radiology"));
    }

    #[test]
    fn test_user_capsules_reflect_classification() {
        let profile = NormalizedUserProfile {
            user_id: "u1".to_string(),
            summary: "Radiologist with hospital experience.".to_string(),
            skills: vec!["DICOM review".to_string()],
            credentials: vec![],
            subject_matter_codes: vec![],
            years_experience: 0,
            has_labeling_experience: true,
            languages: vec!["English".to_string()],
            country: Some("US".to_string()),
        };
        let classification = UserClassification {
            expertise_tier: ExpertiseTier::Expert,
            credentials: vec!["MD".to_string()],
            subject_matter_codes: vec!["medical:radiology".to_string()],
            years_experience: 8,
            has_labeling_experience: true,
            confidence: 0.9,
            source: ClassificationSource::Llm,
        };
        let (domain, task) = build_user_capsules(&profile, &classification);
        assert!(domain.contains("medical:radiology"));
        assert!(domain.contains("8 years"));
        assert!(task.contains("DICOM review"));
        assert!(task.contains("labeling"));
    }

    #[test]
    fn test_metadata_sections_share_non_section_fields() {
        let meta = job_metadata(&job(), &classification());
        let task_meta = meta.with_section(Section::Task);
        assert_eq!(meta.job_id, task_meta.job_id);
        assert_eq!(meta.subject_matter_codes, task_meta.subject_matter_codes);
        assert_eq!(meta.section, Section::Domain);
        assert_eq!(task_meta.section, Section::Task);
    }
}
