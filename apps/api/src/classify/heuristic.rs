//! Deterministic fallback classifier. Encodes the contractual rules:
//! professional credentials or regulated titles make a job specialized;
//! generic task vocabulary (or a non-English pure annotation task without
//! credentials) makes it generic. Always returns `confidence = 0.5`.

use async_trait::async_trait;

use crate::classify::{
    ClassificationSource, Classifier, JobClassification, JobRequirements, UserClassification,
};
use crate::models::job::{ExpertiseTier, JobClass, NormalizedJobPosting, Strictness};
use crate::models::user::NormalizedUserProfile;

pub const FALLBACK_CONFIDENCE: f64 = 0.5;

/// Professional credentials, matched as standalone tokens (period-tolerant,
/// so "M.D." matches "md").
const CREDENTIALS: &[&str] = &[
    "md", "phd", "jd", "pe", "cpa", "rn", "np", "pharmd", "dds", "dmd",
];

/// Regulated professional titles with the subject-matter code each implies.
const TITLES: &[(&str, &str)] = &[
    ("radiologist", "medical:radiology"),
    ("surgeon", "medical:surgery"),
    ("cardiologist", "medical:cardiology"),
    ("oncologist", "medical:oncology"),
    ("psychiatrist", "medical:psychiatry"),
    ("pathologist", "medical:pathology"),
    ("physician", "medical:general"),
    ("nurse practitioner", "medical:nursing"),
    ("pharmacist", "medical:pharmacy"),
    ("dentist", "medical:dentistry"),
    ("veterinarian", "medical:veterinary"),
    ("attorney", "legal:general"),
    ("lawyer", "legal:general"),
    ("paralegal", "legal:general"),
    ("accountant", "finance:accounting"),
    ("actuary", "finance:actuarial"),
];

/// Subject-matter code implied by a detected credential, where one exists.
const CREDENTIAL_CODES: &[(&str, &str)] = &[
    ("md", "medical:general"),
    ("jd", "legal:general"),
    ("cpa", "finance:accounting"),
    ("rn", "medical:nursing"),
    ("np", "medical:nursing"),
    ("pharmd", "medical:pharmacy"),
    ("dds", "medical:dentistry"),
    ("dmd", "medical:dentistry"),
    ("pe", "engineering:general"),
];

const GENERIC_TASK_TERMS: &[&str] = &[
    "bounding box",
    "tagging",
    "data entry",
    "entry-level",
    "entry level",
    "image annotation",
    "annotation",
    "labeling",
    "labelling",
    "transcription",
    "categorization",
    "moderation",
];

pub struct HeuristicClassifier;

impl HeuristicClassifier {
    fn job_text(job: &NormalizedJobPosting) -> String {
        let mut text = String::new();
        if let Some(title) = &job.title {
            text.push_str(title);
            text.push(' ');
        }
        text.push_str(&job.description);
        if let Some(instructions) = &job.instructions {
            text.push(' ');
            text.push_str(instructions);
        }
        text.to_lowercase()
    }
}

/// Splits text into lowercase alphanumeric tokens, dropping periods inside
/// words so "M.D." and "Ph.D." collapse to "md" and "phd".
fn tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '.'))
        .map(|t| t.replace('.', ""))
        .filter(|t| !t.is_empty())
        .collect()
}

pub fn detect_credentials(text: &str) -> Vec<String> {
    let tokens = tokens(text);
    CREDENTIALS
        .iter()
        .filter(|cred| tokens.iter().any(|t| t == *cred))
        .map(|cred| cred.to_uppercase())
        .collect()
}

pub fn detect_titles(text: &str) -> Vec<(&'static str, &'static str)> {
    let lower = text.to_lowercase();
    TITLES
        .iter()
        .filter(|(title, _)| lower.contains(title))
        .copied()
        .collect()
}

pub fn has_generic_task_vocabulary(text: &str) -> bool {
    let lower = text.to_lowercase();
    GENERIC_TASK_TERMS.iter().any(|term| lower.contains(term))
}

/// Extracts "N+ years" / "N years" style experience mentions; returns the
/// largest one found, 0 when none.
pub fn extract_experience_years(text: &str) -> u32 {
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut best = 0u32;
    for (i, word) in words.iter().enumerate() {
        let numeric: String = word
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if numeric.is_empty() {
            continue;
        }
        let Ok(value) = numeric.parse::<u32>() else {
            continue;
        };
        let window = words.iter().skip(i + 1).take(2);
        let mentions_years = window
            .map(|w| w.to_lowercase())
            .any(|w| w.starts_with("year"));
        if mentions_years && value > best && value < 80 {
            best = value;
        }
    }
    best
}

fn subject_codes_for(
    credentials: &[String],
    titles: &[(&'static str, &'static str)],
) -> Vec<String> {
    let mut codes: Vec<String> = Vec::new();
    for (_, code) in titles {
        if !codes.iter().any(|c| c == code) {
            codes.push((*code).to_string());
        }
    }
    for cred in credentials {
        let lower = cred.to_lowercase();
        if let Some((_, code)) = CREDENTIAL_CODES.iter().find(|(c, _)| *c == lower) {
            if !codes.iter().any(|c| c == code) {
                codes.push((*code).to_string());
            }
        }
    }
    codes
}

fn tier_for(specialized: bool, years: u32) -> ExpertiseTier {
    if specialized {
        if years >= 10 {
            ExpertiseTier::Specialist
        } else {
            ExpertiseTier::Expert
        }
    } else if years >= 2 {
        ExpertiseTier::Intermediate
    } else {
        ExpertiseTier::Entry
    }
}

fn is_non_english(languages: &[String]) -> bool {
    !languages.is_empty()
        && !languages
            .iter()
            .any(|l| l.eq_ignore_ascii_case("english"))
}

#[async_trait]
impl Classifier for HeuristicClassifier {
    async fn classify_job(&self, job: &NormalizedJobPosting) -> JobClassification {
        let text = Self::job_text(job);
        let credentials = detect_credentials(&text);
        let titles = detect_titles(&text);
        let generic_vocabulary = has_generic_task_vocabulary(&text);
        let years = extract_experience_years(&text);

        let (job_class, reasoning) = if !credentials.is_empty() {
            (
                JobClass::Specialized,
                format!("professional credentials detected: {}", credentials.join(", ")),
            )
        } else if !titles.is_empty() {
            let names: Vec<&str> = titles.iter().map(|(t, _)| *t).collect();
            (
                JobClass::Specialized,
                format!("regulated professional titles detected: {}", names.join(", ")),
            )
        } else if is_non_english(&job.languages) && generic_vocabulary {
            (
                JobClass::Generic,
                "non-English annotation task without credentials".to_string(),
            )
        } else if generic_vocabulary {
            (
                JobClass::Generic,
                "generic task vocabulary detected".to_string(),
            )
        } else {
            (
                JobClass::Generic,
                "no specialization signals detected".to_string(),
            )
        };

        let subject_matter_codes = if job_class == JobClass::Specialized {
            subject_codes_for(&credentials, &titles)
        } else {
            Vec::new()
        };

        JobClassification {
            job_class,
            confidence: FALLBACK_CONFIDENCE,
            requirements: JobRequirements {
                credentials,
                minimum_experience_years: years,
                subject_matter_codes,
                acceptable_subject_codes: Vec::new(),
                subject_matter_strictness: Strictness::Moderate,
                expertise_tier: tier_for(job_class == JobClass::Specialized, years),
                countries: job.countries.clone(),
                languages: job.languages.clone(),
            },
            reasoning,
            source: ClassificationSource::Fallback,
        }
    }

    async fn classify_user(&self, profile: &NormalizedUserProfile) -> UserClassification {
        let text = format!("{} {}", profile.summary, profile.skills.join(" "));
        let mut credentials = profile.credentials.clone();
        for detected in detect_credentials(&text) {
            if !credentials.iter().any(|c| c.eq_ignore_ascii_case(&detected)) {
                credentials.push(detected);
            }
        }
        let titles = detect_titles(&text);

        let mut subject_matter_codes = profile.subject_matter_codes.clone();
        if subject_matter_codes.is_empty() {
            subject_matter_codes = subject_codes_for(&credentials, &titles);
        }

        let years = profile
            .years_experience
            .max(extract_experience_years(&text));

        let has_labeling_experience =
            profile.has_labeling_experience || has_generic_task_vocabulary(&text);

        let specialized = !credentials.is_empty() || !titles.is_empty();

        UserClassification {
            expertise_tier: tier_for(specialized, years),
            credentials,
            subject_matter_codes,
            years_experience: years,
            has_labeling_experience,
            confidence: FALLBACK_CONFIDENCE,
            source: ClassificationSource::Fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(description: &str, languages: Vec<&str>) -> NormalizedJobPosting {
        NormalizedJobPosting {
            job_id: "j1".to_string(),
            title: None,
            description: description.to_string(),
            instructions: None,
            countries: vec![],
            languages: languages.into_iter().map(String::from).collect(),
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_credentials_imply_specialized() {
        let classification = HeuristicClassifier
            .classify_job(&job(
                "Review chest X-rays. M.D. required, 5+ years experience.",
                vec!["English"],
            ))
            .await;
        assert_eq!(classification.job_class, JobClass::Specialized);
        assert_eq!(classification.requirements.credentials, vec!["MD"]);
        assert_eq!(classification.requirements.minimum_experience_years, 5);
        assert_eq!(classification.confidence, FALLBACK_CONFIDENCE);
        assert_eq!(classification.source, ClassificationSource::Fallback);
    }

    #[tokio::test]
    async fn test_title_implies_specialized_with_code() {
        let classification = HeuristicClassifier
            .classify_job(&job(
                "We need an experienced radiologist to evaluate scans.",
                vec!["English"],
            ))
            .await;
        assert_eq!(classification.job_class, JobClass::Specialized);
        assert_eq!(
            classification.requirements.subject_matter_codes,
            vec!["medical:radiology"]
        );
    }

    #[tokio::test]
    async fn test_generic_vocabulary_implies_generic_without_codes() {
        let classification = HeuristicClassifier
            .classify_job(&job(
                "Draw bounding boxes around vehicles. Entry-level, no experience needed.",
                vec!["English"],
            ))
            .await;
        assert_eq!(classification.job_class, JobClass::Generic);
        assert!(classification.requirements.subject_matter_codes.is_empty());
        assert!(classification
            .requirements
            .acceptable_subject_codes
            .is_empty());
    }

    #[tokio::test]
    async fn test_non_english_annotation_is_generic() {
        let classification = HeuristicClassifier
            .classify_job(&job(
                "Audio transcription of customer calls.",
                vec!["Polish"],
            ))
            .await;
        assert_eq!(classification.job_class, JobClass::Generic);
        assert!(classification.reasoning.contains("non-English"));
    }

    #[tokio::test]
    async fn test_credentials_beat_generic_vocabulary() {
        let classification = HeuristicClassifier
            .classify_job(&job(
                "Annotation of pathology slides. MD or DO required.",
                vec!["English"],
            ))
            .await;
        assert_eq!(classification.job_class, JobClass::Specialized);
    }

    #[test]
    fn test_token_matching_avoids_substrings() {
        // "command" contains "md" but is not a credential mention.
        assert!(detect_credentials("run the command line").is_empty());
        assert_eq!(detect_credentials("MD preferred"), vec!["MD"]);
        assert_eq!(detect_credentials("Ph.D. in physics"), vec!["PHD"]);
    }

    #[test]
    fn test_experience_extraction() {
        assert_eq!(extract_experience_years("requires 7+ years of practice"), 7);
        assert_eq!(extract_experience_years("3 years experience"), 3);
        assert_eq!(extract_experience_years("over 12 full years"), 12);
        assert_eq!(extract_experience_years("established in 1999"), 0);
        assert_eq!(extract_experience_years("no experience needed"), 0);
    }

    #[tokio::test]
    async fn test_user_classification_merges_signals() {
        let profile = NormalizedUserProfile {
            user_id: "u1".to_string(),
            summary: "Registered nurse, RN, 6 years in oncology wards. Some labeling work."
                .to_string(),
            skills: vec!["triage".to_string()],
            credentials: vec![],
            subject_matter_codes: vec![],
            years_experience: 4,
            has_labeling_experience: false,
            languages: vec!["English".to_string()],
            country: None,
        };
        let classification = HeuristicClassifier.classify_user(&profile).await;
        assert!(classification.credentials.contains(&"RN".to_string()));
        assert_eq!(classification.years_experience, 6);
        assert!(classification.has_labeling_experience);
        assert_eq!(
            classification.subject_matter_codes,
            vec!["medical:nursing"]
        );
        assert_eq!(classification.expertise_tier, ExpertiseTier::Expert);
    }
}
