//! Gateway adapter step: a total function from the tolerated request shapes
//! (with their legacy aliases) to canonical normalized entities.

use serde::Deserialize;

use crate::errors::AppError;
use crate::models::job::NormalizedJobPosting;
use crate::models::user::NormalizedUserProfile;

#[derive(Debug, Clone, Deserialize)]
pub struct UserUpsertRequest {
    #[serde(alias = "id")]
    pub user_id: String,
    #[serde(default, alias = "bio", alias = "profile", alias = "about")]
    pub summary: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub credentials: Vec<String>,
    #[serde(default, alias = "specialties")]
    pub subject_matter_codes: Vec<String>,
    #[serde(default, alias = "experience_years")]
    pub years_experience: u32,
    #[serde(
        default,
        alias = "label_experience",
        alias = "has_labeling_experience"
    )]
    pub labeling_experience: bool,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobUpsertRequest {
    #[serde(alias = "id")]
    pub job_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, alias = "body")]
    pub description: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub countries: Vec<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default, alias = "active")]
    pub is_active: Option<bool>,
}

/// Canonicalizes a raw language list: split on commas, strip proficiency
/// annotations ("Slovak – Proficiency Level = Native" → "Slovak"), trim,
/// dedup case-insensitively while preserving the first spelling.
pub fn canonicalize_languages(raw: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for entry in raw {
        for part in entry.split(',') {
            let cleaned = strip_proficiency(part);
            let cleaned = cleaned.trim();
            if cleaned.is_empty() {
                continue;
            }
            if !out.iter().any(|l| l.eq_ignore_ascii_case(cleaned)) {
                out.push(cleaned.to_string());
            }
        }
    }
    out
}

fn strip_proficiency(part: &str) -> &str {
    let lower = part.to_lowercase();
    let cut = match lower.find("proficiency") {
        // Lowercasing can shift byte offsets for exotic scripts; only slice
        // on a valid boundary.
        Some(index) if part.is_char_boundary(index) => &part[..index],
        _ => part,
    };
    cut.trim_end_matches(|c: char| {
        c.is_whitespace() || matches!(c, '-' | '–' | '—' | '=' | ':' | '(')
    })
}

fn clean_list(values: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            continue;
        }
        if !out.iter().any(|v| v.eq_ignore_ascii_case(trimmed)) {
            out.push(trimmed.to_string());
        }
    }
    out
}

pub fn normalize_user(request: UserUpsertRequest) -> Result<NormalizedUserProfile, AppError> {
    let user_id = request.user_id.trim().to_string();
    if user_id.is_empty() {
        return Err(AppError::Validation("user_id is required".to_string()));
    }

    let summary = request
        .summary
        .as_deref()
        .unwrap_or("")
        .trim()
        .to_string();
    let skills = clean_list(&request.skills);
    if summary.is_empty() && skills.is_empty() {
        return Err(AppError::Validation(
            "profile is empty: provide a summary or skills".to_string(),
        ));
    }

    Ok(NormalizedUserProfile {
        user_id,
        summary,
        skills,
        credentials: clean_list(&request.credentials),
        subject_matter_codes: clean_list(&request.subject_matter_codes),
        years_experience: request.years_experience,
        has_labeling_experience: request.labeling_experience,
        languages: canonicalize_languages(&request.languages),
        country: request
            .country
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(String::from),
    })
}

pub fn normalize_job(request: JobUpsertRequest) -> Result<NormalizedJobPosting, AppError> {
    let job_id = request.job_id.trim().to_string();
    if job_id.is_empty() {
        return Err(AppError::Validation("job_id is required".to_string()));
    }

    let description = request
        .description
        .as_deref()
        .unwrap_or("")
        .trim()
        .to_string();
    if description.is_empty() {
        return Err(AppError::Validation(
            "description is required".to_string(),
        ));
    }

    Ok(NormalizedJobPosting {
        job_id,
        title: request
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from),
        description,
        instructions: request
            .instructions
            .as_deref()
            .map(str::trim)
            .filter(|i| !i.is_empty())
            .map(String::from),
        countries: clean_list(&request.countries),
        languages: canonicalize_languages(&request.languages),
        is_active: request.is_active.unwrap_or(true),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_canonicalize_strips_proficiency_annotations() {
        let raw = strings(&["Slovak – Proficiency Level = Native"]);
        assert_eq!(canonicalize_languages(&raw), vec!["Slovak"]);
    }

    #[test]
    fn test_canonicalize_splits_commas_and_dedups() {
        let raw = strings(&["Polish, English", "english", " Polish "]);
        assert_eq!(canonicalize_languages(&raw), vec!["Polish", "English"]);
    }

    #[test]
    fn test_canonicalize_preserves_first_case() {
        let raw = strings(&["SLOVAK", "slovak"]);
        assert_eq!(canonicalize_languages(&raw), vec!["SLOVAK"]);
    }

    #[test]
    fn test_normalize_user_rejects_empty_profile() {
        let request = UserUpsertRequest {
            user_id: "u1".to_string(),
            summary: Some("   ".to_string()),
            skills: vec![],
            credentials: vec![],
            subject_matter_codes: vec![],
            years_experience: 0,
            labeling_experience: false,
            languages: vec![],
            country: None,
        };
        assert!(matches!(
            normalize_user(request),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_normalize_user_accepts_label_experience_alias() {
        let request: UserUpsertRequest = serde_json::from_str(
            r#"{"user_id": "u1", "bio": "Annotator", "label_experience": true}"#,
        )
        .unwrap();
        let profile = normalize_user(request).unwrap();
        assert!(profile.has_labeling_experience);
        assert_eq!(profile.summary, "Annotator");
    }

    #[test]
    fn test_normalize_job_requires_description() {
        let request: JobUpsertRequest =
            serde_json::from_str(r#"{"job_id": "j1", "title": "T"}"#).unwrap();
        assert!(matches!(
            normalize_job(request),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_normalize_job_defaults_active_and_cleans_lists() {
        let request: JobUpsertRequest = serde_json::from_str(
            r#"{
                "id": "j1",
                "description": " Label images ",
                "countries": ["US", "us", " "],
                "languages": ["English, Polish"]
            }"#,
        )
        .unwrap();
        let job = normalize_job(request).unwrap();
        assert_eq!(job.job_id, "j1");
        assert!(job.is_active);
        assert_eq!(job.description, "Label images");
        assert_eq!(job.countries, vec!["US"]);
        assert_eq!(job.languages, vec!["English", "Polish"]);
    }
}
