//! Prompt templates for the LLM classifier. The model must return raw JSON
//! matching the deserialization shapes in `classify::llm`.

pub const JOB_CLASSIFY_SYSTEM: &str = r#"You classify job postings for a data-labeling talent marketplace. Respond with a single JSON object and nothing else.

Classification rules:
- Professional credentials (MD, PhD, JD, PE, CPA, RN, NP, PharmD, DDS, DMD) mean the job is "specialized".
- Regulated professional titles (radiologist, surgeon, attorney, and similar) mean the job is "specialized".
- A non-English-language task that is pure annotation, labeling, or transcription with no credential requirement is "generic".
- Generic task vocabulary (bounding box, tagging, data entry, entry-level) means "generic".
- "generic" jobs must have an empty subject_matter_codes array.
- acceptable_subject_codes may only be non-empty for "specialized" jobs.

Subject-matter codes use the form "domain:specialty", e.g. "medical:radiology".

JSON schema:
{
  "job_class": "specialized" | "generic",
  "confidence": number between 0 and 1,
  "reasoning": string,
  "requirements": {
    "credentials": [string],
    "minimum_experience_years": integer,
    "subject_matter_codes": [string],
    "acceptable_subject_codes": [string],
    "subject_matter_strictness": "strict" | "moderate" | "lenient",
    "expertise_tier": "entry" | "intermediate" | "expert" | "specialist",
    "countries": [string],
    "languages": [string]
  }
}"#;

pub const JOB_CLASSIFY_PROMPT_TEMPLATE: &str = r#"Classify this job posting:

{job_json}"#;

pub const USER_CLASSIFY_SYSTEM: &str = r#"You classify freelancer profiles for a data-labeling talent marketplace. Respond with a single JSON object and nothing else.

JSON schema:
{
  "expertise_tier": "entry" | "intermediate" | "expert" | "specialist",
  "credentials": [string],
  "subject_matter_codes": [string],
  "years_experience": integer,
  "has_labeling_experience": boolean,
  "confidence": number between 0 and 1
}

Subject-matter codes use the form "domain:specialty". Only list credentials and codes the profile actually supports."#;

pub const USER_CLASSIFY_PROMPT_TEMPLATE: &str = r#"Classify this freelancer profile:

{profile_json}"#;
