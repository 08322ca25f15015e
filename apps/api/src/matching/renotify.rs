//! Re-notify pipeline: replays candidate retrieval and scoring for an
//! already-indexed job and emits only the newly-qualifying delta. The
//! evaluate variant persists recomputed qualifications without marking
//! anyone notified.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::audit::AuditEvent;
use crate::classify::weight_profile;
use crate::errors::AppError;
use crate::matching::candidates::{retrieve_candidates, Candidate};
use crate::matching::scoring::{notify_threshold, rank, round6};
use crate::models::job::{JobClass, JobMetadata};
use crate::models::qualification::QualificationRecord;
use crate::models::{job_vector_id, Section};
use crate::qualifications::StoreResultsOptions;
use crate::state::AppState;

pub const NOTIFIED_VIA_JOB_EDIT: &str = "job_edit";

#[derive(Debug, Default, Deserialize)]
pub struct ReNotifyRequest {
    #[serde(default)]
    pub countries: Option<Vec<String>>,
    #[serde(default)]
    pub languages: Option<Vec<String>>,
    #[serde(default)]
    pub max_notifications: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ReNotifyResponse {
    pub status: &'static str,
    pub job_id: String,
    pub job_class: JobClass,
    pub newly_qualified_user_ids: Vec<String>,
    pub total_candidates: usize,
    pub total_qualified: usize,
    pub previously_notified: usize,
    pub elapsed_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct EvaluateResponse {
    pub status: &'static str,
    pub job_id: String,
    pub job_class: JobClass,
    pub total_candidates: usize,
    pub total_qualified: usize,
    pub elapsed_ms: u64,
}

struct Replay {
    metadata: JobMetadata,
    /// Ranked candidates, every one scored and thresholded.
    candidates: Vec<Candidate>,
    threshold: f64,
}

/// Fetches the stored job vectors and replays retrieval + scoring with the
/// request's geo/language overrides (stored metadata otherwise).
async fn replay(
    state: &AppState,
    job_id: &str,
    countries: Option<&[String]>,
    languages: Option<&[String]>,
) -> Result<Replay, AppError> {
    let domain_id = job_vector_id(job_id, Section::Domain);
    let task_id = job_vector_id(job_id, Section::Task);
    let ids = vec![domain_id.clone(), task_id.clone()];

    let fetched = state
        .store
        .fetch(state.jobs_namespace(), &ids)
        .await
        .map_err(|e| AppError::store("fetch.job", e.to_string()))?;

    let domain = fetched
        .get(&domain_id)
        .ok_or_else(|| AppError::JobNotFound(job_id.to_string()))?;
    let task = fetched
        .get(&task_id)
        .ok_or_else(|| AppError::JobNotFound(job_id.to_string()))?;

    let metadata = JobMetadata::from_map(&domain.metadata)
        .ok_or_else(|| AppError::JobNotFound(job_id.to_string()))?;

    let countries = match countries {
        Some(countries) => Some(countries.to_vec()),
        None if !metadata.countries.is_empty() => Some(metadata.countries.clone()),
        None => None,
    };
    let languages = match languages {
        Some(languages) => Some(languages.to_vec()),
        None if !metadata.languages.is_empty() => Some(metadata.languages.clone()),
        None => None,
    };

    let weights = weight_profile(metadata.job_class);
    let mut candidates = retrieve_candidates(
        state,
        &domain.values,
        &task.values,
        countries.as_deref(),
        languages.as_deref(),
        weights,
    )
    .await?;
    rank(&mut candidates);

    let threshold = round6(notify_threshold(metadata.job_class, candidates.len()));

    Ok(Replay {
        metadata,
        candidates,
        threshold,
    })
}

fn records_for(replay: &Replay) -> Vec<QualificationRecord> {
    replay
        .candidates
        .iter()
        .map(|candidate| {
            let qualifies = candidate.final_score >= replay.threshold;
            QualificationRecord {
                user_id: candidate.user_id.clone(),
                qualifies,
                final_score: candidate.final_score,
                domain_score: Some(round6(candidate.domain_score)),
                task_score: candidate.task_score.map(round6),
                threshold_used: replay.threshold,
                filter_reason: if qualifies {
                    None
                } else {
                    Some("below_threshold".to_string())
                },
            }
        })
        .collect()
}

/// Re-evaluates the qualification set after a job edit. Previously notified
/// users never reappear in the delta, even if they still qualify.
pub async fn re_notify(
    state: &AppState,
    job_id: &str,
    request: ReNotifyRequest,
    request_id: Option<String>,
) -> Result<ReNotifyResponse, AppError> {
    let started = Instant::now();
    let max_notifications = request
        .max_notifications
        .unwrap_or(state.config.max_notifications_default);

    let replay = replay(
        state,
        job_id,
        request.countries.as_deref(),
        request.languages.as_deref(),
    )
    .await?;

    let previously_notified = state.qualifications.notified_user_ids(job_id).await?;

    let mut records = records_for(&replay);
    let total_qualified = records.iter().filter(|r| r.qualifies).count();

    // Delta = qualifying users with no prior notification, in rank order,
    // safety-capped. Qualifiers squeezed out by the cap keep a max_cap mark.
    let mut newly_qualified_user_ids: Vec<String> = Vec::new();
    for record in records.iter_mut().filter(|r| r.qualifies) {
        if previously_notified.contains(&record.user_id) {
            continue;
        }
        if newly_qualified_user_ids.len() < max_notifications {
            newly_qualified_user_ids.push(record.user_id.clone());
        } else {
            record.filter_reason = Some("max_cap".to_string());
        }
    }

    state
        .qualifications
        .store_results(
            job_id,
            &records,
            StoreResultsOptions {
                mark_notified: &newly_qualified_user_ids,
                notified_via: Some(NOTIFIED_VIA_JOB_EDIT),
                job_title: replay.metadata.title.as_deref(),
            },
        )
        .await?;

    let response = ReNotifyResponse {
        status: "ok",
        job_id: job_id.to_string(),
        job_class: replay.metadata.job_class,
        newly_qualified_user_ids,
        total_candidates: replay.candidates.len(),
        total_qualified,
        previously_notified: previously_notified.len(),
        elapsed_ms: started.elapsed().as_millis() as u64,
    };

    let mut event = AuditEvent::new("re_notify")
        .job_id(job_id.to_string())
        .payload(json!({
            "total_qualified": response.total_qualified,
            "previously_notified": response.previously_notified,
            "newly_qualified": response.newly_qualified_user_ids,
            "elapsed_ms": response.elapsed_ms,
        }));
    if let Some(request_id) = request_id {
        event = event.request_id(request_id);
    }
    state.audit.emit(event);

    Ok(response)
}

/// Recomputes and persists qualifications without any notification
/// bookkeeping.
pub async fn evaluate(
    state: &AppState,
    job_id: &str,
    request: ReNotifyRequest,
    request_id: Option<String>,
) -> Result<EvaluateResponse, AppError> {
    let started = Instant::now();

    let replay = replay(
        state,
        job_id,
        request.countries.as_deref(),
        request.languages.as_deref(),
    )
    .await?;

    let records = records_for(&replay);
    let total_qualified = records.iter().filter(|r| r.qualifies).count();

    state
        .qualifications
        .store_results(
            job_id,
            &records,
            StoreResultsOptions {
                mark_notified: &[],
                notified_via: None,
                job_title: replay.metadata.title.as_deref(),
            },
        )
        .await?;

    let response = EvaluateResponse {
        status: "ok",
        job_id: job_id.to_string(),
        job_class: replay.metadata.job_class,
        total_candidates: replay.candidates.len(),
        total_qualified,
        elapsed_ms: started.elapsed().as_millis() as u64,
    };

    let mut event = AuditEvent::new("evaluate")
        .job_id(job_id.to_string())
        .payload(json!({
            "total_candidates": response.total_candidates,
            "total_qualified": response.total_qualified,
        }));
    if let Some(request_id) = request_id {
        event = event.request_id(request_id);
    }
    state.audit.emit(event);

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::normalize::JobUpsertRequest;
    use crate::matching::notify::{notify, NotifyRequest};
    use crate::models::job::ExpertiseTier;
    use crate::models::user::UserMetadata;
    use crate::models::user_vector_id;
    use crate::test_support::{test_state, StubClassifier, StubEmbedder, TEST_DIMENSION};
    use crate::vector_store::VectorRecord;

    async fn seed_user(state: &crate::state::AppState, user_id: &str, similarity: f32) {
        let meta = UserMetadata {
            user_id: user_id.to_string(),
            entity_type: "user".to_string(),
            section: Section::Domain,
            expertise_tier: ExpertiseTier::Intermediate,
            credentials: vec![],
            subject_matter_codes: vec![],
            years_experience: 2,
            has_labeling_experience: true,
            languages: vec!["English".to_string()],
            country: Some("US".to_string()),
        };
        let values = vec![
            similarity,
            (1.0f32 - similarity * similarity).max(0.0).sqrt(),
            0.0,
            0.0,
        ];
        state
            .store
            .upsert(
                Some("users"),
                vec![
                    VectorRecord {
                        id: user_vector_id(user_id, Section::Domain),
                        values: values.clone(),
                        metadata: meta.to_map(),
                    },
                    VectorRecord {
                        id: user_vector_id(user_id, Section::Task),
                        values,
                        metadata: meta.with_section(Section::Task).to_map(),
                    },
                ],
            )
            .await
            .unwrap();
    }

    fn notify_request(job_id: &str) -> NotifyRequest {
        NotifyRequest {
            job: JobUpsertRequest {
                job_id: job_id.to_string(),
                title: Some("Test job".to_string()),
                description: Some("Tag images of storefronts".to_string()),
                instructions: None,
                countries: vec![],
                languages: vec![],
                is_active: Some(true),
            },
            available_countries: None,
            available_languages: None,
            max_notifications: Some(10),
        }
    }

    fn axis_state() -> crate::state::AppState {
        test_state(
            StubEmbedder::new(TEST_DIMENSION).with_default_axis(),
            StubClassifier::generic(),
        )
    }

    #[tokio::test]
    async fn test_re_notify_unknown_job_is_404() {
        let state = axis_state();
        let result = re_notify(&state, "ghost", ReNotifyRequest::default(), None).await;
        assert!(matches!(result, Err(AppError::JobNotFound(_))));
    }

    #[tokio::test]
    async fn test_re_notify_emits_only_the_delta() {
        let state = axis_state();
        seed_user(&state, "a", 0.9).await;
        seed_user(&state, "b", 0.8).await;

        let first = notify(&state, notify_request("j1"), None).await.unwrap();
        assert_eq!(first.notify_user_ids, vec!["a", "b"]);

        // A new qualifier appears after the job edit.
        seed_user(&state, "c", 0.85).await;

        let second = re_notify(&state, "j1", ReNotifyRequest::default(), None)
            .await
            .unwrap();
        assert_eq!(second.newly_qualified_user_ids, vec!["c"]);
        assert_eq!(second.previously_notified, 2);
        assert_eq!(second.total_qualified, 3);

        let rows = state
            .qualifications
            .qualifications("j1", false, 100, 0)
            .await
            .unwrap();
        let c = rows.iter().find(|r| r.user_id == "c").unwrap();
        assert_eq!(c.notified_via.as_deref(), Some(NOTIFIED_VIA_JOB_EDIT));
        // Stickiness: a's original job_post stamp survives the rewrite.
        let a = rows.iter().find(|r| r.user_id == "a").unwrap();
        assert_eq!(a.notified_via.as_deref(), Some("job_post"));
    }

    #[tokio::test]
    async fn test_re_notify_previously_notified_never_reappear() {
        let state = axis_state();
        seed_user(&state, "a", 0.9).await;
        notify(&state, notify_request("j1"), None).await.unwrap();

        // No change: the delta is empty even though "a" still qualifies.
        let second = re_notify(&state, "j1", ReNotifyRequest::default(), None)
            .await
            .unwrap();
        assert!(second.newly_qualified_user_ids.is_empty());
        assert_eq!(second.previously_notified, 1);
        assert_eq!(second.total_qualified, 1);
    }

    #[tokio::test]
    async fn test_evaluate_marks_nobody() {
        let state = axis_state();
        seed_user(&state, "a", 0.9).await;

        // Index the job without notifying anyone first.
        let indexed_request = notify_request("j1");
        let job = crate::ingest::normalize::normalize_job(indexed_request.job).unwrap();
        crate::ingest::index_job(&state, job).await.unwrap();

        let response = evaluate(&state, "j1", ReNotifyRequest::default(), None)
            .await
            .unwrap();
        assert_eq!(response.total_qualified, 1);

        let rows = state
            .qualifications
            .qualifications("j1", false, 100, 0)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].notified_at.is_none());
        assert!(rows[0].qualifies);
    }

    #[tokio::test]
    async fn test_re_notify_delta_respects_safety_cap() {
        let state = axis_state();
        seed_user(&state, "a", 0.95).await;
        seed_user(&state, "b", 0.90).await;
        seed_user(&state, "c", 0.85).await;

        let job = crate::ingest::normalize::normalize_job(notify_request("j1").job).unwrap();
        crate::ingest::index_job(&state, job).await.unwrap();

        let request = ReNotifyRequest {
            countries: None,
            languages: None,
            max_notifications: Some(2),
        };
        let response = re_notify(&state, "j1", request, None).await.unwrap();
        assert_eq!(response.newly_qualified_user_ids, vec!["a", "b"]);
        assert_eq!(response.total_qualified, 3);

        let rows = state
            .qualifications
            .qualifications("j1", false, 100, 0)
            .await
            .unwrap();
        let capped = rows.iter().find(|r| r.user_id == "c").unwrap();
        assert_eq!(capped.filter_reason.as_deref(), Some("max_cap"));
        assert!(capped.notified_at.is_none());
    }
}
