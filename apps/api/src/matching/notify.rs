//! Notify pipeline: job upsert → candidate retrieval → task-score
//! enrichment → pool-adaptive threshold → subject-matter gate → safety cap
//! → qualification persistence → audit.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::alerts::MatchAlertContext;
use crate::audit::AuditEvent;
use crate::classify::weight_profile;
use crate::errors::AppError;
use crate::ingest::normalize::{normalize_job, JobUpsertRequest};
use crate::ingest::{index_job, IndexedJob};
use crate::matching::candidates::{retrieve_candidates, Candidate};
use crate::matching::scoring::{notify_threshold, rank, round6};
use crate::matching::subject_gate::{gate_threshold, GateFailure};
use crate::models::job::{JobClass, Strictness};
use crate::models::qualification::QualificationRecord;
use crate::qualifications::StoreResultsOptions;
use crate::state::AppState;

pub const NOTIFIED_VIA_JOB_POST: &str = "job_post";

#[derive(Debug, Deserialize)]
pub struct NotifyRequest {
    #[serde(flatten)]
    pub job: JobUpsertRequest,
    #[serde(default)]
    pub available_countries: Option<Vec<String>>,
    #[serde(default)]
    pub available_languages: Option<Vec<String>>,
    #[serde(default)]
    pub max_notifications: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SubjectMatterFilterSummary {
    pub required: Vec<String>,
    pub acceptable: Vec<String>,
    pub strictness: Strictness,
    pub threshold: f64,
    pub filtered_count: usize,
    pub passed_count: usize,
}

#[derive(Debug, Serialize)]
pub struct ScoreStats {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Serialize)]
pub struct NotifyResponse {
    pub status: &'static str,
    pub job_id: String,
    pub job_class: JobClass,
    pub notify_user_ids: Vec<String>,
    pub total_candidates: usize,
    pub total_above_threshold: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_matter_filter: Option<SubjectMatterFilterSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_stats: Option<ScoreStats>,
    pub elapsed_ms: u64,
}

/// Runs the full notify contract for a newly posted (or edited) job.
pub async fn notify(
    state: &AppState,
    request: NotifyRequest,
    request_id: Option<String>,
) -> Result<NotifyResponse, AppError> {
    let started = Instant::now();
    let max_notifications = request
        .max_notifications
        .unwrap_or(state.config.max_notifications_default);

    // Normalize, classify, build and embed both capsules, upsert vectors.
    let job = normalize_job(request.job)?;
    let indexed = index_job(state, job).await?;
    let job_class = indexed.classification.job_class;

    // Authoritative job row.
    state
        .qualifications
        .ensure_job(
            &indexed.job.job_id,
            indexed.job.title.as_deref(),
            Some(indexed.job.is_active),
        )
        .await?;

    // Candidate retrieval plus sequential task enrichment.
    let weights = weight_profile(job_class);
    let candidates = retrieve_candidates(
        state,
        &indexed.domain_embedding,
        &indexed.task_embedding,
        request.available_countries.as_deref(),
        request.available_languages.as_deref(),
        weights,
    )
    .await?;
    let total_candidates = candidates.len();

    if candidates.is_empty() {
        let response = NotifyResponse {
            status: "ok",
            job_id: indexed.job.job_id.clone(),
            job_class,
            notify_user_ids: vec![],
            total_candidates: 0,
            total_above_threshold: 0,
            subject_matter_filter: None,
            score_stats: None,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        audit_notify(state, &indexed, &request_id, &response, &[], None);
        state.alerts.review_match_outcome(&MatchAlertContext {
            job_id: indexed.job.job_id.clone(),
            results_count: 0,
            count_above_threshold: 0,
            pool_size: 0,
            missing_vector_count: 0,
            classification_confidence: indexed.classification.confidence,
        });
        return Ok(response);
    }

    // Pool-adaptive threshold.
    let threshold = round6(notify_threshold(job_class, total_candidates));
    let (above, below): (Vec<Candidate>, Vec<Candidate>) = candidates
        .into_iter()
        .partition(|c| c.final_score >= threshold);

    // Subject-matter gate, only for specialized jobs with required codes.
    let job_codes = &indexed.metadata.subject_matter_codes;
    let gate_applies = job_class == JobClass::Specialized && !job_codes.is_empty();
    let mut qualified: Vec<Candidate> = Vec::new();
    let mut gate_failed: Vec<(Candidate, GateFailure)> = Vec::new();
    if gate_applies {
        for candidate in above {
            let outcome = state
                .gate
                .evaluate(
                    &candidate.subject_matter_codes,
                    job_codes,
                    &indexed.metadata.acceptable_subject_codes,
                    indexed.metadata.subject_matter_strictness,
                )
                .await?;
            if outcome.passed {
                qualified.push(candidate);
            } else {
                let failure = outcome
                    .failure
                    .unwrap_or(GateFailure::MissingSubjectMatter);
                gate_failed.push((candidate, failure));
            }
        }
    } else {
        qualified = above;
    }

    // Rank and apply the safety cap.
    rank(&mut qualified);
    let notify_user_ids: Vec<String> = qualified
        .iter()
        .take(max_notifications)
        .map(|c| c.user_id.clone())
        .collect();
    let total_above_threshold = qualified.len();

    // One record per scored user. Reason assignment order: below_threshold →
    // gate reason → max_cap; notified users carry none.
    let mut records: Vec<QualificationRecord> =
        Vec::with_capacity(qualified.len() + gate_failed.len() + below.len());
    for (index, candidate) in qualified.iter().enumerate() {
        let filter_reason = if index >= max_notifications {
            Some("max_cap".to_string())
        } else {
            None
        };
        records.push(record_for(candidate, true, threshold, filter_reason));
    }
    for (candidate, failure) in &gate_failed {
        records.push(record_for(
            candidate,
            false,
            threshold,
            Some(failure.filter_reason().to_string()),
        ));
    }
    for candidate in &below {
        records.push(record_for(
            candidate,
            false,
            threshold,
            Some("below_threshold".to_string()),
        ));
    }

    let subject_matter_filter = if gate_applies {
        Some(SubjectMatterFilterSummary {
            required: job_codes.clone(),
            acceptable: indexed.metadata.acceptable_subject_codes.clone(),
            strictness: indexed.metadata.subject_matter_strictness,
            threshold: gate_threshold(indexed.metadata.subject_matter_strictness),
            filtered_count: gate_failed.len(),
            passed_count: total_above_threshold,
        })
    } else {
        None
    };

    let missing_task_vectors = records
        .iter()
        .filter(|r| r.task_score.is_none())
        .count();
    let stats = score_stats(&records);

    state
        .qualifications
        .store_results(
            &indexed.job.job_id,
            &records,
            StoreResultsOptions {
                mark_notified: &notify_user_ids,
                notified_via: Some(NOTIFIED_VIA_JOB_POST),
                job_title: indexed.job.title.as_deref(),
            },
        )
        .await?;

    let response = NotifyResponse {
        status: "ok",
        job_id: indexed.job.job_id.clone(),
        job_class,
        notify_user_ids,
        total_candidates,
        total_above_threshold,
        subject_matter_filter,
        score_stats: stats,
        elapsed_ms: started.elapsed().as_millis() as u64,
    };

    // Best-effort audit and alerting.
    audit_notify(
        state,
        &indexed,
        &request_id,
        &response,
        &records,
        Some(threshold),
    );
    state.alerts.review_match_outcome(&MatchAlertContext {
        job_id: indexed.job.job_id.clone(),
        results_count: response.notify_user_ids.len(),
        count_above_threshold: response.total_above_threshold,
        pool_size: total_candidates,
        missing_vector_count: missing_task_vectors,
        classification_confidence: indexed.classification.confidence,
    });

    Ok(response)
}

fn record_for(
    candidate: &Candidate,
    qualifies: bool,
    threshold: f64,
    filter_reason: Option<String>,
) -> QualificationRecord {
    QualificationRecord {
        user_id: candidate.user_id.clone(),
        qualifies,
        final_score: candidate.final_score,
        domain_score: Some(round6(candidate.domain_score)),
        task_score: candidate.task_score.map(round6),
        threshold_used: threshold,
        filter_reason,
    }
}

fn score_stats(records: &[QualificationRecord]) -> Option<ScoreStats> {
    if records.is_empty() {
        return None;
    }
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for record in records {
        min = min.min(record.final_score);
        max = max.max(record.final_score);
    }
    Some(ScoreStats {
        min: round6(min),
        max: round6(max),
    })
}

fn audit_notify(
    state: &AppState,
    indexed: &IndexedJob,
    request_id: &Option<String>,
    response: &NotifyResponse,
    records: &[QualificationRecord],
    threshold: Option<f64>,
) {
    let mut event = AuditEvent::new("notify")
        .job_id(indexed.job.job_id.clone())
        .payload(json!({
            "job_class": indexed.classification.job_class,
            "classification_source": indexed.classification.source,
            "classification_confidence": indexed.classification.confidence,
            "total_candidates": response.total_candidates,
            "total_above_threshold": response.total_above_threshold,
            "notify_user_ids": response.notify_user_ids,
            "threshold": threshold,
            "per_user": records,
        }));
    if let Some(request_id) = request_id {
        event = event.request_id(request_id.clone());
    }
    state.audit.emit(event);
}
