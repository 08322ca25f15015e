//! Synchronous blended scoring: score an arbitrary candidate list for a job,
//! or a list of jobs for a user, with caller-supplied or auto-derived
//! channel weights and a full ranked, auditable result set.

use std::collections::HashMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::classify::weight_profile;
use crate::embedding::dot;
use crate::errors::AppError;
use crate::matching::scoring::{
    auto_threshold, blend, normalize_weights, rank, round6, Rankable, ThresholdMethod,
    MAX_SCORE_CANDIDATES, SCORE_CHUNK_SIZE,
};
use crate::models::job::JobClass;
use crate::models::{job_vector_id, user_vector_id, Section};
use crate::state::AppState;
use crate::vector_store::{VectorQuery, VectorRecord};

#[derive(Debug, Deserialize)]
pub struct ScoreUsersForJobRequest {
    pub job_id: String,
    pub candidate_user_ids: Vec<String>,
    #[serde(default)]
    pub w_domain: Option<f64>,
    #[serde(default)]
    pub w_task: Option<f64>,
    #[serde(default)]
    pub auto_weights: Option<bool>,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub threshold: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserScore {
    pub user_id: String,
    pub s_domain: Option<f64>,
    pub s_task: Option<f64>,
    #[serde(rename = "final")]
    pub final_score: f64,
    pub rank: usize,
}

impl Rankable for UserScore {
    fn final_score(&self) -> f64 {
        self.final_score
    }
    fn domain_score(&self) -> Option<f64> {
        self.s_domain
    }
    fn tie_break_id(&self) -> &str {
        &self.user_id
    }
}

#[derive(Debug, Serialize)]
pub struct MissingVectors {
    pub domain: Vec<String>,
    pub task: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SuggestedThresholdBlock {
    pub value: f64,
    pub method: ThresholdMethod,
    pub min_threshold: f64,
    pub percentile_threshold: f64,
    pub count_gte_suggested: usize,
}

#[derive(Debug, Serialize)]
pub struct WeightsUsed {
    pub w_domain: f64,
    pub w_task: f64,
    pub source: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ScoreUsersForJobResponse {
    pub status: &'static str,
    pub job_id: String,
    pub job_class: JobClass,
    pub weights: WeightsUsed,
    pub results: Vec<UserScore>,
    pub missing_vectors: MissingVectors,
    pub suggested_threshold: SuggestedThresholdBlock,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count_gte_threshold: Option<usize>,
    pub elapsed_ms: u64,
}

fn job_class_of(metadata: &serde_json::Map<String, Value>) -> JobClass {
    match metadata.get("job_class").and_then(Value::as_str) {
        Some("specialized") => JobClass::Specialized,
        _ => JobClass::Generic,
    }
}

fn dedup_preserving_order(ids: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

/// Scores one channel for the candidate set: sequential 500-chunk `$in`
/// queries against the job's channel vector. Returns user_id → similarity.
async fn score_channel(
    state: &AppState,
    vector: &[f32],
    section: Section,
    candidate_ids: &[String],
    top_k: Option<usize>,
) -> Result<HashMap<String, f64>, AppError> {
    let phase = match section {
        Section::Domain => "query.domain",
        Section::Task => "query.task",
    };
    let mut scores = HashMap::with_capacity(candidate_ids.len());
    for chunk in candidate_ids.chunks(SCORE_CHUNK_SIZE) {
        let per_chunk_k = top_k.unwrap_or(chunk.len()).min(chunk.len());
        let matches = state
            .store
            .query(
                state.users_namespace(),
                VectorQuery {
                    vector: vector.to_vec(),
                    top_k: per_chunk_k,
                    filter: Some(json!({
                        "type": "user",
                        "section": section.as_str(),
                        "user_id": {"$in": chunk},
                    })),
                },
            )
            .await
            .map_err(|e| AppError::store(phase, e.to_string()))?;
        for m in matches {
            if let Some(user_id) = m.metadata.get("user_id").and_then(Value::as_str) {
                scores.insert(user_id.to_string(), m.score);
            }
        }
    }
    Ok(scores)
}

pub async fn score_users_for_job(
    state: &AppState,
    request: ScoreUsersForJobRequest,
) -> Result<ScoreUsersForJobResponse, AppError> {
    let started = Instant::now();

    if request.candidate_user_ids.len() > MAX_SCORE_CANDIDATES {
        return Err(AppError::Validation(format!(
            "candidate_user_ids exceeds the {MAX_SCORE_CANDIDATES} limit"
        )));
    }
    let candidate_ids = dedup_preserving_order(&request.candidate_user_ids);

    // Weight validation happens before any store traffic.
    let auto = request
        .auto_weights
        .unwrap_or(request.w_domain.is_none() && request.w_task.is_none());
    let provided = if auto {
        None
    } else {
        Some(normalize_weights(
            request.w_domain.unwrap_or(0.0),
            request.w_task.unwrap_or(0.0),
        )?)
    };

    // Job vectors (both channels required).
    let domain_id = job_vector_id(&request.job_id, Section::Domain);
    let task_id = job_vector_id(&request.job_id, Section::Task);
    let fetched = state
        .store
        .fetch(
            state.jobs_namespace(),
            &[domain_id.clone(), task_id.clone()],
        )
        .await
        .map_err(|e| AppError::store("fetch.job", e.to_string()))?;
    let missing_job = |id: &str| {
        AppError::JobVectorsMissing(format!("job {} vector {id} not found", request.job_id))
    };
    let domain = fetched.get(&domain_id).ok_or_else(|| missing_job(&domain_id))?;
    let task = fetched.get(&task_id).ok_or_else(|| missing_job(&task_id))?;

    let job_class = job_class_of(&domain.metadata);
    let ((w_domain, w_task), weight_source) = match provided {
        Some(weights) => (weights, "provided"),
        None => (weight_profile(job_class), "auto"),
    };

    // The two channels run concurrently; chunks inside each are sequential.
    let (domain_scores, task_scores) = tokio::join!(
        score_channel(state, &domain.values, Section::Domain, &candidate_ids, request.top_k),
        score_channel(state, &task.values, Section::Task, &candidate_ids, request.top_k),
    );
    let domain_scores = domain_scores?;
    let task_scores = task_scores?;

    let mut missing_vectors = MissingVectors {
        domain: Vec::new(),
        task: Vec::new(),
    };
    let mut results: Vec<UserScore> = Vec::with_capacity(candidate_ids.len());
    for user_id in &candidate_ids {
        let s_domain = domain_scores.get(user_id).copied();
        let s_task = task_scores.get(user_id).copied();
        if s_domain.is_none() {
            missing_vectors.domain.push(user_id.clone());
        }
        if s_task.is_none() {
            missing_vectors.task.push(user_id.clone());
        }
        results.push(UserScore {
            user_id: user_id.clone(),
            s_domain: s_domain.map(round6),
            s_task: s_task.map(round6),
            final_score: round6(blend(s_domain, s_task, w_domain, w_task)),
            rank: 0,
        });
    }

    rank(&mut results);
    for (index, row) in results.iter_mut().enumerate() {
        row.rank = index + 1;
    }

    let finals: Vec<f64> = results.iter().map(|r| r.final_score).collect();
    let suggested = auto_threshold(&finals, job_class);
    let count_gte_suggested = finals.iter().filter(|f| **f >= suggested.value).count();
    let count_gte_threshold = request
        .threshold
        .map(|threshold| finals.iter().filter(|f| **f >= threshold).count());

    Ok(ScoreUsersForJobResponse {
        status: "ok",
        job_id: request.job_id,
        job_class,
        weights: WeightsUsed {
            w_domain: round6(w_domain),
            w_task: round6(w_task),
            source: weight_source,
        },
        results,
        missing_vectors,
        suggested_threshold: SuggestedThresholdBlock {
            value: suggested.value,
            method: suggested.method,
            min_threshold: suggested.min_threshold,
            percentile_threshold: suggested.percentile_threshold,
            count_gte_suggested,
        },
        count_gte_threshold,
        elapsed_ms: started.elapsed().as_millis() as u64,
    })
}

#[derive(Debug, Deserialize)]
pub struct ScoreJobsForUserRequest {
    pub user_id: String,
    pub job_ids: Vec<String>,
    #[serde(default)]
    pub w_domain: Option<f64>,
    #[serde(default)]
    pub w_task: Option<f64>,
    #[serde(default = "default_true")]
    pub auto_weights: bool,
    #[serde(default)]
    pub top_k: Option<usize>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize)]
pub struct JobScore {
    pub job_id: String,
    pub job_class: JobClass,
    pub s_domain: Option<f64>,
    pub s_task: Option<f64>,
    #[serde(rename = "final")]
    pub final_score: f64,
    pub rank: usize,
}

impl Rankable for JobScore {
    fn final_score(&self) -> f64 {
        self.final_score
    }
    fn domain_score(&self) -> Option<f64> {
        self.s_domain
    }
    fn tie_break_id(&self) -> &str {
        &self.job_id
    }
}

#[derive(Debug, Serialize)]
pub struct ScoreJobsForUserResponse {
    pub status: &'static str,
    pub user_id: String,
    pub results: Vec<JobScore>,
    pub missing_jobs: Vec<String>,
    pub elapsed_ms: u64,
}

pub async fn score_jobs_for_user(
    state: &AppState,
    request: ScoreJobsForUserRequest,
) -> Result<ScoreJobsForUserResponse, AppError> {
    let started = Instant::now();

    if request.job_ids.len() > MAX_SCORE_CANDIDATES {
        return Err(AppError::Validation(format!(
            "job_ids exceeds the {MAX_SCORE_CANDIDATES} limit"
        )));
    }
    let job_ids = dedup_preserving_order(&request.job_ids);

    let provided = if request.auto_weights {
        None
    } else {
        Some(normalize_weights(
            request.w_domain.unwrap_or(0.0),
            request.w_task.unwrap_or(0.0),
        )?)
    };

    // User vectors (both channels required; 404 otherwise).
    let user_domain_id = user_vector_id(&request.user_id, Section::Domain);
    let user_task_id = user_vector_id(&request.user_id, Section::Task);
    let fetched = state
        .store
        .fetch(
            state.users_namespace(),
            &[user_domain_id.clone(), user_task_id.clone()],
        )
        .await
        .map_err(|e| AppError::store("fetch.user", e.to_string()))?;
    let missing_user = |id: &str| {
        AppError::UserVectorsMissing(format!(
            "user {} vector {id} not found",
            request.user_id
        ))
    };
    let user_domain = fetched
        .get(&user_domain_id)
        .ok_or_else(|| missing_user(&user_domain_id))?
        .clone();
    let user_task = fetched
        .get(&user_task_id)
        .ok_or_else(|| missing_user(&user_task_id))?
        .clone();

    // All job vector pairs, fetched in chunks.
    let all_ids: Vec<String> = job_ids
        .iter()
        .flat_map(|id| {
            [
                job_vector_id(id, Section::Domain),
                job_vector_id(id, Section::Task),
            ]
        })
        .collect();
    let mut job_vectors: HashMap<String, VectorRecord> = HashMap::with_capacity(all_ids.len());
    for chunk in all_ids.chunks(SCORE_CHUNK_SIZE) {
        let fetched = state
            .store
            .fetch(state.jobs_namespace(), chunk)
            .await
            .map_err(|e| AppError::store("fetch.job", e.to_string()))?;
        job_vectors.extend(fetched);
    }

    let mut results: Vec<JobScore> = Vec::new();
    let mut missing_jobs: Vec<String> = Vec::new();
    for job_id in &job_ids {
        let domain = job_vectors.get(&job_vector_id(job_id, Section::Domain));
        let task = job_vectors.get(&job_vector_id(job_id, Section::Task));
        let Some(domain) = domain else {
            missing_jobs.push(job_id.clone());
            continue;
        };

        let job_class = job_class_of(&domain.metadata);
        let (w_domain, w_task) = match provided {
            Some(weights) => weights,
            None => weight_profile(job_class),
        };

        let s_domain = Some(dot(&user_domain.values, &domain.values));
        let s_task = task.map(|t| dot(&user_task.values, &t.values));
        results.push(JobScore {
            job_id: job_id.clone(),
            job_class,
            s_domain: s_domain.map(round6),
            s_task: s_task.map(round6),
            final_score: round6(blend(s_domain, s_task, w_domain, w_task)),
            rank: 0,
        });
    }

    rank(&mut results);
    for (index, row) in results.iter_mut().enumerate() {
        row.rank = index + 1;
    }
    if let Some(top_k) = request.top_k {
        results.truncate(top_k);
    }

    Ok(ScoreJobsForUserResponse {
        status: "ok",
        user_id: request.user_id,
        results,
        missing_jobs,
        elapsed_ms: started.elapsed().as_millis() as u64,
    })
}
