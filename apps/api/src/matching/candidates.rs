//! Candidate retrieval shared by the notify and re-notify pipelines: a
//! broad domain-channel query, then task-channel enrichment in fixed-size
//! chunks, merged into blended per-user scores.

use serde_json::{json, Value};

use crate::errors::AppError;
use crate::matching::scoring::{blend, round6, Rankable, SCORE_CHUNK_SIZE};
use crate::models::entity_id_from_vector_id;
use crate::state::AppState;
use crate::vector_store::VectorQuery;

/// Upper bound on the domain-channel candidate pool.
pub const CANDIDATE_POOL_TOP_K: usize = 10_000;

/// One candidate scored across both channels.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub user_id: String,
    pub domain_score: f64,
    pub task_score: Option<f64>,
    pub final_score: f64,
    pub subject_matter_codes: Vec<String>,
}

impl Rankable for Candidate {
    fn final_score(&self) -> f64 {
        self.final_score
    }
    fn domain_score(&self) -> Option<f64> {
        Some(self.domain_score)
    }
    fn tie_break_id(&self) -> &str {
        &self.user_id
    }
}

/// The `$in` retrieval filter. Omitted dimensions stay unconstrained.
pub fn candidate_filter(countries: Option<&[String]>, languages: Option<&[String]>) -> Value {
    let mut filter = json!({"type": "user", "section": "domain"});
    if let Some(countries) = countries {
        if !countries.is_empty() {
            filter["country"] = json!({"$in": countries});
        }
    }
    if let Some(languages) = languages {
        if !languages.is_empty() {
            filter["languages"] = json!({"$in": languages});
        }
    }
    filter
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// Retrieves the domain-channel pool, enriches it with task scores
/// (sequential 500-chunks against the store's `$in` limit), and blends.
pub async fn retrieve_candidates(
    state: &AppState,
    domain_vector: &[f32],
    task_vector: &[f32],
    countries: Option<&[String]>,
    languages: Option<&[String]>,
    weights: (f64, f64),
) -> Result<Vec<Candidate>, AppError> {
    let filter = candidate_filter(countries, languages);

    let domain_matches = state
        .store
        .query(
            state.users_namespace(),
            VectorQuery {
                vector: domain_vector.to_vec(),
                top_k: CANDIDATE_POOL_TOP_K,
                filter: Some(filter),
            },
        )
        .await
        .map_err(|e| AppError::store("query.domain", e.to_string()))?;

    let mut candidates: Vec<Candidate> = Vec::with_capacity(domain_matches.len());
    for m in &domain_matches {
        let user_id = m
            .metadata
            .get("user_id")
            .and_then(Value::as_str)
            .map(String::from)
            .or_else(|| entity_id_from_vector_id(&m.id).map(String::from));
        let Some(user_id) = user_id else {
            continue;
        };
        candidates.push(Candidate {
            user_id,
            domain_score: m.score,
            task_score: None,
            final_score: 0.0,
            subject_matter_codes: string_list(m.metadata.get("subject_matter_codes")),
        });
    }

    if candidates.is_empty() {
        return Ok(candidates);
    }

    let user_ids: Vec<String> = candidates.iter().map(|c| c.user_id.clone()).collect();
    let mut task_scores = std::collections::HashMap::new();
    for chunk in user_ids.chunks(SCORE_CHUNK_SIZE) {
        let task_matches = state
            .store
            .query(
                state.users_namespace(),
                VectorQuery {
                    vector: task_vector.to_vec(),
                    top_k: chunk.len(),
                    filter: Some(json!({
                        "type": "user",
                        "section": "task",
                        "user_id": {"$in": chunk},
                    })),
                },
            )
            .await
            .map_err(|e| AppError::store("query.task", e.to_string()))?;
        for m in task_matches {
            let user_id = m
                .metadata
                .get("user_id")
                .and_then(Value::as_str)
                .map(String::from)
                .or_else(|| entity_id_from_vector_id(&m.id).map(String::from));
            if let Some(user_id) = user_id {
                task_scores.insert(user_id, m.score);
            }
        }
    }

    let (w_domain, w_task) = weights;
    for candidate in &mut candidates {
        candidate.task_score = task_scores.get(&candidate.user_id).copied();
        candidate.final_score = round6(blend(
            Some(candidate.domain_score),
            candidate.task_score,
            w_domain,
            w_task,
        ));
    }

    Ok(candidates)
}
