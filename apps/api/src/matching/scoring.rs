//! Scoring engine: blended two-channel scores, deterministic ranking,
//! advisory auto-thresholds, and the pool-size-adaptive notify threshold.

use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::job::JobClass;

/// Candidate lists are processed in fixed-size chunks for `$in` queries.
/// Driven by the store's filter-argument limit; a tunable, not a semantic
/// constant.
pub const SCORE_CHUNK_SIZE: usize = 500;

/// Hard ceiling on the synchronous score API candidate list.
pub const MAX_SCORE_CANDIDATES: usize = 50_000;

const WEIGHT_EPSILON: f64 = 1e-9;

/// Advisory auto-threshold baselines (synchronous score API).
const AUTO_BASELINE_SPECIALIZED: f64 = 0.50;
const AUTO_BASELINE_GENERIC: f64 = 0.35;

/// Notify-pipeline baselines. Deliberately distinct from the advisory
/// baselines above; both families are independent constants.
const NOTIFY_BASELINE_SPECIALIZED: f64 = 0.35;
const NOTIFY_BASELINE_GENERIC: f64 = 0.25;

const PERCENTILE_TOP_FRACTION: f64 = 0.30;

/// Normalizes caller-supplied channel weights to sum to 1.
/// Non-finite or negative weights are rejected with 422.
pub fn normalize_weights(w_domain: f64, w_task: f64) -> Result<(f64, f64), AppError> {
    if !w_domain.is_finite() || !w_task.is_finite() {
        return Err(AppError::UnprocessableWeights(
            "weights must be finite numbers".to_string(),
        ));
    }
    if w_domain < 0.0 || w_task < 0.0 {
        return Err(AppError::UnprocessableWeights(
            "weights must be non-negative".to_string(),
        ));
    }
    let sum = (w_domain + w_task).max(WEIGHT_EPSILON);
    Ok((w_domain / sum, w_task / sum))
}

/// Blends channel similarities into a final score. A missing channel
/// contributes zero.
pub fn blend(
    domain_score: Option<f64>,
    task_score: Option<f64>,
    w_domain: f64,
    w_task: f64,
) -> f64 {
    w_domain * domain_score.unwrap_or(0.0) + w_task * task_score.unwrap_or(0.0)
}

/// Rounds to six decimal places, the precision of every score returned to
/// clients or persisted.
pub fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

/// Anything the engine can rank: a blended score, an optional domain score
/// for tie-breaking, and a stable id for the final tie-break.
pub trait Rankable {
    fn final_score(&self) -> f64;
    fn domain_score(&self) -> Option<f64>;
    fn tie_break_id(&self) -> &str;
}

/// Sorts by the ranking rule: final score descending, domain score
/// descending (missing ranks last), then lexicographic id ascending.
/// Positions after this sort are the dense 1-based ranks.
pub fn rank<T: Rankable>(items: &mut [T]) {
    items.sort_by(|a, b| {
        b.final_score()
            .partial_cmp(&a.final_score())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                let a_domain = a.domain_score().unwrap_or(f64::NEG_INFINITY);
                let b_domain = b.domain_score().unwrap_or(f64::NEG_INFINITY);
                b_domain
                    .partial_cmp(&a_domain)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.tie_break_id().cmp(b.tie_break_id()))
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdMethod {
    Minimum,
    Percentile,
}

/// Advisory notification cutoff for the synchronous score API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestedThreshold {
    pub value: f64,
    pub method: ThresholdMethod,
    pub min_threshold: f64,
    pub percentile_threshold: f64,
}

fn auto_baseline(job_class: JobClass) -> f64 {
    match job_class {
        JobClass::Specialized => AUTO_BASELINE_SPECIALIZED,
        JobClass::Generic => AUTO_BASELINE_GENERIC,
    }
}

/// Computes the advisory threshold: the larger of the class baseline and the
/// top-30% percentile score.
pub fn auto_threshold(final_scores: &[f64], job_class: JobClass) -> SuggestedThreshold {
    let baseline = auto_baseline(job_class);

    let mut sorted = final_scores.to_vec();
    sorted.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));

    let percentile = if sorted.is_empty() {
        0.0
    } else {
        let index = ((sorted.len() as f64) * PERCENTILE_TOP_FRACTION).floor() as usize;
        sorted[index.min(sorted.len() - 1)]
    };

    let (value, method) = if percentile > baseline {
        (percentile, ThresholdMethod::Percentile)
    } else {
        (baseline, ThresholdMethod::Minimum)
    };

    SuggestedThreshold {
        value: round6(value),
        method,
        min_threshold: baseline,
        percentile_threshold: round6(percentile),
    }
}

/// Notify-pipeline baseline by job class.
pub fn notify_baseline(job_class: JobClass) -> f64 {
    match job_class {
        JobClass::Specialized => NOTIFY_BASELINE_SPECIALIZED,
        JobClass::Generic => NOTIFY_BASELINE_GENERIC,
    }
}

/// Monotone multiplier relaxing the notify threshold for small candidate
/// pools, so niche markets still produce notifications.
pub fn pool_size_multiplier(pool_size: usize) -> f64 {
    if pool_size < 30 {
        0.60
    } else if pool_size < 100 {
        0.80
    } else {
        1.00
    }
}

/// Effective notify threshold for a pool of the given size.
pub fn notify_threshold(job_class: JobClass, pool_size: usize) -> f64 {
    notify_baseline(job_class) * pool_size_multiplier(pool_size)
}
