//! Subject-matter semantic gate. For specialized jobs, decides whether a
//! candidate's subject codes are close enough to the job's required codes,
//! using cached specialty embeddings and a strictness-driven cosine floor.

use std::sync::Arc;

use dashmap::DashMap;

use crate::embedding::{dot, Embedder};
use crate::errors::AppError;
use crate::models::job::Strictness;

/// Cosine-similarity floor by strictness.
pub fn gate_threshold(strictness: Strictness) -> f64 {
    match strictness {
        Strictness::Strict => 0.80,
        Strictness::Moderate => 0.70,
        Strictness::Lenient => 0.60,
    }
}

/// Extracts the specialty part of a `domain:specialty` code. Codes without a
/// colon are treated as bare specialties.
pub fn specialty_of(code: &str) -> &str {
    match code.split_once(':') {
        Some((_, specialty)) => specialty.trim(),
        None => code.trim(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GateFailure {
    NoSubjectMatterCodes,
    LowSimilarity { best_pct: u32, threshold_pct: u32 },
    MissingSubjectMatter,
}

impl GateFailure {
    /// The `filter_reason` value persisted on the qualification record.
    pub fn filter_reason(&self) -> &'static str {
        match self {
            GateFailure::NoSubjectMatterCodes => "no_subject_matter_codes",
            GateFailure::LowSimilarity { .. } => "low_similarity",
            GateFailure::MissingSubjectMatter => "subject_matter_mismatch",
        }
    }

    pub fn describe(&self) -> String {
        match self {
            GateFailure::NoSubjectMatterCodes => "no subject matter codes".to_string(),
            GateFailure::LowSimilarity {
                best_pct,
                threshold_pct,
            } => format!("low_similarity ({best_pct}% < {threshold_pct}%)"),
            GateFailure::MissingSubjectMatter => "missing subject matter".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GateOutcome {
    pub passed: bool,
    pub best_similarity: f64,
    /// (user code, job code) of the closest pairing, when one was computed.
    pub best_pair: Option<(String, String)>,
    pub threshold: f64,
    pub failure: Option<GateFailure>,
}

/// Process-scoped gate. The specialty-embedding cache is grow-only and
/// concurrency-safe; first writer wins, duplicate embeds are tolerated.
pub struct SubjectMatterGate {
    embedder: Arc<dyn Embedder>,
    cache: DashMap<String, Arc<Vec<f32>>>,
}

impl SubjectMatterGate {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            cache: DashMap::new(),
        }
    }

    #[cfg(test)]
    pub fn cached_specialties(&self) -> usize {
        self.cache.len()
    }

    async fn specialty_vector(&self, specialty: &str) -> Result<Arc<Vec<f32>>, AppError> {
        let key = specialty.to_lowercase();
        if let Some(cached) = self.cache.get(&key) {
            return Ok(Arc::clone(&cached));
        }
        let prompt = format!("subject matter expertise: {key}");
        let vector = Arc::new(self.embedder.embed(&prompt).await?);
        let entry = self.cache.entry(key).or_insert(vector);
        Ok(Arc::clone(&entry))
    }

    /// Runs the gate. An acceptable-code exact match (case-insensitive)
    /// passes without touching the embedder.
    pub async fn evaluate(
        &self,
        user_codes: &[String],
        job_codes: &[String],
        acceptable_codes: &[String],
        strictness: Strictness,
    ) -> Result<GateOutcome, AppError> {
        let threshold = gate_threshold(strictness);

        if user_codes.is_empty() {
            return Ok(GateOutcome {
                passed: false,
                best_similarity: 0.0,
                best_pair: None,
                threshold,
                failure: Some(GateFailure::NoSubjectMatterCodes),
            });
        }

        let acceptable_hit = user_codes.iter().any(|user_code| {
            acceptable_codes
                .iter()
                .any(|acceptable| acceptable.eq_ignore_ascii_case(user_code))
        });
        if acceptable_hit {
            return Ok(GateOutcome {
                passed: true,
                best_similarity: 1.0,
                best_pair: None,
                threshold,
                failure: None,
            });
        }

        let mut best_similarity = f64::NEG_INFINITY;
        let mut best_pair: Option<(String, String)> = None;

        for user_code in user_codes {
            let user_vector = self.specialty_vector(specialty_of(user_code)).await?;
            for job_code in job_codes {
                let job_vector = self.specialty_vector(specialty_of(job_code)).await?;
                let similarity = dot(&user_vector, &job_vector);
                if similarity > best_similarity {
                    best_similarity = similarity;
                    best_pair = Some((user_code.clone(), job_code.clone()));
                }
            }
        }

        if best_similarity == f64::NEG_INFINITY {
            // Job had no codes to compare against.
            return Ok(GateOutcome {
                passed: false,
                best_similarity: 0.0,
                best_pair: None,
                threshold,
                failure: Some(GateFailure::MissingSubjectMatter),
            });
        }

        if best_similarity >= threshold {
            return Ok(GateOutcome {
                passed: true,
                best_similarity,
                best_pair,
                threshold,
                failure: None,
            });
        }

        let failure = if best_similarity > 0.0 {
            GateFailure::LowSimilarity {
                best_pct: (best_similarity * 100.0).round() as u32,
                threshold_pct: (threshold * 100.0).round() as u32,
            }
        } else {
            GateFailure::MissingSubjectMatter
        };

        Ok(GateOutcome {
            passed: false,
            best_similarity,
            best_pair,
            threshold,
            failure: Some(failure),
        })
    }
}
