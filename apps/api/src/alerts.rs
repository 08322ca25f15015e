//! Slack alerting. Posts are fire-and-forget: a spawned task with a short
//! timeout whose failure is logged and swallowed.

use reqwest::Client;
use serde_json::json;
use tracing::{debug, warn};

const LOW_RESULTS_FLOOR: usize = 5;
const HIGH_MATCH_CEILING: usize = 200;
const MISSING_VECTOR_RATE_CEILING: f64 = 0.5;
const MISSING_VECTOR_MIN_POOL: usize = 10;
const LOW_CONFIDENCE_FLOOR: f64 = 0.7;

/// Match-outcome signals checked against the alert thresholds.
#[derive(Debug, Clone)]
pub struct MatchAlertContext {
    pub job_id: String,
    pub results_count: usize,
    pub count_above_threshold: usize,
    pub pool_size: usize,
    pub missing_vector_count: usize,
    pub classification_confidence: f64,
}

/// Pure threshold evaluation, separated from delivery for testability.
pub fn alert_messages(ctx: &MatchAlertContext) -> Vec<String> {
    let mut messages = Vec::new();

    if ctx.results_count < LOW_RESULTS_FLOOR {
        messages.push(format!(
            "Low match count for job {}: {} result(s)",
            ctx.job_id, ctx.results_count
        ));
    }
    if ctx.count_above_threshold > HIGH_MATCH_CEILING {
        messages.push(format!(
            "High match count for job {}: {} users above threshold",
            ctx.job_id, ctx.count_above_threshold
        ));
    }
    if ctx.pool_size > MISSING_VECTOR_MIN_POOL {
        let rate = ctx.missing_vector_count as f64 / ctx.pool_size as f64;
        if rate > MISSING_VECTOR_RATE_CEILING {
            messages.push(format!(
                "High missing-vector rate for job {}: {:.0}% of {} candidates",
                ctx.job_id,
                rate * 100.0,
                ctx.pool_size
            ));
        }
    }
    if ctx.classification_confidence < LOW_CONFIDENCE_FLOOR {
        messages.push(format!(
            "Low classification confidence for job {}: {:.2}",
            ctx.job_id, ctx.classification_confidence
        ));
    }

    messages
}

#[derive(Clone)]
pub struct SlackAlerter {
    client: Client,
    webhook_url: Option<String>,
}

impl SlackAlerter {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .expect("Failed to build HTTP client"),
            webhook_url,
        }
    }

    /// Posts one message, detached from the request. Never blocks or fails
    /// the caller.
    pub fn post(&self, text: String) {
        let Some(url) = self.webhook_url.clone() else {
            debug!("Slack alerts disabled, dropping: {text}");
            return;
        };
        let client = self.client.clone();
        tokio::spawn(async move {
            let result = client.post(&url).json(&json!({ "text": text })).send().await;
            match result {
                Ok(response) if !response.status().is_success() => {
                    warn!("Slack webhook returned {}", response.status());
                }
                Err(e) => warn!("Slack webhook post failed: {e}"),
                _ => {}
            }
        });
    }

    /// Evaluates the match-outcome thresholds and posts each triggered alert.
    pub fn review_match_outcome(&self, ctx: &MatchAlertContext) {
        for message in alert_messages(ctx) {
            self.post(message);
        }
    }
}
