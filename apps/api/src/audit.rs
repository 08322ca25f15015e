//! Fire-and-forget audit sink. Events are enqueued non-blockingly onto a
//! bounded channel and written to `match_audit` by a background worker.
//! Queue saturation drops the event (logged); the hot path is never
//! backpressured, and worker failures never reach the client.

use serde_json::Value;
use sqlx::PgPool;
use tokio::sync::mpsc;
use tracing::{debug, warn};

const AUDIT_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub event_type: &'static str,
    pub request_id: Option<String>,
    pub job_id: Option<String>,
    pub user_id: Option<String>,
    pub payload: Value,
}

impl AuditEvent {
    pub fn new(event_type: &'static str) -> Self {
        Self {
            event_type,
            request_id: None,
            job_id: None,
            user_id: None,
            payload: Value::Null,
        }
    }

    pub fn request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }
}

#[derive(Clone)]
pub struct AuditSink {
    tx: Option<mpsc::Sender<AuditEvent>>,
}

impl AuditSink {
    /// No-op sink for deployments without a database.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Starts the background writer and returns the sending half.
    pub fn start(pool: PgPool) -> Self {
        let (tx, mut rx) = mpsc::channel::<AuditEvent>(AUDIT_QUEUE_CAPACITY);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let result = sqlx::query(
                    r#"
                    INSERT INTO match_audit (request_id, event_type, job_id, user_id, payload)
                    VALUES ($1, $2, $3, $4, $5)
                    "#,
                )
                .bind(&event.request_id)
                .bind(event.event_type)
                .bind(&event.job_id)
                .bind(&event.user_id)
                .bind(&event.payload)
                .execute(&pool)
                .await;

                if let Err(e) = result {
                    warn!(event_type = event.event_type, "audit write failed: {e}");
                }
            }
        });
        Self { tx: Some(tx) }
    }

    /// Enqueues an event without blocking. Dropped (and logged) when the
    /// queue is full or the sink is disabled.
    pub fn emit(&self, event: AuditEvent) {
        let Some(tx) = &self.tx else {
            debug!(event_type = event.event_type, "audit disabled, event dropped");
            return;
        };
        if let Err(e) = tx.try_send(event) {
            warn!("audit queue saturated, event dropped: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_builder_sets_fields() {
        let event = AuditEvent::new("notify")
            .request_id("r1")
            .job_id("j1")
            .payload(json!({"total": 3}));
        assert_eq!(event.event_type, "notify");
        assert_eq!(event.request_id.as_deref(), Some("r1"));
        assert_eq!(event.job_id.as_deref(), Some("j1"));
        assert!(event.user_id.is_none());
        assert_eq!(event.payload["total"], 3);
    }

    #[test]
    fn test_disabled_sink_swallows_events() {
        let sink = AuditSink::disabled();
        // Must not panic or block.
        sink.emit(AuditEvent::new("notify"));
    }
}
