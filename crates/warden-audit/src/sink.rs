//! The delivery sink the pipeline pushes confirmed events to.

use warden_types::AuditEvent;

/// Failure to deliver an event to the sink.
///
/// Never surfaced to the original request path; failed events go to the
/// retry scheduler instead.
#[derive(Debug, thiserror::Error)]
#[error("audit sink failure: {0}")]
pub struct SinkError(pub String);

/// Downstream destination for audit events (SIEM, log service, ...).
///
/// `push` must be idempotent-tolerant on the receiving side: the pipeline
/// guarantees at-least-once delivery, so a retried event may arrive twice.
pub trait AuditSink: Send + Sync {
    fn push(&self, event: &AuditEvent) -> Result<(), SinkError>;
}
