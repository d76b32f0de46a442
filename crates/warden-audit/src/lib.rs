//! Durable audit-event pipeline.
//!
//! Guarantees at-least-once delivery of [`warden_types::AuditEvent`]s to an
//! [`AuditSink`] without blocking the decision path indefinitely:
//!
//! ```text
//! log(event) ── append ──▶ spool file (audit_spool_<date>.json)
//!          └── enqueue ──▶ bounded queue ──▶ delivery worker ──▶ sink
//!                             ▲                    │ on failure
//!                             └── retry scheduler ◀┘ (failed queue)
//! ```
//!
//! Event state machine: `Created → Spooled → Queued → (Delivered →
//! Removed) | (DeliveryFailed → FailedQueued → Queued → …)`. The spool
//! entry is removed only after the sink confirms delivery, so a crash at
//! any point is recovered at startup by re-seeding the queue from disk.
//!
//! No transaction spans the spool and the queue: an event can exist on
//! disk but not in the queue (after append, before enqueue). Callers must
//! tolerate that ordering.

mod pipeline;
mod queue;
mod sink;
mod spool;

pub use pipeline::{AuditError, AuditPipeline, AuditPipelineConfig};
pub use queue::{BoundedQueue, PushResult};
pub use sink::{AuditSink, SinkError};
pub use spool::{AuditSpooler, SpoolError};
