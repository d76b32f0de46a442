//! # Warden
//!
//! Runtime authorization and audit layer for AI application traffic.
//!
//! Warden sits between an application gateway and the model: every prompt,
//! enriched prompt, and reply passes through one decision, one masking
//! step, and one durable audit record.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                            Shield                              │
//! │  ┌─────────┐   ┌──────────┐   ┌─────────┐   ┌───────────────┐  │
//! │  │ Scanner │ → │ Decision │ → │ Masking │ → │ Audit pipeline│  │
//! │  │ (ports) │   │  engine  │   │ engine  │   │ (spool+queue) │  │
//! │  └─────────┘   └──────────┘   └─────────┘   └───────────────┘  │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use warden::{AuthzRequest, RequestKind, Shield, TenantId};
//!
//! let shield = Shield::builder(TenantId::new(1), store, scanner, sink)
//!     .config(warden::ConfigLoader::new().load_or_default())
//!     .build()?;
//!
//! let request = AuthzRequest::builder("alice@example.com", RequestKind::Prompt)
//!     .thread_id("thread-7")
//!     .groups(["sales"])
//!     .build()?;
//!
//! let outcome = shield.guard_messages("app-key", &request, &[prompt])?;
//! if outcome.authorized() {
//!     forward(&outcome.messages[0].text);
//! }
//! ```
//!
//! # Modules
//!
//! - **Facade**: [`Shield`], [`GuardOutcome`] - Main API
//! - **Decisions**: [`AuthorizationEngine`], [`MaskingEngine`]
//! - **Audit**: [`AuditPipeline`], [`AuditSpooler`]
//! - **Ports**: [`ports`] - traits the host application implements

mod error;
mod shield;

pub use error::{Result, WardenError};
pub use shield::{GuardOutcome, GuardedMessage, Shield, ShieldBuilder};

// Re-export core types
pub use warden_types::{
    AnalyzerSpan, AppId, Application, ApplicationConfig, ApplicationPolicy, AuditEvent,
    AuditResult, AuthzRequest, AuthzRequestBuilder, Decision, MessagePair, MetadataOp,
    PUBLIC_GROUP, PolicyAction, PolicyId, PolicyStatus, RequestKind, TenantId, ValidationError,
    VectorDbConfig, VectorDbId, VectorDbPolicy, VectorDbProvider,
};

// Re-export the decision and masking engines
pub use warden_authz::{
    AuthorizationEngine, AuthzError, MaskOutcome, MaskingEngine, VectorDbDecision, ports,
};

// Re-export vector filter building
pub use warden_vector::{FilterExpression, build_filter};

// Re-export the audit pipeline
pub use warden_audit::{
    AuditError, AuditPipeline, AuditPipelineConfig, AuditSink, AuditSpooler, SinkError, SpoolError,
};

// Re-export configuration
pub use warden_config::{AuditFailurePolicy, AuditSettings, ConfigLoader, WardenConfig};
