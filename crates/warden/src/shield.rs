//! Request-path orchestration: scan, decide, mask, audit.
//!
//! [`Shield`] is the single entry point an application gateway calls per
//! request. It wires the decision engine, the masking engine, and the
//! audit pipeline together and owns the policy for what happens when the
//! audit side cannot keep up.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::warn;

use warden_audit::{AuditError, AuditPipeline, AuditPipelineConfig, AuditSink, AuditSpooler};
use warden_authz::ports::{PolicyStore, ScanPass, Scanner, TenantKeyCache, UserDirectory};
use warden_authz::{AuthorizationEngine, MaskingEngine, VectorDbDecision};
use warden_config::{AuditFailurePolicy, AuditSettings, WardenConfig};
use warden_types::{
    AnalyzerSpan, AuditEvent, AuditResult, AuthzRequest, Decision, MessagePair, PolicyId, TenantId,
};

use crate::error::{Result, WardenError};

/// Request context keys the audit event picks up when present.
const CONTEXT_CLIENT_IP: &str = "client_ip";
const CONTEXT_CLIENT_HOSTNAME: &str = "client_hostname";

/// One guarded message: what came in, what goes out, where the findings
/// were.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardedMessage {
    /// The message as submitted.
    pub original: String,
    /// The message to forward: masked content, the original text, or the
    /// denial message.
    pub text: String,
    /// Substituted spans, positioned in the full stream (fragment offsets
    /// already applied).
    pub spans: Vec<AnalyzerSpan>,
}

/// The result of guarding one request.
#[derive(Debug, Clone)]
pub struct GuardOutcome {
    /// The decision that governed every message in the batch.
    pub decision: Decision,
    /// Guarded messages, in submission order.
    pub messages: Vec<GuardedMessage>,
}

impl GuardOutcome {
    /// Whether the request may proceed.
    pub fn authorized(&self) -> bool {
        self.decision.authorized
    }
}

struct Encryption {
    cache: Arc<dyn TenantKeyCache>,
    key_id: String,
}

/// The runtime guard for one tenant's AI traffic.
///
/// Construction starts the audit background workers; drop the shield (or
/// call [`shutdown`](Self::shutdown)) to stop them. All request-path
/// methods take `&self` and are safe to share across threads behind an
/// `Arc`.
pub struct Shield {
    engine: AuthorizationEngine,
    masking: MaskingEngine,
    store: Arc<dyn PolicyStore>,
    scanner: Arc<dyn Scanner>,
    pipeline: Option<AuditPipeline>,
    encryption: Option<Encryption>,
    tenant_id: TenantId,
    audit: AuditSettings,
    /// Per-thread monotonic sequence numbers for audit ordering.
    ///
    /// Retention contract: one entry per distinct thread id, kept for the
    /// life of the shield. Eviction would restart a thread's numbering and
    /// break audit ordering, so a deployment with unbounded thread churn
    /// should recycle the shield instead.
    sequences: Mutex<HashMap<String, u64>>,
}

impl Shield {
    /// Starts building a shield for a tenant.
    pub fn builder(
        tenant_id: TenantId,
        store: Arc<dyn PolicyStore>,
        scanner: Arc<dyn Scanner>,
        sink: Arc<dyn AuditSink>,
    ) -> ShieldBuilder {
        ShieldBuilder {
            tenant_id,
            store,
            scanner,
            sink,
            directory: Arc::new(warden_authz::ports::NullDirectory),
            encryption: None,
            config: WardenConfig::default(),
            log_decisions: true,
        }
    }

    /// Guards an ordered batch of message fragments under one decision.
    ///
    /// The fragments are treated as consecutive pieces of one logical
    /// stream: span positions in the second fragment are reported offset
    /// by the length of the first, and so on. For independent messages,
    /// call this once per message.
    ///
    /// Control flow: access-control scan over every fragment, traits
    /// merged into the request, one decision, then (on allow) a content
    /// scan and masking per fragment. The audit event is logged last,
    /// honoring the request's audit flag and the configured failure
    /// policy.
    pub fn guard_messages(
        &self,
        app_key: &str,
        request: &AuthzRequest,
        messages: &[String],
    ) -> Result<GuardOutcome> {
        // Pass 1: access-control scanners feed traits into the decision.
        let mut gate_traits: Vec<String> = Vec::new();
        let mut gate_spans: Vec<Vec<AnalyzerSpan>> = Vec::with_capacity(messages.len());
        for message in messages {
            let scan = self
                .scanner
                .scan(message, ScanPass::AccessControl)
                .map_err(WardenError::Scan)?;
            for t in scan.traits {
                if !gate_traits.contains(&t) {
                    gate_traits.push(t);
                }
            }
            gate_spans.push(scan.spans);
        }

        let enriched = request.with_traits(&gate_traits);
        let decision = self
            .engine
            .decide(app_key, &enriched)
            .map_err(WardenError::Authorization)?;

        // Pass 2: content scanners run only once access is granted.
        let mut audit_traits = enriched.traits.clone();
        let mut guarded = Vec::with_capacity(messages.len());
        let mut base_offset = 0usize;
        for (message, mut spans) in messages.iter().zip(gate_spans) {
            if decision.authorized {
                let scan = self
                    .scanner
                    .scan(message, ScanPass::Content)
                    .map_err(WardenError::Scan)?;
                for t in scan.traits {
                    if !audit_traits.contains(&t) {
                        audit_traits.push(t);
                    }
                }
                spans.extend(scan.spans);
            }

            let outcome = self
                .masking
                .mask_message(message, &decision, &spans, base_offset);
            base_offset += message.len();

            guarded.push(GuardedMessage {
                original: message.clone(),
                text: outcome.text,
                spans: outcome.audit_spans,
            });
        }

        self.record(app_key, &enriched, &decision, &audit_traits, &guarded)?;

        Ok(GuardOutcome {
            decision,
            messages: guarded,
        })
    }

    /// Builds the row-level filter for the application's vector database.
    pub fn vector_filter(
        &self,
        app_key: &str,
        request: &AuthzRequest,
    ) -> Result<VectorDbDecision> {
        self.engine
            .decide_vector_db(app_key, request)
            .map_err(WardenError::Authorization)
    }

    /// Stops the audit background workers.
    pub fn shutdown(&self) {
        if let Some(pipeline) = &self.pipeline {
            pipeline.shutdown();
        }
    }

    /// Events spooled or queued but not yet confirmed by the sink.
    pub fn audit_backlog(&self) -> usize {
        self.pipeline
            .as_ref()
            .map_or(0, |p| p.pending() + p.failed_pending())
    }

    /// Captures the audit event for a guarded request.
    fn record(
        &self,
        app_key: &str,
        request: &AuthzRequest,
        decision: &Decision,
        traits: &[String],
        guarded: &[GuardedMessage],
    ) -> Result<()> {
        let Some(pipeline) = &self.pipeline else {
            return Ok(());
        };
        if !request.audit {
            return Ok(());
        }

        let event = self.build_event(app_key, request, decision, traits, guarded)?;

        match pipeline.log(event) {
            Ok(()) => Ok(()),
            Err(err) => match self.audit.on_failure {
                AuditFailurePolicy::FailRequest => Err(WardenError::Audit(err)),
                AuditFailurePolicy::Proceed => {
                    warn!(
                        app = %app_key,
                        error = %err,
                        "audit capture degraded; serving request anyway"
                    );
                    // A queue-full event is still on disk; only a spool
                    // failure loses it.
                    if matches!(err, AuditError::DiskFull | AuditError::Spool(_)) {
                        warn!(app = %app_key, "audit event lost to spool failure");
                    }
                    Ok(())
                }
            },
        }
    }

    fn build_event(
        &self,
        app_key: &str,
        request: &AuthzRequest,
        decision: &Decision,
        traits: &[String],
        guarded: &[GuardedMessage],
    ) -> Result<AuditEvent> {
        let application = self
            .store
            .application(app_key)
            .map_err(|e| WardenError::Authorization(e.into()))?;
        let config = self
            .store
            .application_config(app_key)
            .map_err(|e| WardenError::Authorization(e.into()))?;

        let (config_policy_ids, application_policy_ids): (Vec<PolicyId>, Vec<PolicyId>) = decision
            .policy_ids
            .iter()
            .copied()
            .partition(|id| *id == config.id);

        let mut messages = Vec::with_capacity(guarded.len());
        let mut encryption_key_id = None;
        for m in guarded {
            let pair = match &self.encryption {
                Some(enc) => {
                    encryption_key_id = Some(enc.key_id.clone());
                    MessagePair {
                        original_message: enc
                            .cache
                            .encrypt(self.tenant_id, &enc.key_id, &m.original)
                            .map_err(WardenError::Crypto)?,
                        masked_message: enc
                            .cache
                            .encrypt(self.tenant_id, &enc.key_id, &m.text)
                            .map_err(WardenError::Crypto)?,
                    }
                }
                None => MessagePair {
                    original_message: m.original.clone(),
                    masked_message: m.text.clone(),
                },
            };
            messages.push(pair);
        }

        Ok(AuditEvent {
            event_time: Utc::now(),
            tenant_id: self.tenant_id,
            thread_id: request.thread_id.clone(),
            thread_sequence_number: self.next_sequence(&request.thread_id),
            request_type: request.kind,
            user_id: request.user_id.clone(),
            app_key: app_key.to_string(),
            app_id: application.id,
            app_name: application.name,
            result: AuditResult::from_decision(decision),
            traits: traits.to_vec(),
            masked_traits: decision.masked_traits.clone(),
            messages,
            config_policy_ids,
            application_policy_ids,
            client_ip: request.context.get(CONTEXT_CLIENT_IP).cloned(),
            client_hostname: request.context.get(CONTEXT_CLIENT_HOSTNAME).cloned(),
            encryption_key_id,
        })
    }

    fn next_sequence(&self, thread_id: &str) -> u64 {
        let mut sequences = self.sequences.lock().expect("sequence lock poisoned");
        let next = sequences.entry(thread_id.to_string()).or_insert(0);
        *next += 1;
        *next
    }
}

/// Builder for [`Shield`].
pub struct ShieldBuilder {
    tenant_id: TenantId,
    store: Arc<dyn PolicyStore>,
    scanner: Arc<dyn Scanner>,
    sink: Arc<dyn AuditSink>,
    directory: Arc<dyn UserDirectory>,
    encryption: Option<Encryption>,
    config: WardenConfig,
    log_decisions: bool,
}

impl ShieldBuilder {
    /// Uses the given configuration instead of the defaults.
    pub fn config(mut self, config: WardenConfig) -> Self {
        self.config = config;
        self
    }

    /// Resolves email user ids through the given directory.
    pub fn directory(mut self, directory: Arc<dyn UserDirectory>) -> Self {
        self.directory = directory;
        self
    }

    /// Encrypts audited message content with the tenant key.
    pub fn encryption(mut self, cache: Arc<dyn TenantKeyCache>, key_id: impl Into<String>) -> Self {
        self.encryption = Some(Encryption {
            cache,
            key_id: key_id.into(),
        });
        self
    }

    /// Disables per-decision tracing (for testing).
    pub fn without_decision_logging(mut self) -> Self {
        self.log_decisions = false;
        self
    }

    /// Builds the shield and starts the audit workers.
    ///
    /// With auditing disabled in the configuration, no spool directory is
    /// touched and no workers start.
    pub fn build(self) -> Result<Shield> {
        let audit = self.config.audit;

        let pipeline = if audit.enabled {
            let spooler = AuditSpooler::open(&audit.spool_dir)
                .map_err(|e| WardenError::Audit(e.into()))?;
            let pipeline_config = AuditPipelineConfig {
                queue_capacity: audit.queue_capacity,
                enqueue_timeout: audit.enqueue_timeout(),
                failed_queue_capacity: audit.failed_queue_capacity,
                retry_interval: audit.failed_retry_interval(),
            };
            Some(
                AuditPipeline::start(pipeline_config, spooler, self.sink)
                    .map_err(WardenError::Audit)?,
            )
        } else {
            None
        };

        let mut engine = AuthorizationEngine::new(Arc::clone(&self.store), self.directory);
        if !self.log_decisions {
            engine = engine.without_decision_logging();
        }

        Ok(Shield {
            engine,
            masking: MaskingEngine::new(),
            store: self.store,
            scanner: self.scanner,
            pipeline,
            encryption: self.encryption,
            tenant_id: self.tenant_id,
            audit,
            sequences: Mutex::new(HashMap::new()),
        })
    }
}
