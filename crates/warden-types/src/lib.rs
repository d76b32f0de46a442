//! # warden-types: Core types for Warden
//!
//! This crate contains shared types used across the Warden system:
//! - Entity IDs ([`TenantId`], [`AppId`], [`PolicyId`], [`VectorDbId`])
//! - Request model ([`AuthzRequest`], [`RequestKind`])
//! - Policy model ([`Application`], [`ApplicationConfig`],
//!   [`ApplicationPolicy`], [`VectorDbPolicy`], [`PolicyAction`])
//! - Decision model ([`Decision`], [`AnalyzerSpan`])
//! - Audit model ([`AuditEvent`], [`AuditResult`], [`MessagePair`])
//!
//! All payload-bearing types derive `Serialize`/`Deserialize` with stable
//! field names: audit spool files written by an older process version must
//! remain loadable by a newer one.

use std::collections::BTreeMap;
use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Entity IDs - All Copy (cheap 8-byte values)
// ============================================================================

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
            Deserialize,
        )]
        pub struct $name(u64);

        impl $name {
            pub fn new(id: u64) -> Self {
                Self(id)
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

id_type! {
    /// Unique identifier for a tenant (organization/customer).
    TenantId
}

id_type! {
    /// Unique identifier for a governed AI application.
    AppId
}

id_type! {
    /// Unique identifier for a policy record.
    ///
    /// Covers both application-config gates and trait policies: a decision
    /// records the IDs of whichever records contributed to the outcome.
    PolicyId
}

id_type! {
    /// Unique identifier for a vector database assigned to an application.
    VectorDbId
}

// ============================================================================
// Validation errors
// ============================================================================

/// Errors raised by validating constructors at the system boundary.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("user id must not be empty")]
    EmptyUserId,

    #[error("thread id must not be empty")]
    EmptyThreadId,

    #[error("an active policy must declare at least one trait tag")]
    ActivePolicyWithoutTraits,
}

// ============================================================================
// Request model
// ============================================================================

/// The kind of traffic a request carries.
///
/// Trait policies hold one permission per kind (RAG requests follow the
/// prompt permission; their row filtering happens on the vector-db path).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Prompt,
    EnrichedPrompt,
    Reply,
    Rag,
}

impl RequestKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestKind::Prompt => "prompt",
            RequestKind::EnrichedPrompt => "enriched_prompt",
            RequestKind::Reply => "reply",
            RequestKind::Rag => "rag",
        }
    }
}

impl Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An authorization request, immutable after construction.
///
/// Built via [`AuthzRequest::builder`], which validates required fields at
/// the boundary. Enrichment (user-id resolution, trait merging) produces a
/// rewritten copy rather than mutating in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthzRequest {
    /// Caller-visible correlation id (generated when not supplied).
    pub request_id: String,
    /// Conversation thread this request belongs to.
    pub thread_id: String,
    /// Optional stream id for fragmented (streamed) replies.
    pub stream_id: Option<String>,
    /// Requesting user, possibly an email before resolution.
    pub user_id: String,
    /// Groups the user belongs to, as known locally.
    pub groups: Vec<String>,
    /// Pre-resolved groups supplied by an external identity provider.
    ///
    /// When present, local group resolution is skipped entirely and these
    /// groups are used as-is, even if empty.
    pub external_groups: Option<Vec<String>>,
    /// Traits requested for evaluation (empty is allowed).
    pub traits: Vec<String>,
    /// Kind of traffic being authorized.
    pub kind: RequestKind,
    /// Free-form request context (client ip, hostname, ...).
    pub context: BTreeMap<String, String>,
    /// Whether this request should be audited.
    pub audit: bool,
}

impl AuthzRequest {
    /// Starts building a request for the given user and kind.
    pub fn builder(user_id: impl Into<String>, kind: RequestKind) -> AuthzRequestBuilder {
        AuthzRequestBuilder {
            request_id: None,
            thread_id: None,
            stream_id: None,
            user_id: user_id.into(),
            groups: Vec::new(),
            external_groups: None,
            traits: Vec::new(),
            kind,
            context: BTreeMap::new(),
            audit: true,
        }
    }

    /// Returns a copy of this request with the user id rewritten.
    ///
    /// Used after email resolution; the original request is left untouched.
    pub fn with_resolved_user(&self, user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..self.clone()
        }
    }

    /// Returns a copy of this request with additional traits merged in.
    ///
    /// Duplicates are dropped; existing order is preserved.
    pub fn with_traits(&self, extra: &[String]) -> Self {
        let mut merged = self.traits.clone();
        for t in extra {
            if !merged.contains(t) {
                merged.push(t.clone());
            }
        }
        Self {
            traits: merged,
            ..self.clone()
        }
    }
}

/// Builder for [`AuthzRequest`].
#[derive(Debug)]
pub struct AuthzRequestBuilder {
    request_id: Option<String>,
    thread_id: Option<String>,
    stream_id: Option<String>,
    user_id: String,
    groups: Vec<String>,
    external_groups: Option<Vec<String>>,
    traits: Vec<String>,
    kind: RequestKind,
    context: BTreeMap<String, String>,
    audit: bool,
}

impl AuthzRequestBuilder {
    pub fn request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    pub fn thread_id(mut self, id: impl Into<String>) -> Self {
        self.thread_id = Some(id.into());
        self
    }

    pub fn stream_id(mut self, id: impl Into<String>) -> Self {
        self.stream_id = Some(id.into());
        self
    }

    pub fn groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }

    /// Supplies externally resolved groups, disabling local group lookup.
    pub fn external_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.external_groups = Some(groups.into_iter().map(Into::into).collect());
        self
    }

    pub fn traits<I, S>(mut self, traits: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.traits = traits.into_iter().map(Into::into).collect();
        self
    }

    pub fn context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn audit(mut self, audit: bool) -> Self {
        self.audit = audit;
        self
    }

    /// Validates and builds the request.
    pub fn build(self) -> Result<AuthzRequest, ValidationError> {
        if self.user_id.trim().is_empty() {
            return Err(ValidationError::EmptyUserId);
        }
        let request_id = self
            .request_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let thread_id = self
            .thread_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        if thread_id.trim().is_empty() {
            return Err(ValidationError::EmptyThreadId);
        }
        Ok(AuthzRequest {
            request_id,
            thread_id,
            stream_id: self.stream_id,
            user_id: self.user_id,
            groups: self.groups,
            external_groups: self.external_groups,
            traits: self.traits,
            kind: self.kind,
            context: self.context,
            audit: self.audit,
        })
    }
}

// ============================================================================
// Policy model
// ============================================================================

/// The pseudo-group every requester implicitly belongs to.
pub const PUBLIC_GROUP: &str = "public";

/// Outcome a trait policy assigns to a request kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyAction {
    Allow,
    Deny,
    Redact,
}

/// Lifecycle status of a policy record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyStatus {
    Active,
    Inactive,
}

impl PolicyStatus {
    pub fn is_active(self) -> bool {
        matches!(self, PolicyStatus::Active)
    }
}

/// A governed AI application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: AppId,
    /// Stable lookup key the runtime presents (API-key style).
    pub key: String,
    pub name: String,
    pub enabled: bool,
    /// Vector database assigned to this application, if any.
    pub vector_db_id: Option<VectorDbId>,
}

/// Coarse allow/deny gate for an application.
///
/// Used only for the application-level access gate; masking is decided by
/// trait policies, never here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    pub id: PolicyId,
    pub app_id: AppId,
    pub allowed_users: Vec<String>,
    pub denied_users: Vec<String>,
    pub allowed_groups: Vec<String>,
    pub denied_groups: Vec<String>,
}

impl ApplicationConfig {
    /// Returns whether any deny entry matches the requester.
    pub fn denies(&self, user: &str, groups: &[String]) -> bool {
        self.denied_users.iter().any(|u| u == user)
            || self.denied_groups.iter().any(|g| groups.contains(g))
    }

    /// Returns whether the config carries any allow entries at all.
    ///
    /// An empty allow list means "allow by default": the gate only blocks
    /// when allow entries exist and none match. The asymmetry with deny
    /// lists (an empty deny list never implies deny) is intended behavior.
    pub fn has_allow_entries(&self) -> bool {
        !self.allowed_users.is_empty() || !self.allowed_groups.is_empty()
    }

    /// Returns whether any allow entry matches the requester.
    pub fn allows(&self, user: &str, groups: &[String]) -> bool {
        self.allowed_users.iter().any(|u| u == user)
            || self.allowed_groups.iter().any(|g| groups.contains(g))
    }
}

/// A fine-grained trait policy for an application.
///
/// Associates trait tags and actor lists with one [`PolicyAction`] per
/// request kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationPolicy {
    pub id: PolicyId,
    pub app_id: AppId,
    pub status: PolicyStatus,
    /// Trait tags this policy matches on. Non-empty when active.
    pub traits: Vec<String>,
    pub users: Vec<String>,
    pub groups: Vec<String>,
    pub roles: Vec<String>,
    pub prompt: PolicyAction,
    pub reply: PolicyAction,
    pub enriched_prompt: PolicyAction,
}

impl ApplicationPolicy {
    /// Returns the permission this policy assigns to the given kind.
    pub fn permission_for(&self, kind: RequestKind) -> PolicyAction {
        match kind {
            RequestKind::Prompt | RequestKind::Rag => self.prompt,
            RequestKind::EnrichedPrompt => self.enriched_prompt,
            RequestKind::Reply => self.reply,
        }
    }

    /// Returns whether this policy is a candidate for a request.
    ///
    /// A candidate policy is active, shares at least one trait tag with the
    /// request, and at least one of its actor lists intersects the
    /// requester's identity.
    pub fn is_candidate(
        &self,
        traits: &[String],
        user: &str,
        groups: &[String],
        roles: &[String],
    ) -> bool {
        self.status.is_active()
            && self.traits.iter().any(|t| traits.contains(t))
            && (self.users.iter().any(|u| u == user)
                || self.groups.iter().any(|g| groups.contains(g))
                || self.roles.iter().any(|r| roles.contains(r)))
    }

    /// Validates that an active policy declares at least one trait tag.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.status.is_active() && self.traits.is_empty() {
            return Err(ValidationError::ActivePolicyWithoutTraits);
        }
        Ok(())
    }
}

/// Comparison operator for vector-db metadata matching.
///
/// Only equality is supported today; the enum exists so that policy
/// records carry the operator on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataOp {
    #[default]
    Eq,
}

/// Row-level policy for a vector database.
///
/// Grants or denies actors access to records tagged with a single
/// metadata key/value pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorDbPolicy {
    pub id: PolicyId,
    pub vector_db_id: VectorDbId,
    pub status: PolicyStatus,
    pub allowed_users: Vec<String>,
    pub allowed_groups: Vec<String>,
    pub allowed_roles: Vec<String>,
    pub denied_users: Vec<String>,
    pub denied_groups: Vec<String>,
    pub denied_roles: Vec<String>,
    pub metadata_key: String,
    pub metadata_value: String,
    pub operator: MetadataOp,
}

/// The vector-db providers Warden can build filter expressions for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VectorDbProvider {
    Milvus,
    OpenSearch,
    /// Providers without a filter builder yield no filter expression.
    #[serde(untagged)]
    Other(String),
}

/// A vector database assigned to an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorDbConfig {
    pub id: VectorDbId,
    pub name: String,
    pub enabled: bool,
    pub provider: VectorDbProvider,
}

// ============================================================================
// Decision model
// ============================================================================

/// The outcome of evaluating an authorization request.
///
/// Produced fresh per request and never mutated after construction. The
/// contributing policy ids preserve evaluative evidence: which records
/// caused the outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub authorized: bool,
    /// Traits to mask, mapped to their replacement tokens.
    pub masked_traits: BTreeMap<String, String>,
    /// Ordered, deduplicated ids of the policies that contributed.
    pub policy_ids: Vec<PolicyId>,
    /// Human-readable explanation, suitable for display to the caller.
    pub reason: Option<String>,
}

impl Decision {
    /// An allow decision with no masking.
    pub fn allow(policy_ids: Vec<PolicyId>, reason: Option<String>) -> Self {
        Self {
            authorized: true,
            masked_traits: BTreeMap::new(),
            policy_ids,
            reason,
        }
    }

    /// A deny decision.
    pub fn deny(policy_ids: Vec<PolicyId>, reason: Option<String>) -> Self {
        Self {
            authorized: false,
            masked_traits: BTreeMap::new(),
            policy_ids,
            reason,
        }
    }

    /// The replacement token for a masked trait: `SSN` becomes `<<SSN>>`.
    pub fn mask_token(trait_name: &str) -> String {
        format!("<<{}>>", trait_name.to_uppercase())
    }
}

/// A sensitive span a scanner detected in a message.
///
/// Offsets are byte positions into the scanned message. Scanners guarantee
/// spans within one message are non-overlapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzerSpan {
    #[serde(rename = "trait")]
    pub trait_name: String,
    pub start: usize,
    pub end: usize,
}

impl AnalyzerSpan {
    pub fn new(trait_name: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            trait_name: trait_name.into(),
            start,
            end,
        }
    }
}

// ============================================================================
// Audit model
// ============================================================================

/// Result tag recorded on an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditResult {
    Allowed,
    Masked,
    Denied,
}

impl AuditResult {
    /// Derives the result tag from a decision.
    pub fn from_decision(decision: &Decision) -> Self {
        if !decision.authorized {
            AuditResult::Denied
        } else if decision.masked_traits.is_empty() {
            AuditResult::Allowed
        } else {
            AuditResult::Masked
        }
    }
}

/// An original/masked message pair recorded for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePair {
    pub original_message: String,
    pub masked_message: String,
}

/// A single audit record of an authorization decision.
///
/// Lifecycle: created at decision time, appended to the day spool file,
/// enqueued for delivery, and removed from the spool only after the sink
/// confirms receipt. Field names are part of the spool wire format and
/// must stay stable across versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_time: DateTime<Utc>,
    pub tenant_id: TenantId,
    pub thread_id: String,
    pub thread_sequence_number: u64,
    pub request_type: RequestKind,
    pub user_id: String,
    pub app_key: String,
    pub app_id: AppId,
    pub app_name: String,
    pub result: AuditResult,
    pub traits: Vec<String>,
    pub masked_traits: BTreeMap<String, String>,
    pub messages: Vec<MessagePair>,
    pub config_policy_ids: Vec<PolicyId>,
    pub application_policy_ids: Vec<PolicyId>,
    #[serde(default)]
    pub client_ip: Option<String>,
    #[serde(default)]
    pub client_hostname: Option<String>,
    #[serde(default)]
    pub encryption_key_id: Option<String>,
}

impl AuditEvent {
    /// The calendar day this event belongs to, keyed by its own timestamp.
    ///
    /// Spool placement always follows the event's day, not the wall clock
    /// at write time, so late writes land in the right file.
    pub fn day(&self) -> chrono::NaiveDate {
        self.event_time.date_naive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> AuthzRequest {
        AuthzRequest::builder("alice", RequestKind::Prompt)
            .thread_id("t-1")
            .groups(["sales"])
            .traits(["PII"])
            .build()
            .expect("valid request")
    }

    #[test]
    fn test_builder_rejects_empty_user() {
        let result = AuthzRequest::builder("  ", RequestKind::Prompt).build();
        assert!(matches!(result, Err(ValidationError::EmptyUserId)));
    }

    #[test]
    fn test_builder_generates_ids_when_missing() {
        let req = AuthzRequest::builder("alice", RequestKind::Reply)
            .build()
            .expect("valid request");
        assert!(!req.request_id.is_empty());
        assert!(!req.thread_id.is_empty());
        assert!(req.audit, "audit defaults to enabled");
    }

    #[test]
    fn test_with_resolved_user_is_a_copy() {
        let req = request();
        let resolved = req.with_resolved_user("alice.canonical");
        assert_eq!(req.user_id, "alice");
        assert_eq!(resolved.user_id, "alice.canonical");
        assert_eq!(resolved.thread_id, req.thread_id);
    }

    #[test]
    fn test_with_traits_dedupes() {
        let req = request();
        let enriched = req.with_traits(&["PII".into(), "SSN".into()]);
        assert_eq!(enriched.traits, vec!["PII".to_string(), "SSN".to_string()]);
    }

    #[test]
    fn test_default_config_carries_zero_ids() {
        let config = ApplicationConfig::default();
        assert_eq!(u64::from(config.id), 0);
        assert_eq!(u64::from(config.app_id), 0);
        assert!(!config.has_allow_entries());
    }

    #[test]
    fn test_config_gate_helpers() {
        let config = ApplicationConfig {
            id: PolicyId::new(7),
            app_id: AppId::new(1),
            denied_groups: vec!["public".into()],
            ..ApplicationConfig::default()
        };
        assert!(config.denies("anyone", &["public".into()]));
        assert!(!config.has_allow_entries());
        assert!(!config.allows("anyone", &["public".into()]));
    }

    #[test]
    fn test_policy_candidate_matching() {
        let policy = ApplicationPolicy {
            id: PolicyId::new(1),
            app_id: AppId::new(1),
            status: PolicyStatus::Active,
            traits: vec!["SSN".into()],
            users: vec![],
            groups: vec!["public".into()],
            roles: vec![],
            prompt: PolicyAction::Allow,
            reply: PolicyAction::Redact,
            enriched_prompt: PolicyAction::Allow,
        };

        assert!(policy.is_candidate(&["SSN".into()], "bob", &["public".into()], &[]));
        // No trait intersection
        assert!(!policy.is_candidate(&["PHONE".into()], "bob", &["public".into()], &[]));
        // No actor intersection
        assert!(!policy.is_candidate(&["SSN".into()], "bob", &["sales".into()], &[]));

        let inactive = ApplicationPolicy {
            status: PolicyStatus::Inactive,
            ..policy
        };
        assert!(!inactive.is_candidate(&["SSN".into()], "bob", &["public".into()], &[]));
    }

    #[test]
    fn test_permission_for_kind() {
        let policy = ApplicationPolicy {
            id: PolicyId::new(1),
            app_id: AppId::new(1),
            status: PolicyStatus::Active,
            traits: vec!["SSN".into()],
            users: vec![],
            groups: vec![],
            roles: vec![],
            prompt: PolicyAction::Deny,
            reply: PolicyAction::Redact,
            enriched_prompt: PolicyAction::Allow,
        };
        assert_eq!(policy.permission_for(RequestKind::Prompt), PolicyAction::Deny);
        assert_eq!(policy.permission_for(RequestKind::Rag), PolicyAction::Deny);
        assert_eq!(policy.permission_for(RequestKind::Reply), PolicyAction::Redact);
        assert_eq!(
            policy.permission_for(RequestKind::EnrichedPrompt),
            PolicyAction::Allow
        );
    }

    #[test]
    fn test_active_policy_requires_traits() {
        let policy = ApplicationPolicy {
            id: PolicyId::new(1),
            app_id: AppId::new(1),
            status: PolicyStatus::Active,
            traits: vec![],
            users: vec![],
            groups: vec![],
            roles: vec![],
            prompt: PolicyAction::Allow,
            reply: PolicyAction::Allow,
            enriched_prompt: PolicyAction::Allow,
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_mask_token_format() {
        assert_eq!(Decision::mask_token("ssn"), "<<SSN>>");
        assert_eq!(Decision::mask_token("SSN"), "<<SSN>>");
    }

    #[test]
    fn test_audit_result_from_decision() {
        let mut decision = Decision::allow(vec![], None);
        assert_eq!(AuditResult::from_decision(&decision), AuditResult::Allowed);

        decision
            .masked_traits
            .insert("SSN".into(), Decision::mask_token("SSN"));
        assert_eq!(AuditResult::from_decision(&decision), AuditResult::Masked);

        let denied = Decision::deny(vec![], Some("nope".into()));
        assert_eq!(AuditResult::from_decision(&denied), AuditResult::Denied);
    }

    #[test]
    fn test_request_kind_wire_names() {
        let json = serde_json::to_string(&RequestKind::EnrichedPrompt).expect("serialize");
        assert_eq!(json, "\"enriched_prompt\"");
    }

    #[test]
    fn test_provider_wire_names() {
        let milvus: VectorDbProvider = serde_json::from_str("\"MILVUS\"").expect("parse");
        assert_eq!(milvus, VectorDbProvider::Milvus);
        let other: VectorDbProvider = serde_json::from_str("\"WEAVIATE\"").expect("parse");
        assert_eq!(other, VectorDbProvider::Other("WEAVIATE".into()));
    }

    #[test]
    fn test_audit_event_round_trip_and_day() {
        let event = AuditEvent {
            event_time: "2026-03-01T23:59:00Z".parse().expect("timestamp"),
            tenant_id: TenantId::new(9),
            thread_id: "t-1".into(),
            thread_sequence_number: 3,
            request_type: RequestKind::Reply,
            user_id: "alice".into(),
            app_key: "app-key".into(),
            app_id: AppId::new(1),
            app_name: "support-bot".into(),
            result: AuditResult::Masked,
            traits: vec!["SSN".into()],
            masked_traits: BTreeMap::from([("SSN".to_string(), "<<SSN>>".to_string())]),
            messages: vec![MessagePair {
                original_message: "ssn is 123".into(),
                masked_message: "ssn is <<SSN>>".into(),
            }],
            config_policy_ids: vec![PolicyId::new(7)],
            application_policy_ids: vec![PolicyId::new(12)],
            client_ip: Some("10.0.0.1".into()),
            client_hostname: None,
            encryption_key_id: Some("key-1".into()),
        };

        let line = serde_json::to_string(&event).expect("serialize");
        let parsed: AuditEvent = serde_json::from_str(&line).expect("parse");
        assert_eq!(parsed, event);
        assert_eq!(event.day().to_string(), "2026-03-01");

        // Optional context fields may be absent in older spool lines.
        let mut value: serde_json::Value = serde_json::from_str(&line).expect("parse value");
        let obj = value.as_object_mut().expect("object");
        obj.remove("client_ip");
        obj.remove("client_hostname");
        obj.remove("encryption_key_id");
        let older: AuditEvent =
            serde_json::from_value(value).expect("older line must stay loadable");
        assert_eq!(older.client_ip, None);
    }
}
