//! Authorization decision logic.
//!
//! Evaluates a request through a fixed gate sequence, each step a
//! short-circuit:
//!
//! 1. Email user ids are resolved to canonical ids (fallback: local part).
//! 2. Disabled applications deny everything.
//! 3. Trait-less requests are allowed by default (a policy choice: with no
//!    traits there is nothing to evaluate a trait policy against).
//! 4. The application config's explicit deny gate, then its allow gate.
//! 5. Candidate trait policies: first DENY in store order wins; otherwise
//!    REDACT permissions aggregate into the masked-trait map. REDACT never
//!    affects the authorization outcome, only masking.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};
use warden_types::{
    AuthzRequest, Decision, PolicyAction, PolicyId, PUBLIC_GROUP, VectorDbConfig, VectorDbPolicy,
};
use warden_vector::FilterExpression;

use crate::ports::{PolicyStore, StoreError, UserDirectory};

/// Infrastructure failures during evaluation.
///
/// Authorization outcomes are never errors; this surfaces only collaborator
/// failures, which the caller must handle rather than the engine guessing a
/// decision.
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    #[error("policy store failure: {0}")]
    Store(#[from] StoreError),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, AuthzError>;

/// Outcome of the vector-database decision path.
#[derive(Debug, Clone)]
pub struct VectorDbDecision {
    /// The vector database assigned to the application, when one exists
    /// and its gates passed.
    pub vector_db: Option<VectorDbConfig>,
    /// The row-level policies visible to the requester.
    pub policies: Vec<VectorDbPolicy>,
    /// The provider-specific filter expression, when one could be built.
    pub filter: Option<FilterExpression>,
    /// Gate failure explanation, when a gate short-circuited.
    pub reason: Option<String>,
}

impl VectorDbDecision {
    fn gated(reason: &str) -> Self {
        Self {
            vector_db: None,
            policies: Vec::new(),
            filter: None,
            reason: Some(reason.to_string()),
        }
    }
}

/// The policy decision engine.
///
/// Pure apart from its collaborator calls: the same request and the same
/// store answers always produce the same decision.
pub struct AuthorizationEngine {
    store: Arc<dyn PolicyStore>,
    directory: Arc<dyn UserDirectory>,
    /// Whether to emit tracing events for every decision.
    log_decisions: bool,
}

impl AuthorizationEngine {
    pub fn new(store: Arc<dyn PolicyStore>, directory: Arc<dyn UserDirectory>) -> Self {
        Self {
            store,
            directory,
            log_decisions: true,
        }
    }

    /// Disables decision logging (for testing).
    pub fn without_decision_logging(mut self) -> Self {
        self.log_decisions = false;
        self
    }

    /// Evaluates the prompt/reply path for a request.
    pub fn decide(&self, app_key: &str, request: &AuthzRequest) -> Result<Decision> {
        let request = self.resolve_user(request);

        let application = self.store.application(app_key)?;
        if !application.enabled {
            return Ok(self.finish(
                app_key,
                &request,
                Decision::deny(Vec::new(), Some("Application is disabled".to_string())),
            ));
        }

        // Default-allow for trait-less requests: no policy evaluation is
        // possible without traits. This is a policy choice, not a fallback.
        if request.traits.is_empty() {
            return Ok(self.finish(
                app_key,
                &request,
                Decision::allow(Vec::new(), Some("No traits provided".to_string())),
            ));
        }

        let config = self.store.application_config(app_key)?;
        let groups = effective_groups(&request);

        if config.denies(&request.user_id, &groups) {
            return Ok(self.finish(
                app_key,
                &request,
                Decision::deny(
                    vec![config.id],
                    Some("Explicit deny access to Application".to_string()),
                ),
            ));
        }

        // Allow gate: an empty allow list allows by default; the gate only
        // blocks when allow entries exist and none match. (The asymmetry
        // with the deny gate is intended.)
        if config.has_allow_entries() && !config.allows(&request.user_id, &groups) {
            return Ok(self.finish(
                app_key,
                &request,
                Decision::deny(
                    vec![config.id],
                    Some("No Access to Application".to_string()),
                ),
            ));
        }

        let candidates = self.store.application_policies(
            app_key,
            &request.traits,
            &request.user_id,
            &groups,
            request.kind,
        )?;

        if candidates.is_empty() {
            // Success is purely the allow gate's verdict here, which passed
            // above; zero candidates is not an implicit deny.
            return Ok(self.finish(app_key, &request, Decision::allow(vec![config.id], None)));
        }

        // First DENY in store order wins. REDACT never blocks.
        if let Some(denying) = candidates
            .iter()
            .find(|p| p.permission_for(request.kind) == PolicyAction::Deny)
        {
            return Ok(self.finish(app_key, &request, Decision::deny(vec![denying.id], None)));
        }

        let mut masked_traits = BTreeMap::new();
        let mut policy_ids: Vec<PolicyId> = Vec::new();
        for policy in &candidates {
            if !policy_ids.contains(&policy.id) {
                policy_ids.push(policy.id);
            }
            if policy.permission_for(request.kind) == PolicyAction::Redact {
                for t in &policy.traits {
                    if request.traits.contains(t) {
                        masked_traits
                            .entry(t.clone())
                            .or_insert_with(|| Decision::mask_token(t));
                    }
                }
            }
        }

        Ok(self.finish(
            app_key,
            &request,
            Decision {
                authorized: true,
                masked_traits,
                policy_ids,
                reason: None,
            },
        ))
    }

    /// Evaluates the vector-database path for a request.
    ///
    /// Mirrors the application gates of [`decide`](Self::decide), then
    /// fetches all row-level policies visible to the requester (no trait
    /// filtering on this path) and builds the provider filter expression.
    pub fn decide_vector_db(
        &self,
        app_key: &str,
        request: &AuthzRequest,
    ) -> Result<VectorDbDecision> {
        let request = self.resolve_user(request);

        let application = self.store.application(app_key)?;
        if !application.enabled {
            return Ok(VectorDbDecision::gated("Application is disabled"));
        }

        let Some(vector_db_id) = application.vector_db_id else {
            return Ok(VectorDbDecision::gated(
                "No Vector DB assigned to application",
            ));
        };

        let vector_db = self.store.vector_db(vector_db_id)?;
        if !vector_db.enabled {
            return Ok(VectorDbDecision::gated("Vector DB is disabled"));
        }

        let groups = effective_groups(&request);
        let policies = self
            .store
            .vector_db_policies(vector_db_id, &request.user_id, &groups)?;

        let filter = warden_vector::build_filter(&vector_db, &request.user_id, &groups, &policies);

        if self.log_decisions {
            info!(
                app = %app_key,
                user = %request.user_id,
                vector_db = %vector_db.name,
                policies = policies.len(),
                has_filter = filter.is_some(),
                "Vector db filter built"
            );
        }

        Ok(VectorDbDecision {
            vector_db: Some(vector_db),
            policies,
            filter,
            reason: None,
        })
    }

    /// Rewrites email user ids to canonical ids.
    ///
    /// Unknown emails and directory failures fall back to the local part;
    /// a directory outage must not turn into a denied request.
    fn resolve_user(&self, request: &AuthzRequest) -> AuthzRequest {
        let user = &request.user_id;
        let Some((local, _domain)) = user.split_once('@') else {
            return request.clone();
        };

        match self.directory.resolve_email(user) {
            Ok(Some(resolved)) => request.with_resolved_user(resolved),
            Ok(None) => request.with_resolved_user(local),
            Err(err) => {
                warn!(user = %user, error = %err, "email resolution failed; using local part");
                request.with_resolved_user(local)
            }
        }
    }

    fn finish(&self, app_key: &str, request: &AuthzRequest, decision: Decision) -> Decision {
        if self.log_decisions {
            if decision.authorized {
                info!(
                    app = %app_key,
                    user = %request.user_id,
                    kind = %request.kind,
                    masked = decision.masked_traits.len(),
                    policies = ?decision.policy_ids,
                    "Access granted"
                );
            } else {
                warn!(
                    app = %app_key,
                    user = %request.user_id,
                    kind = %request.kind,
                    reason = decision.reason.as_deref().unwrap_or("denied by policy"),
                    policies = ?decision.policy_ids,
                    "Access denied"
                );
            }
        }
        decision
    }
}

/// Effective groups for gate and policy matching.
///
/// Externally supplied groups are used as-is (possibly empty) and skip
/// local resolution entirely; otherwise the requester's groups are
/// extended with the public pseudo-group.
fn effective_groups(request: &AuthzRequest) -> Vec<String> {
    if let Some(external) = &request.external_groups {
        return external.clone();
    }
    let mut groups = request.groups.clone();
    if !groups.iter().any(|g| g == PUBLIC_GROUP) {
        groups.push(PUBLIC_GROUP.to_string());
    }
    groups
}
