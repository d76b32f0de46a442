//! Traits for the external collaborators of the decision engine.
//!
//! The engine consumes these ports; it never owns their implementations.
//! Policy CRUD, persistence, scanner models, and key management all live
//! behind these boundaries.

use warden_types::{
    AnalyzerSpan, Application, ApplicationConfig, ApplicationPolicy, RequestKind, TenantId,
    VectorDbConfig, VectorDbId, VectorDbPolicy,
};

/// Failure of the policy backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("application not found: {key}")]
    ApplicationNotFound { key: String },

    #[error("vector db not found: {id}")]
    VectorDbNotFound { id: VectorDbId },

    #[error("policy store unavailable: {0}")]
    Unavailable(String),
}

/// Read access to application and policy records.
///
/// `application_policies` returns candidate policies already scoped to the
/// requester and traits (per the candidate rule on
/// [`ApplicationPolicy::is_candidate`]). Its return order is authoritative:
/// the engine's first-deny-wins scan follows it without re-sorting.
pub trait PolicyStore: Send + Sync {
    fn application(&self, app_key: &str) -> Result<Application, StoreError>;

    fn application_config(&self, app_key: &str) -> Result<ApplicationConfig, StoreError>;

    fn application_policies(
        &self,
        app_key: &str,
        traits: &[String],
        user: &str,
        groups: &[String],
        kind: RequestKind,
    ) -> Result<Vec<ApplicationPolicy>, StoreError>;

    fn vector_db(&self, id: VectorDbId) -> Result<VectorDbConfig, StoreError>;

    fn vector_db_policies(
        &self,
        id: VectorDbId,
        user: &str,
        groups: &[String],
    ) -> Result<Vec<VectorDbPolicy>, StoreError>;
}

/// Which scanner population to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPass {
    /// Scanners whose traits feed access-control decisions.
    AccessControl,
    /// The remaining content scanners (run only after an allow).
    Content,
}

/// Output of one scanner pass over a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    /// Trait names detected in the message.
    pub traits: Vec<String>,
    /// Optional access-control actions suggested by the scanners.
    pub actions: Vec<String>,
    /// Sensitive spans, non-overlapping within the message.
    pub spans: Vec<AnalyzerSpan>,
}

/// Failure of a content scanner.
#[derive(Debug, thiserror::Error)]
#[error("scanner failure: {0}")]
pub struct ScanError(pub String);

/// Content scanning over message text.
pub trait Scanner: Send + Sync {
    fn scan(&self, message: &str, pass: ScanPass) -> Result<ScanResult, ScanError>;
}

/// Failure of the user directory.
#[derive(Debug, thiserror::Error)]
#[error("user directory failure: {0}")]
pub struct DirectoryError(pub String);

/// Resolution of email addresses to canonical user ids.
pub trait UserDirectory: Send + Sync {
    /// Returns the canonical user id for an email, or `None` when unknown.
    fn resolve_email(&self, email: &str) -> Result<Option<String>, DirectoryError>;
}

/// A directory that knows no one. Every email falls back to its local part.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDirectory;

impl UserDirectory for NullDirectory {
    fn resolve_email(&self, _email: &str) -> Result<Option<String>, DirectoryError> {
        Ok(None)
    }
}

/// Failure of the tenant key cache.
#[derive(Debug, thiserror::Error)]
#[error("key cache failure for tenant {tenant_id}: {message}")]
pub struct CryptoError {
    pub tenant_id: TenantId,
    pub message: String,
}

/// Per-tenant payload encryption, touched only as a capability.
pub trait TenantKeyCache: Send + Sync {
    fn encrypt(
        &self,
        tenant_id: TenantId,
        key_id: &str,
        plaintext: &str,
    ) -> Result<String, CryptoError>;

    fn decrypt(
        &self,
        tenant_id: TenantId,
        key_id: &str,
        ciphertext: &str,
    ) -> Result<String, CryptoError>;
}
