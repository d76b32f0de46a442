//! Top-level error type for the Warden facade.

use warden_audit::AuditError;
use warden_authz::AuthzError;
use warden_authz::ports::{CryptoError, ScanError};
use warden_types::ValidationError;

/// Facade-level failure.
///
/// Display strings stay generic on purpose: they are shown to end users of
/// the guarded application, so they must not leak spool paths, backend
/// addresses, or policy internals. The `#[source]` chain keeps the detail
/// for operators reading logs.
#[derive(Debug, thiserror::Error)]
pub enum WardenError {
    /// The policy backend or user directory failed mid-decision.
    #[error("authorization service unavailable")]
    Authorization(#[source] AuthzError),

    /// A content scanner failed before a decision could be made.
    #[error("content scanning unavailable")]
    Scan(#[source] ScanError),

    /// The audit pipeline refused the event and the configured policy
    /// fails the request rather than serving it unaudited.
    #[error("audit capture unavailable")]
    Audit(#[source] AuditError),

    /// Payload encryption was configured but failed.
    #[error("payload encryption unavailable")]
    Crypto(#[source] CryptoError),

    /// The request itself was malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] ValidationError),
}

pub type Result<T> = std::result::Result<T, WardenError>;
