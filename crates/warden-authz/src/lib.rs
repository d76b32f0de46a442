//! Policy decision engine for Warden.
//!
//! This crate evaluates authorization requests against application gates
//! and fine-grained trait policies, and redacts message content according
//! to the resulting decision:
//!
//! - [`AuthorizationEngine`] — pure decision function over the
//!   [`ports::PolicyStore`] and [`ports::UserDirectory`] collaborators.
//!   Precedence: explicit deny > explicit allow > trait-policy deny >
//!   trait-policy allow/redact.
//! - [`MaskingEngine`] — applies a decision's masked-trait map to scanner
//!   spans, or substitutes the denial message when access is denied.
//! - [`ports`] — traits for the external collaborators (policy store,
//!   content scanners, user directory, tenant key cache).
//!
//! Authorization outcomes are not errors: a deny decision with a reason is
//! a successful evaluation. Only collaborator failures surface as
//! [`AuthzError`]; the engine never guesses a decision when a required
//! collaborator fails.

mod engine;
mod masking;
pub mod ports;

pub use engine::{AuthorizationEngine, AuthzError, Result, VectorDbDecision};
pub use masking::{MaskOutcome, MaskingEngine};
