//! Configuration management for Warden
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. Environment variables (WARDEN_* prefix, highest precedence)
//! 2. warden.local.toml (gitignored, local overrides)
//! 3. warden.toml (git-tracked, project config)
//! 4. Built-in defaults (lowest precedence)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

mod error;
mod loader;

pub use error::ConfigError;
pub use loader::ConfigLoader;

/// Main Warden configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    pub audit: AuditSettings,
}

/// What `Shield` does when durable audit ingestion cannot keep up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditFailurePolicy {
    /// Fail the request when the spool is full or the queue saturates.
    FailRequest,
    /// Serve the request anyway; the condition is logged.
    Proceed,
}

/// Audit pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditSettings {
    /// Master switch for audit capture. When false, no spool directory is
    /// touched, no workers start, and per-request audit flags are ignored.
    pub enabled: bool,
    /// Directory holding the per-day spool files.
    pub spool_dir: PathBuf,
    /// Capacity of the bounded delivery queue.
    pub queue_capacity: usize,
    /// How long a log call may wait for queue space, in milliseconds.
    pub enqueue_timeout_ms: u64,
    /// Capacity of the failed-event retry queue.
    pub failed_queue_capacity: usize,
    /// Interval between failed-event retry sweeps, in seconds.
    pub failed_retry_interval_secs: u64,
    /// How disk-full and queue-full conditions affect the request.
    pub on_failure: AuditFailurePolicy,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            spool_dir: PathBuf::from(".warden/audit"),
            queue_capacity: 1024,
            enqueue_timeout_ms: 500,
            failed_queue_capacity: 1024,
            failed_retry_interval_secs: 120,
            on_failure: AuditFailurePolicy::Proceed,
        }
    }
}

impl AuditSettings {
    pub fn enqueue_timeout(&self) -> Duration {
        Duration::from_millis(self.enqueue_timeout_ms)
    }

    pub fn failed_retry_interval(&self) -> Duration {
        Duration::from_secs(self.failed_retry_interval_secs)
    }

    /// Rejects values that would make the pipeline unbuildable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "audit.queue_capacity must be positive".to_string(),
            ));
        }
        if self.failed_queue_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "audit.failed_queue_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
