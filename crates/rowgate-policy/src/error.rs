//! Error types for permission evaluation.

use thiserror::Error;

/// Errors raised while loading group and permission data.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The group/permission store could not be read.
    #[error("access store unavailable: {0}")]
    StoreUnavailable(String),

    /// Stored permission data is inconsistent.
    #[error("invalid permission data for connection {connection}: {reason}")]
    InvalidData { connection: String, reason: String },
}
