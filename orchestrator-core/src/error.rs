//! Kernel-wide error taxonomy, mirroring `spec.md` §7.

use thiserror::Error;

pub type KernelResult<T> = Result<T, KernelError>;

#[derive(Error, Debug)]
pub enum KernelError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("document locked by another requester")]
    LockedByOther,

    #[error("optimistic version conflict: expected >= {stored}, observed {observed}")]
    VersionConflict { observed: u64, stored: u64 },

    #[error("queue at capacity for agent {0}")]
    QueueFull(String),

    #[error("agent not found: {0}")]
    AgentNotFound(String),

    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("decision not pending")]
    DecisionNotPending,

    #[error("signer not authorized for this decision")]
    SignerNotAuthorized,

    #[error("signer already acted on this decision")]
    SignerAlreadyActed,

    #[error("appeal rejected: {0}")]
    AppealRejected(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("fatal error: {0}")]
    Fatal(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl KernelError {
    /// Matches the error-taxonomy table in `spec.md` §7: persistence and
    /// liveness errors are logged, not surfaced as task-ending failures.
    pub fn disrupts_coordination(&self) -> bool {
        !matches!(self, KernelError::Persistence(_))
    }
}
