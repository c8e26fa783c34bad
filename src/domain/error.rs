//! Domain-level errors (no external dependencies)

use thiserror::Error;

/// Domain errors represent violations of the roadmap rules.
/// These are independent of storage and transport concerns.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("node is already being expanded: {0}")]
    Busy(String),

    #[error("content generation failed: {0}")]
    GenerationFailed(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("not the owner of {kind} {id}")]
    Unauthorized { kind: &'static str, id: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl DomainError {
    pub fn node_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            kind: "node",
            id: id.to_string(),
        }
    }

    pub fn roadmap_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            kind: "roadmap",
            id: id.to_string(),
        }
    }
}

/// Result type for domain and repository operations.
pub type DomainResult<T> = Result<T, DomainError>;
