//! Diagnostic error types.
//!
//! Every failure the session manager reports to a caller is one of these
//! variants, so front ends can map them to exit codes or status codes
//! without string matching.

use thiserror::Error;
use uuid::Uuid;

use crate::model::SessionStatus;

/// Errors returned by the diagnostic engine.
#[derive(Debug, Error)]
pub enum DiagnosticError {
    /// An unknown session or question id.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The user already has a session in progress.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The operation is not valid for the session's current status.
    #[error("cannot {operation} session {session_id}: status is {status}")]
    State {
        session_id: Uuid,
        status: SessionStatus,
        operation: &'static str,
    },

    /// The request itself is malformed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The session store failed.
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl DiagnosticError {
    pub fn session_not_found(id: Uuid) -> Self {
        DiagnosticError::NotFound {
            kind: "session",
            id: id.to_string(),
        }
    }

    pub fn question_not_found(id: u32) -> Self {
        DiagnosticError::NotFound {
            kind: "question",
            id: id.to_string(),
        }
    }

    /// Returns `true` only for storage failures. Caller errors must change
    /// the request before they can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DiagnosticError::Storage(_))
    }
}

pub type DiagnosticResult<T> = std::result::Result<T, DiagnosticError>;
