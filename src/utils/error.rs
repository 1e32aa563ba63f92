//! Hard failures of the compiler
//!
//! Semantic problems in the user's program are never raised through this type;
//! they are collected as [`Diagnostic`](crate::feedback::Diagnostic)s. An
//! [`Error`] means the pipeline itself cannot continue: lowering was asked to
//! translate a tree the checker did not accept, or the input could not be read.

use crate::utils::Span;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Compiler error
#[derive(Error, Debug)]
pub enum Error {
    // ==================== Lowering Faults ====================

    #[error("invalid tree at {span}: {reason}")]
    InvalidTree { reason: String, span: Span },

    #[error("cannot classify call to `{method}` at {span}")]
    UnclassifiableCall { method: String, span: Span },

    // ==================== Pipeline ====================

    #[error("semantic analysis reported {count} blocking diagnostic(s)")]
    SemanticErrors { count: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed syntax tree: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn invalid_tree(reason: impl Into<String>, span: Span) -> Self {
        Self::InvalidTree { reason: reason.into(), span }
    }

    /// Get the span associated with this error
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::InvalidTree { span, .. } => Some(*span),
            Self::UnclassifiableCall { span, .. } => Some(*span),
            Self::SemanticErrors { .. } | Self::Io(_) | Self::Json(_) => None,
        }
    }
}
