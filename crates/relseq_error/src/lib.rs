//! Error type shared by all relseq combinators.

use std::error::Error;
use std::sync::Arc;

#[derive(Debug, Clone, thiserror::Error)]
pub enum RelSeqError {
    /// A required argument was rejected before any stream was constructed.
    #[error("invalid argument '{name}': {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    /// Cancellation was observed while waiting on an input sequence.
    #[error("sequence cancelled")]
    Cancelled,

    /// A sequence did not satisfy a cardinality contract of the operation.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Failure raised by an input sequence or a user supplied selector.
    ///
    /// Stored behind an `Arc` so the error can be replayed by memoized
    /// sequences.
    #[error(transparent)]
    Upstream(Arc<dyn Error + Send + Sync>),
}

impl RelSeqError {
    pub fn upstream(err: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        RelSeqError::Upstream(Arc::from(err.into()))
    }

    pub fn invalid_argument(name: &'static str, reason: impl Into<String>) -> Self {
        RelSeqError::InvalidArgument {
            name,
            reason: reason.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RelSeqError::Cancelled)
    }
}

pub type Result<T, E = RelSeqError> = std::result::Result<T, E>;

/// Shorthand for constructing an `InvalidOperation` error with format args.
#[macro_export]
macro_rules! invalid_operation {
    ($($arg:tt)*) => {
        $crate::RelSeqError::InvalidOperation(std::format!($($arg)*))
    };
}
