//! Error types.

use std::fmt::{Debug, Display};

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Ways a deferred computation or a task can fail.
///
/// Cancellation is not a computation failure: it has its own [`Error::Aborted`]
/// marker so callers can tell the two apart with [`Error::is_aborted`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The host offers no cancellation primitive, so an abortable task could
    /// not be created.
    #[error("task cancellation is not supported by this runtime")]
    Unsupported,

    /// The task was aborted before it settled.
    #[error("task aborted")]
    Aborted,

    /// The computation itself failed.
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl Error {
    /// A computation failure carrying only a message.
    pub fn msg<M>(message: M) -> Self
    where
        M: Display + Debug + Send + Sync + 'static,
    {
        Self::Failed(anyhow::Error::msg(message))
    }

    /// A computation failure wrapping another error.
    pub fn failed<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Failed(anyhow::Error::new(error))
    }

    /// Whether this marks a cancelled task rather than a failure.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }

    /// Whether this reports a missing host capability.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn failures_keep_their_message() {
        let err = Error::failed(io::Error::new(io::ErrorKind::Other, "disk on fire"));
        assert_eq!(err.to_string(), "disk on fire");
        assert!(!err.is_aborted());

        let err = Error::msg("boom");
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn cancellation_is_distinct_from_failure() {
        assert!(Error::Aborted.is_aborted());
        assert!(!Error::Aborted.is_unsupported());
        assert!(Error::Unsupported.is_unsupported());
    }
}
