//! Router errors

use thiserror::Error;

/// Errors surfaced by router construction and registration
#[derive(Debug, Error)]
pub enum RouterError {
    /// A ticker pattern failed to compile; the registration was aborted
    #[error("invalid ticker pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: Box<fancy_regex::Error>,
    },
    /// A required collaborator was not provided at construction
    #[error("missing dependency: {0}")]
    MissingDependency(&'static str),
    /// The subscription handshake exhausted its retry budget
    #[error("streaming subscription permanently failed for group {0}")]
    SubscriptionFailed(String),
}
