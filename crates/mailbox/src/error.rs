//! Error types for mailbox queries

/// Errors from mailbox queries.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No usable access token for the user (not authorized, or refresh failed).
    #[error("authorization error: {0}")]
    Auth(#[from] google_auth::Error),

    /// The search call failed. Fatal to the whole batch.
    #[error("message listing failed: {0}")]
    Upstream(String),

    /// A single message could not be fetched or normalized. Recovered by
    /// dropping that message.
    #[error("message {id} unavailable: {reason}")]
    Message { id: String, reason: String },
}

/// Result alias for mailbox operations.
pub type Result<T> = std::result::Result<T, Error>;
