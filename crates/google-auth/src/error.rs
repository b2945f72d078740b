//! Error types for credential lifecycle operations

/// Errors from OAuth authorization, token storage and refresh.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    /// The provider rejected a refresh token, or no usable grant exists.
    /// The user must go through consent again.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("credential parse error: {0}")]
    CredentialParse(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("invalid user identity: {0}")]
    InvalidIdentity(String),

    #[error("missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("cannot build authorization URL: {0}")]
    AuthorizationUrl(String),
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
