//! Request-level error taxonomy and its HTTP rendering
//!
//! Authorization routes answer in plain text (a browser lands on them);
//! data routes answer with a JSON envelope:
//! `{"error":{"type":"...","message":"...","detail":"..."}}`.

use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("missing required query parameter `{0}`")]
    MissingParameter(&'static str),

    #[error("invalid user name: {0}")]
    InvalidIdentity(String),

    #[error("user {user} has not authorized mailbox access")]
    NotAuthorized { user: String },

    #[error("authorization code exchange failed: {0}")]
    ExchangeFailed(String),

    #[error("mailbox query failed: {0}")]
    UpstreamQueryFailed(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingParameter(_) | Self::InvalidIdentity(_) | Self::NotAuthorized { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::ExchangeFailed(_) | Self::UpstreamQueryFailed(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable code for the JSON envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingParameter(_) => "missing_parameter",
            Self::InvalidIdentity(_) => "invalid_identity",
            Self::NotAuthorized { .. } => "not_authorized",
            Self::ExchangeFailed(_) => "exchange_failed",
            Self::UpstreamQueryFailed(_) => "upstream_query_failed",
            Self::Internal(_) => "internal_error",
        }
    }

    fn message(&self) -> String {
        match self {
            Self::MissingParameter(_) | Self::InvalidIdentity(_) => "Bad request".into(),
            Self::NotAuthorized { user } => {
                format!("User not authorized. Please authenticate first at /authenticate/{user}")
            }
            Self::ExchangeFailed(_) => "Error retrieving access token".into(),
            Self::UpstreamQueryFailed(_) => "Error fetching emails".into(),
            Self::Internal(_) => "Internal server error".into(),
        }
    }

    /// Plain-text rendering for the consent and callback routes.
    pub fn into_text_response(self) -> Response {
        let body = match &self {
            Self::NotAuthorized { .. } => self.message(),
            other => format!("{}: {other}", other.message()),
        };
        (
            self.status(),
            [(CONTENT_TYPE, "text/plain; charset=utf-8")],
            body,
        )
            .into_response()
    }

    /// JSON envelope rendering for data routes.
    pub fn into_json_response(self) -> Response {
        let body = serde_json::json!({
            "error": {
                "type": self.kind(),
                "message": self.message(),
                "detail": self.to_string(),
            }
        });
        (
            self.status(),
            [(CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}

impl From<google_auth::Error> for AppError {
    fn from(e: google_auth::Error) -> Self {
        use google_auth::Error as E;
        match e {
            E::MissingParameter(name) => Self::MissingParameter(name),
            E::InvalidIdentity(msg) => Self::InvalidIdentity(msg),
            E::TokenExchange(_) | E::Http(_) => Self::ExchangeFailed(e.to_string()),
            E::InvalidCredentials(_)
            | E::CredentialParse(_)
            | E::Io(_)
            | E::AuthorizationUrl(_) => Self::Internal(e.to_string()),
        }
    }
}

impl AppError {
    /// Map a failed mailbox fetch for `user`. A refresh the provider refuses
    /// means the user has to consent again.
    pub fn from_mailbox(e: mailbox::Error, user: &str) -> Self {
        use google_auth::Error as A;
        match e {
            mailbox::Error::Auth(A::InvalidCredentials(_)) => Self::NotAuthorized {
                user: user.to_owned(),
            },
            mailbox::Error::Auth(A::TokenExchange(_) | A::Http(_)) | mailbox::Error::Upstream(_) => {
                Self::UpstreamQueryFailed(e.to_string())
            }
            other => Self::Internal(other.to_string()),
        }
    }
}
