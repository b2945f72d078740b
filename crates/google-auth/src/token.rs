//! OAuth token exchange and refresh
//!
//! Handles the two token endpoint interactions:
//! 1. Authorization code exchange (completing the consent flow)
//! 2. Token refresh (request-time, when the access token is about to expire)
//!
//! Both POST a form to the registration's `token_uri` with different grant
//! types. The client secret is sent in the body, as Google expects for web
//! clients.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::registration::ClientRegistration;

/// Response from the token endpoint for both exchange and refresh.
///
/// Google omits `refresh_token` on refresh responses (the old one stays
/// valid) and may omit it on an exchange when consent was not forced.
#[derive(Debug, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Seconds until the access token expires (delta, not absolute)
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "Bearer".to_owned()
}

/// Exchange a one-time authorization code for tokens.
///
/// Rejections (expired code, code already used, redirect URI mismatch) come
/// back as `TokenExchange` carrying the provider's status and body.
pub async fn exchange_code(
    client: &reqwest::Client,
    registration: &ClientRegistration,
    code: &str,
) -> Result<TokenResponse> {
    let response = client
        .post(&registration.token_uri)
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", registration.client_id.as_str()),
            ("client_secret", registration.client_secret.expose().as_str()),
            ("redirect_uri", registration.redirect_uri()),
        ])
        .send()
        .await
        .map_err(|e| Error::Http(format!("token exchange request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::TokenExchange(format!(
            "token endpoint returned {status}: {body}"
        )));
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::TokenExchange(format!("invalid token response: {e}")))
}

/// Obtain a fresh access token from a refresh token.
pub async fn refresh_token(
    client: &reqwest::Client,
    registration: &ClientRegistration,
    refresh: &str,
) -> Result<TokenResponse> {
    let response = client
        .post(&registration.token_uri)
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh),
            ("client_id", registration.client_id.as_str()),
            ("client_secret", registration.client_secret.expose().as_str()),
        ])
        .send()
        .await
        .map_err(|e| Error::Http(format!("token refresh request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(classify_refresh_failure(status.as_u16(), &body));
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::TokenExchange(format!("invalid refresh response: {e}")))
}

/// 401/403, or a 400 with `invalid_grant`, means the refresh token is revoked
/// or expired and only a new consent can fix it. Anything else may be transient.
fn classify_refresh_failure(status: u16, body: &str) -> Error {
    let revoked = match status {
        401 | 403 => true,
        400 => body.contains("invalid_grant"),
        _ => false,
    };
    if revoked {
        Error::InvalidCredentials(format!("refresh token rejected ({status}): {body}"))
    } else {
        Error::TokenExchange(format!("token refresh returned {status}: {body}"))
    }
}
