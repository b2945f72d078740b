//! Consent URL construction
//!
//! Every consent URL asks for offline access and forces the consent prompt,
//! so each re-authorization returns a fresh refresh token. The user identity
//! travels as `state` and comes back unchanged on the callback.

use crate::error::{Error, Result};
use crate::registration::ClientRegistration;

/// Build the provider consent URL for `state` with the given scopes.
pub fn build_authorization_url(
    registration: &ClientRegistration,
    scopes: &[String],
    state: &str,
) -> Result<String> {
    if scopes.is_empty() {
        return Err(Error::AuthorizationUrl(
            "at least one scope is required".into(),
        ));
    }
    let scope = scopes.join(" ");

    let url = reqwest::Url::parse_with_params(
        &registration.auth_uri,
        &[
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("response_type", "code"),
            ("client_id", registration.client_id.as_str()),
            ("redirect_uri", registration.redirect_uri()),
            ("scope", scope.as_str()),
            ("state", state),
        ],
    )
    .map_err(|e| Error::AuthorizationUrl(format!("invalid auth_uri {}: {e}", registration.auth_uri)))?;

    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::registration_for;
    use std::collections::HashMap;

    fn query_of(url: &str) -> HashMap<String, String> {
        reqwest::Url::parse(url)
            .unwrap()
            .query_pairs()
            .into_owned()
            .collect()
    }

    fn scopes() -> Vec<String> {
        vec![crate::GMAIL_READONLY_SCOPE.to_owned()]
    }

    #[test]
    fn url_contains_required_params() {
        let reg = registration_for("https://oauth2.googleapis.com/token");
        let url = build_authorization_url(&reg, &scopes(), "alice").unwrap();

        assert!(url.starts_with("https://accounts.google.com/o/oauth2/auth?"));
        let q = query_of(&url);
        assert_eq!(q["access_type"], "offline");
        assert_eq!(q["prompt"], "consent");
        assert_eq!(q["response_type"], "code");
        assert_eq!(q["client_id"], reg.client_id);
        assert_eq!(q["redirect_uri"], "http://localhost:3000/oauth2callback");
        assert_eq!(q["scope"], crate::GMAIL_READONLY_SCOPE);
        assert_eq!(q["state"], "alice");
    }

    #[test]
    fn state_roundtrips_unusual_identities() {
        let reg = registration_for("https://oauth2.googleapis.com/token");
        for state in ["alice smith", "a&b=c", "ünïcødé/../x", "#fragment?"] {
            let url = build_authorization_url(&reg, &scopes(), state).unwrap();
            assert_eq!(query_of(&url)["state"], state, "url: {url}");
        }
    }

    #[test]
    fn multiple_scopes_are_space_separated() {
        let reg = registration_for("https://oauth2.googleapis.com/token");
        let scopes = vec!["openid".to_owned(), "email".to_owned()];
        let url = build_authorization_url(&reg, &scopes, "alice").unwrap();
        assert_eq!(query_of(&url)["scope"], "openid email");
    }

    #[test]
    fn empty_scopes_are_rejected() {
        let reg = registration_for("https://oauth2.googleapis.com/token");
        let result = build_authorization_url(&reg, &[], "alice");
        assert!(matches!(result, Err(Error::AuthorizationUrl(_))));
    }

    #[test]
    fn secret_never_appears_in_url() {
        let reg = registration_for("https://oauth2.googleapis.com/token");
        let url = build_authorization_url(&reg, &scopes(), "alice").unwrap();
        assert!(!url.contains(reg.client_secret.expose().as_str()));
    }
}
