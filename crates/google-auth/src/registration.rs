//! Application client registration (`credentials.json`)
//!
//! Google hands out the registration as a JSON document with the client
//! under either a `web` or an `installed` key. It is read once at startup,
//! validated, and shared read-only by every user's client. Any failure here
//! is a startup failure, so errors use the shared configuration error type.

use std::path::Path;

use common::Secret;
use serde::Deserialize;
use tracing::info;

use crate::constants::{DEFAULT_AUTH_URI, DEFAULT_TOKEN_URI};

#[derive(Deserialize)]
struct CredentialsFile {
    web: Option<RawRegistration>,
    installed: Option<RawRegistration>,
}

#[derive(Deserialize)]
struct RawRegistration {
    client_id: String,
    client_secret: Secret<String>,
    #[serde(default)]
    redirect_uris: Vec<String>,
    auth_uri: Option<String>,
    token_uri: Option<String>,
}

/// The application's own OAuth2 identity. Immutable for the process lifetime.
#[derive(Debug)]
pub struct ClientRegistration {
    pub client_id: String,
    pub client_secret: Secret<String>,
    /// Registered callback URLs; the first one is used for every flow.
    pub redirect_uris: Vec<String>,
    pub auth_uri: String,
    pub token_uri: String,
}

impl ClientRegistration {
    /// Load and validate the registration from a `credentials.json` file.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = common::read_config_file(path)?;
        let registration = Self::from_json(&contents)?;
        info!(
            path = %path.display(),
            client_id = %registration.client_id,
            redirect_uri = %registration.redirect_uri(),
            "loaded client registration"
        );
        Ok(registration)
    }

    /// Parse a registration document already in memory.
    pub fn from_json(json: &str) -> common::Result<Self> {
        let file: CredentialsFile = serde_json::from_str(json)
            .map_err(|e| common::Error::Config(format!("malformed credentials.json: {e}")))?;

        let raw = file.web.or(file.installed).ok_or_else(|| {
            common::Error::Config("credentials.json has neither a `web` nor an `installed` client".into())
        })?;

        if raw.client_id.trim().is_empty() {
            return Err(common::Error::Config("client_id must not be empty".into()));
        }
        if raw.client_secret.is_blank() {
            return Err(common::Error::Config("client_secret must not be empty".into()));
        }
        if raw.redirect_uris.is_empty() {
            return Err(common::Error::Config(
                "at least one redirect URI must be registered".into(),
            ));
        }

        let auth_uri = raw.auth_uri.unwrap_or_else(|| DEFAULT_AUTH_URI.to_owned());
        let token_uri = raw.token_uri.unwrap_or_else(|| DEFAULT_TOKEN_URI.to_owned());
        for (field, value) in [("auth_uri", &auth_uri), ("token_uri", &token_uri)] {
            if !value.starts_with("http://") && !value.starts_with("https://") {
                return Err(common::Error::Config(format!(
                    "{field} must start with http:// or https://, got: {value}"
                )));
            }
        }

        Ok(Self {
            client_id: raw.client_id,
            client_secret: raw.client_secret,
            redirect_uris: raw.redirect_uris,
            auth_uri,
            token_uri,
        })
    }

    /// Redirect URI sent with both the consent URL and the code exchange.
    /// They must match or the provider rejects the exchange.
    pub fn redirect_uri(&self) -> &str {
        self.redirect_uris.first().map(String::as_str).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn web_json() -> &'static str {
        r#"{
            "web": {
                "client_id": "1234.apps.googleusercontent.com",
                "project_id": "checkin",
                "auth_uri": "https://accounts.google.com/o/oauth2/auth",
                "token_uri": "https://oauth2.googleapis.com/token",
                "client_secret": "GOCSPX-abc",
                "redirect_uris": ["http://localhost:3000/oauth2callback", "http://localhost:3000/callback"]
            }
        }"#
    }

    #[test]
    fn parses_web_client() {
        let reg = ClientRegistration::from_json(web_json()).unwrap();
        assert_eq!(reg.client_id, "1234.apps.googleusercontent.com");
        assert_eq!(reg.client_secret.expose(), "GOCSPX-abc");
        assert_eq!(reg.redirect_uri(), "http://localhost:3000/oauth2callback");
        assert_eq!(reg.token_uri, "https://oauth2.googleapis.com/token");
    }

    #[test]
    fn parses_installed_client_with_default_endpoints() {
        let json = r#"{"installed": {
            "client_id": "desktop-id",
            "client_secret": "desktop-secret",
            "redirect_uris": ["http://localhost"]
        }}"#;
        let reg = ClientRegistration::from_json(json).unwrap();
        assert_eq!(reg.auth_uri, DEFAULT_AUTH_URI);
        assert_eq!(reg.token_uri, DEFAULT_TOKEN_URI);
    }

    #[test]
    fn debug_output_hides_client_secret() {
        let reg = ClientRegistration::from_json(web_json()).unwrap();
        let debug = format!("{reg:?}");
        assert!(!debug.contains("GOCSPX-abc"), "secret leaked: {debug}");
    }

    #[test]
    fn rejects_document_without_client() {
        let result = ClientRegistration::from_json(r#"{"other": {}}"#);
        assert!(matches!(result, Err(common::Error::Config(_))));
    }

    #[test]
    fn rejects_missing_redirect_uris() {
        let json = r#"{"web": {"client_id": "id", "client_secret": "s"}}"#;
        let err = ClientRegistration::from_json(json).unwrap_err();
        assert!(err.to_string().contains("redirect URI"), "got: {err}");
    }

    #[test]
    fn rejects_non_http_token_uri() {
        let json = r#"{"web": {
            "client_id": "id", "client_secret": "s",
            "redirect_uris": ["http://localhost/cb"],
            "token_uri": "ftp://example.com/token"
        }}"#;
        let err = ClientRegistration::from_json(json).unwrap_err();
        assert!(err.to_string().contains("token_uri"), "got: {err}");
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            ClientRegistration::from_json("not json {"),
            Err(common::Error::Config(_))
        ));
    }

    #[test]
    fn missing_file_is_reported_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        let result = ClientRegistration::load(&dir.path().join("credentials.json"));
        assert!(matches!(result, Err(common::Error::Missing(_))));
    }

    #[test]
    fn load_reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, web_json()).unwrap();

        let reg = ClientRegistration::load(&path).unwrap();
        assert_eq!(reg.redirect_uris.len(), 2);
    }
}
