//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The OAuth client secret never lives in this file; it is read from the
//! `credentials.json` named by `auth.credentials_path` (or the
//! GOOGLE_CREDENTIALS_PATH env var).

use google_auth::GMAIL_READONLY_SCOPE;
use mailbox::gmail::GMAIL_API_BASE;
use mailbox::{MailboxSettings, RecordTemplate};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub mailbox: MailboxConfig,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// OAuth client and token storage settings
#[derive(Debug, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,
    /// Directory holding one `token-{key}.json` per user
    pub token_dir: PathBuf,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
}

/// Mailbox search and record placeholder settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MailboxConfig {
    pub api_base: String,
    pub subject_keyword: String,
    pub max_results: u32,
    pub location: String,
    pub qr_payload: String,
    pub link_base: String,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            api_base: GMAIL_API_BASE.to_owned(),
            subject_keyword: "registration".to_owned(),
            max_results: 10,
            location: "Main Hall".to_owned(),
            qr_payload: "sample-qr-payload".to_owned(),
            link_base: "https://mail.google.com/mail/u/0/#inbox/".to_owned(),
        }
    }
}

impl MailboxConfig {
    pub fn settings(&self) -> MailboxSettings {
        MailboxSettings {
            subject_keyword: self.subject_keyword.clone(),
            max_results: self.max_results,
            template: RecordTemplate {
                location: self.location.clone(),
                qr_payload: self.qr_payload.clone(),
                link_base: self.link_base.clone(),
            },
        }
    }
}

fn default_max_connections() -> usize {
    256
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("credentials.json")
}

fn default_scopes() -> Vec<String> {
    vec![GMAIL_READONLY_SCOPE.to_owned()]
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = common::read_config_file(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if let Ok(p) = std::env::var("GOOGLE_CREDENTIALS_PATH") {
            config.auth.credentials_path = PathBuf::from(p);
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        if self.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        if self.auth.scopes.is_empty() || self.auth.scopes.iter().any(|s| s.trim().is_empty()) {
            return Err(common::Error::Config(
                "auth.scopes must list at least one non-empty scope".into(),
            ));
        }

        if !self.mailbox.api_base.starts_with("http://")
            && !self.mailbox.api_base.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "api_base must start with http:// or https://, got: {}",
                self.mailbox.api_base
            )));
        }

        if self.mailbox.subject_keyword.trim().is_empty() {
            return Err(common::Error::Config(
                "subject_keyword must not be empty".into(),
            ));
        }

        // Gmail caps messages.list at 500
        if self.mailbox.max_results == 0 || self.mailbox.max_results > 500 {
            return Err(common::Error::Config(format!(
                "max_results must be between 1 and 500, got: {}",
                self.mailbox.max_results
            )));
        }

        Ok(())
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("checkin-gateway.toml")
    }
}
