//! Google OAuth defaults
//!
//! Endpoint values are only fallbacks: `credentials.json` normally carries
//! `auth_uri` and `token_uri` and those win.

/// Consent screen endpoint
pub const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";

/// Token endpoint for code exchange and token refresh
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Read-only mailbox access, the only scope the check-in flow needs.
pub const GMAIL_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";

/// Access tokens expiring within this window are refreshed before use.
pub const REFRESH_SKEW_MILLIS: u64 = 60_000;

/// File name prefix for per-user grant files (`token-{key}.json`).
pub const TOKEN_FILE_PREFIX: &str = "token-";
