//! Per-user Google OAuth2 credential lifecycle
//!
//! Owns everything between "a named user wants to connect their mailbox" and
//! "here is a live, self-refreshing client for that user". Each user's
//! authorization state is partitioned by `UserIdentity`; no token ever crosses
//! from one identity to another.
//!
//! Credential flow:
//! 1. `ClientRegistration::load()` reads `credentials.json` once at startup
//! 2. `AuthFlow::begin_authorization()` builds the consent URL, `state` = identity
//! 3. `AuthFlow::complete_authorization()` exchanges the code via `token::exchange_code()`
//! 4. The grant is written by `TokenStore::save()` to `token-{key}.json`
//! 5. `ClientFactory::client_for()` restores the grant into an `AuthClient`
//! 6. `AuthClient::access_token()` refreshes on expiry and re-persists the grant

pub mod authorize;
pub mod client;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod flow;
pub mod identity;
pub mod registration;
pub mod token;

#[cfg(test)]
mod test_support;

pub use authorize::build_authorization_url;
pub use client::{AuthClient, ClientFactory};
pub use constants::*;
pub use credentials::{Grant, TokenStore};
pub use error::{Error, Result};
pub use flow::AuthFlow;
pub use identity::UserIdentity;
pub use registration::ClientRegistration;
pub use token::{TokenResponse, exchange_code, refresh_token};
