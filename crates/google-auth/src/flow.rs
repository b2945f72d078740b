//! Authorization flow controller
//!
//! Per-identity state machine: absent → pending (consent URL issued) →
//! granted (refresh token stored). There is no revoke, so no way back.
//!
//! The callback's `state` is taken at face value as the identity. Nothing
//! records which consent URLs were issued; the provider-issued code is the
//! secret that proves consent, and a code can only be redeemed once.

use std::sync::Arc;

use tracing::info;

use crate::client::{AuthClient, ClientFactory};
use crate::error::{Error, Result};
use crate::identity::UserIdentity;

/// Drives consent, code exchange and the "is this user connected" check.
pub struct AuthFlow {
    factory: Arc<ClientFactory>,
    scopes: Vec<String>,
}

impl AuthFlow {
    pub fn new(factory: Arc<ClientFactory>, scopes: Vec<String>) -> Self {
        Self { factory, scopes }
    }

    pub fn factory(&self) -> &Arc<ClientFactory> {
        &self.factory
    }

    /// Consent URL for `user`, carrying the identity as `state`.
    pub async fn begin_authorization(&self, user: &str) -> Result<String> {
        let user = UserIdentity::new(user)?;
        let client = self.factory.client_for(&user).await?;
        let url = client.authorization_url(&self.scopes, user.as_str())?;
        info!(user = %user, "authorization started");
        Ok(url)
    }

    /// Redeem a callback's `code` for the identity named by `state`.
    ///
    /// Missing or empty parameters fail before any client or store access.
    /// The grant is persisted under `state` whether or not a consent URL was
    /// ever issued for it. An exchange that yields no refresh token, with
    /// none already held, fails with `TokenExchange` and stores nothing.
    pub async fn complete_authorization(
        &self,
        code: Option<&str>,
        state: Option<&str>,
    ) -> Result<UserIdentity> {
        let code = non_empty(code).ok_or(Error::MissingParameter("code"))?;
        let state = non_empty(state).ok_or(Error::MissingParameter("state"))?;
        let user = UserIdentity::new(state)?;

        let client = self.factory.client_for(&user).await?;
        let grant = client.exchange_code(code).await?;

        let client = self.factory.adopt(client).await;
        if let Err(e) = client.replace_grant(grant).await {
            self.factory.release_if_blank(&client).await;
            return Err(e);
        }
        info!(user = %user, "authorization completed");
        Ok(user)
    }

    /// Whether `user` holds a durable grant (non-empty refresh token).
    pub async fn is_authorized(&self, user: &UserIdentity) -> Result<bool> {
        let client = self.factory.client_for(user).await?;
        Ok(client.has_refresh_token().await)
    }

    /// The user's client, only if it holds a durable grant.
    pub async fn authorized_client(&self, user: &UserIdentity) -> Result<Option<Arc<AuthClient>>> {
        let client = self.factory.client_for(user).await?;
        if client.has_refresh_token().await {
            Ok(Some(client))
        } else {
            Ok(None)
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
