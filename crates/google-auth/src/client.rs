//! Per-user authorization clients
//!
//! `ClientFactory` hands out one `AuthClient` per `UserIdentity`, restoring
//! the stored grant on first use. Only clients that hold a grant are cached,
//! so lookups for names that never authorized leave nothing behind. There is
//! no process-wide "current client": every cache entry, grant and refresh is
//! keyed by identity.
//!
//! `AuthClient::access_token` is the only path the mailbox code uses to get a
//! bearer token. It refreshes when the token is within `REFRESH_SKEW_MILLIS`
//! of expiry and writes the rotated grant back through the `TokenStore`, so a
//! refresh survives a restart.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::authorize::build_authorization_url;
use crate::constants::REFRESH_SKEW_MILLIS;
use crate::credentials::{Grant, TokenStore, now_millis};
use crate::error::{Error, Result};
use crate::identity::UserIdentity;
use crate::registration::ClientRegistration;
use crate::token;

/// OAuth2 client bound to one user.
///
/// The grant sits behind a `Mutex` held across the refresh call, so
/// concurrent requests for the same user trigger at most one refresh.
pub struct AuthClient {
    user: UserIdentity,
    registration: Arc<ClientRegistration>,
    store: Arc<TokenStore>,
    http: reqwest::Client,
    grant: Mutex<Option<Grant>>,
}

impl AuthClient {
    fn new(
        user: UserIdentity,
        registration: Arc<ClientRegistration>,
        store: Arc<TokenStore>,
        http: reqwest::Client,
        grant: Option<Grant>,
    ) -> Self {
        Self {
            user,
            registration,
            store,
            http,
            grant: Mutex::new(grant),
        }
    }

    pub fn user(&self) -> &UserIdentity {
        &self.user
    }

    /// Snapshot of the installed grant, if any.
    pub async fn grant(&self) -> Option<Grant> {
        self.grant.lock().await.clone()
    }

    pub async fn has_refresh_token(&self) -> bool {
        self.grant
            .lock()
            .await
            .as_ref()
            .is_some_and(Grant::has_refresh_token)
    }

    /// Consent URL for this client's registration.
    pub fn authorization_url(&self, scopes: &[String], state: &str) -> Result<String> {
        build_authorization_url(&self.registration, scopes, state)
    }

    /// Exchange a one-time code for a grant. Does not install or persist it.
    pub async fn exchange_code(&self, code: &str) -> Result<Grant> {
        let response = token::exchange_code(&self.http, &self.registration, code).await?;
        Ok(Grant::from_token_response(response, now_millis()))
    }

    /// Replace the in-memory grant without persisting it.
    pub async fn install(&self, grant: Grant) {
        *self.grant.lock().await = Some(grant);
    }

    /// Persist `grant` and install it, under the same lock a refresh holds,
    /// so disk and memory always end on the same grant.
    ///
    /// A grant without a refresh token keeps the one already installed. If
    /// there is none, nothing is written and the call fails with
    /// `TokenExchange`: the provider only re-issues a refresh token after the
    /// user removes the app's access and consents again.
    pub async fn replace_grant(&self, mut grant: Grant) -> Result<()> {
        let mut slot = self.grant.lock().await;
        if !grant.has_refresh_token() {
            let previous = slot
                .as_ref()
                .and_then(|g| g.refresh_token.clone())
                .filter(|t| !t.is_empty());
            warn!(
                user = %self.user,
                kept_previous = previous.is_some(),
                "token exchange returned no refresh token"
            );
            grant.refresh_token = Some(previous.ok_or_else(|| {
                Error::TokenExchange(format!(
                    "no refresh token issued for {}; remove the app's access \
                     in the Google account and authorize again",
                    self.user
                ))
            })?);
        }

        self.store.save(&self.user, &grant).await?;
        *slot = Some(grant);
        Ok(())
    }

    /// A bearer token that is valid for at least `REFRESH_SKEW_MILLIS`.
    ///
    /// Refreshes first when needed. A refresh the provider rejects surfaces
    /// as `InvalidCredentials`; the user has to consent again.
    pub async fn access_token(&self) -> Result<String> {
        let mut slot = self.grant.lock().await;
        let grant = slot.as_mut().ok_or_else(|| {
            Error::InvalidCredentials(format!("no grant installed for {}", self.user))
        })?;

        let now = now_millis();
        if !grant.expires_within(now, REFRESH_SKEW_MILLIS) {
            return Ok(grant.access_token.clone());
        }

        let refresh = match grant.refresh_token.as_deref() {
            Some(r) if !r.is_empty() => r.to_owned(),
            _ => {
                return Err(Error::InvalidCredentials(format!(
                    "access token for {} expired and no refresh token is stored",
                    self.user
                )));
            }
        };

        debug!(user = %self.user, "access token expiring, refreshing");
        let response = token::refresh_token(&self.http, &self.registration, &refresh).await?;
        let refreshed = grant.refreshed(response, now);

        if let Err(e) = self.store.save(&self.user, &refreshed).await {
            warn!(user = %self.user, error = %e, "failed to persist refreshed grant");
        }

        let access = refreshed.access_token.clone();
        *grant = refreshed;
        info!(user = %self.user, "access token refreshed");
        Ok(access)
    }
}

/// Builds and caches `AuthClient`s, one per identity.
pub struct ClientFactory {
    registration: Arc<ClientRegistration>,
    store: Arc<TokenStore>,
    http: reqwest::Client,
    clients: RwLock<HashMap<UserIdentity, Arc<AuthClient>>>,
}

impl ClientFactory {
    pub fn new(
        registration: Arc<ClientRegistration>,
        store: Arc<TokenStore>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            registration,
            store,
            http,
            clients: RwLock::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    pub fn registration(&self) -> &Arc<ClientRegistration> {
        &self.registration
    }

    /// The client for `user`, with any stored grant installed.
    ///
    /// Succeeds for users who never authorized: the client has no grant and
    /// is not cached. Fails only when the store cannot be read. Makes no
    /// network calls.
    pub async fn client_for(&self, user: &UserIdentity) -> Result<Arc<AuthClient>> {
        if let Some(client) = self.clients.read().await.get(user) {
            return Ok(client.clone());
        }

        let Some(grant) = self.store.load(user).await? else {
            debug!(user = %user, "no stored grant, client not cached");
            return Ok(Arc::new(self.blank_client(user)));
        };
        let client = Arc::new(AuthClient::new(
            user.clone(),
            self.registration.clone(),
            self.store.clone(),
            self.http.clone(),
            Some(grant),
        ));
        let client = self.adopt(client).await;
        debug!(user = %user, "client restored");
        Ok(client)
    }

    /// Cache `client` under its identity and return the cached client.
    ///
    /// If another client for the same identity is already cached, that one
    /// wins and `client` is discarded.
    pub async fn adopt(&self, client: Arc<AuthClient>) -> Arc<AuthClient> {
        let mut clients = self.clients.write().await;
        clients.entry(client.user.clone()).or_insert(client).clone()
    }

    /// Uncache `client` if it is the cached entry and still holds no grant.
    pub async fn release_if_blank(&self, client: &Arc<AuthClient>) {
        let mut clients = self.clients.write().await;
        let cached = clients
            .get(&client.user)
            .is_some_and(|c| Arc::ptr_eq(c, client));
        if cached && client.grant.lock().await.is_none() {
            clients.remove(&client.user);
        }
    }

    fn blank_client(&self, user: &UserIdentity) -> AuthClient {
        AuthClient::new(
            user.clone(),
            self.registration.clone(),
            self.store.clone(),
            self.http.clone(),
            None,
        )
    }

    /// Drop the cached client for `user`. The next `client_for` re-reads the store.
    pub async fn evict(&self, user: &UserIdentity) -> bool {
        self.clients.write().await.remove(user).is_some()
    }

    /// Number of cached clients.
    pub async fn cached(&self) -> usize {
        self.clients.read().await.len()
    }
}
