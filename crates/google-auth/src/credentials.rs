//! Per-user grant storage
//!
//! Each user's grant lives in its own JSON file, `token-{key}.json`, inside
//! the token directory. The key comes from `UserIdentity::storage_key`, so
//! two identities never share a file.
//!
//! Writes use a uniquely named temp file + rename, so a concurrent `load`
//! for the same user sees either the previous grant or the new one, never a
//! partial file. There is no store-wide lock: different users never touch
//! the same file, and same-user refreshes are serialized by `AuthClient`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::constants::TOKEN_FILE_PREFIX;
use crate::error::{Error, Result};
use crate::identity::{UserIdentity, is_hashed_key};
use crate::token::TokenResponse;

/// A user's authorization material.
///
/// `expiry_date` is a unix timestamp in milliseconds (absolute, not a delta),
/// computed from `TokenResponse.expires_in` at the time the response arrived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grant {
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub access_token: String,
    /// Durable proof of consent; absent until the first offline grant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub expiry_date: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_owned()
}

impl Grant {
    /// Build a grant from a token endpoint response received at `now_millis`.
    pub fn from_token_response(response: TokenResponse, now_millis: u64) -> Self {
        Self {
            token_type: response.token_type,
            access_token: response.access_token,
            refresh_token: response.refresh_token.filter(|t| !t.is_empty()),
            expiry_date: now_millis
                .saturating_add(response.expires_in.unwrap_or(0).saturating_mul(1000)),
            scope: response.scope,
        }
    }

    /// Apply a refresh response. The provider usually omits the refresh
    /// token, in which case the current one is kept.
    pub fn refreshed(&self, response: TokenResponse, now_millis: u64) -> Self {
        let mut next = Self::from_token_response(response, now_millis);
        if next.refresh_token.is_none() {
            next.refresh_token = self.refresh_token.clone();
        }
        if next.scope.is_none() {
            next.scope = self.scope.clone();
        }
        next
    }

    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Whether the access token is expired or will be within `skew_millis`.
    pub fn expires_within(&self, now_millis: u64, skew_millis: u64) -> bool {
        self.expiry_date <= now_millis.saturating_add(skew_millis)
    }
}

/// Current time as unix milliseconds.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Directory of per-user grant files.
pub struct TokenStore {
    dir: PathBuf,
}

impl TokenStore {
    /// Open the token directory, creating it if it doesn't exist yet.
    pub async fn open(dir: PathBuf) -> Result<Self> {
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| Error::Io(format!("creating token directory {}: {e}", dir.display())))?;
        info!(dir = %dir.display(), "token store ready");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding `user`'s grant.
    pub fn path_for(&self, user: &UserIdentity) -> PathBuf {
        self.dir
            .join(format!("{TOKEN_FILE_PREFIX}{}.json", user.storage_key()))
    }

    /// Read `user`'s grant.
    ///
    /// `Ok(None)` means the user never authorized (file does not exist).
    /// Any other read failure is `Io`, and an unreadable file is
    /// `CredentialParse`; neither is treated as "not authorized".
    pub async fn load(&self, user: &UserIdentity) -> Result<Option<Grant>> {
        let path = self.path_for(user);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(user = %user, "no stored grant");
                return Ok(None);
            }
            Err(e) => {
                return Err(Error::Io(format!(
                    "reading grant file {}: {e}",
                    path.display()
                )));
            }
        };

        let grant = serde_json::from_str(&contents).map_err(|e| {
            Error::CredentialParse(format!("parsing grant file {}: {e}", path.display()))
        })?;
        debug!(user = %user, "loaded stored grant");
        Ok(Some(grant))
    }

    /// Persist `user`'s grant, replacing any previous one.
    pub async fn save(&self, user: &UserIdentity, grant: &Grant) -> Result<()> {
        write_atomic(&self.path_for(user), grant).await?;
        debug!(user = %user, "persisted grant");
        Ok(())
    }

    /// Identities that currently have a grant file. Grants stored under a
    /// hashed key cannot be named and are left out; `count` includes them.
    pub async fn users(&self) -> Result<Vec<UserIdentity>> {
        let mut users = Vec::new();
        for key in self.stored_keys().await? {
            match UserIdentity::from_storage_key(&key) {
                Some(user) => users.push(user),
                None if is_hashed_key(&key) => {}
                None => warn!(key = %key, "ignoring unrecognized grant file"),
            }
        }
        users.sort();
        Ok(users)
    }

    /// Number of stored grants, including those under hashed keys.
    pub async fn count(&self) -> Result<usize> {
        let keys = self.stored_keys().await?;
        Ok(keys
            .iter()
            .filter(|key| is_hashed_key(key) || UserIdentity::from_storage_key(key).is_some())
            .count())
    }

    /// Storage keys of every `token-*.json` file in the directory.
    async fn stored_keys(&self) -> Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| Error::Io(format!("listing {}: {e}", self.dir.display())))?;

        let mut keys = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::Io(format!("listing {}: {e}", self.dir.display())))?
        {
            let name = entry.file_name();
            if let Some(key) = name
                .to_str()
                .and_then(|n| n.strip_prefix(TOKEN_FILE_PREFIX))
                .and_then(|n| n.strip_suffix(".json"))
            {
                keys.push(key.to_owned());
            }
        }
        Ok(keys)
    }
}

/// Write a grant to a file atomically.
///
/// The temp file lives in the same directory (so the rename cannot cross
/// filesystems) and carries a random suffix, so concurrent saves for the same
/// user never write into each other's temp file. Permissions are 0600 since
/// the file holds OAuth tokens.
async fn write_atomic(path: &Path, grant: &Grant) -> Result<()> {
    let json = serde_json::to_string_pretty(grant)
        .map_err(|e| Error::CredentialParse(format!("serializing grant: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("grant path has no parent directory".into()))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::Io("grant path has no file name".into()))?;

    let tmp_path = dir.join(format!(
        ".{file_name}.tmp.{}",
        uuid::Uuid::new_v4().as_simple()
    ));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp grant file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        if let Err(e) = tokio::fs::set_permissions(&tmp_path, perms).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(Error::Io(format!("setting grant file permissions: {e}")));
        }
    }

    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(Error::Io(format!("renaming temp grant file: {e}")));
    }

    Ok(())
}
