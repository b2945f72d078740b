//! User identity and its storage key
//!
//! The identity arrives as a URL path segment and is echoed back by the
//! provider as the `state` parameter, so it can contain anything. Storage
//! keys must be file-name safe, injective and case-insensitive-filesystem
//! safe: identities made only of `[a-z0-9_-]` are used verbatim, everything
//! else is lowercase-hex-encoded behind an `x.` prefix. Keys that would exceed
//! `MAX_KEY_LEN` become `h.` plus the hex SHA-256 of the identity. The `.`
//! never occurs in a verbatim key, so the three forms cannot collide, and no
//! form depends on letter case.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

const ENCODED_PREFIX: &str = "x.";
const HASHED_PREFIX: &str = "h.";

/// Longest storage key used as-is. Leaves room for the file prefix, the
/// `.json` suffix and the temp-file decoration under the usual 255-byte
/// file name limit.
pub const MAX_KEY_LEN: usize = 200;

/// Opaque, non-empty user name. The only partition key for credential state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserIdentity(String);

impl UserIdentity {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(Error::InvalidIdentity("identity must not be empty".into()));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Deterministic, collision-free key used to name this user's grant file.
    pub fn storage_key(&self) -> String {
        let key = if self.0.chars().all(is_key_safe) {
            self.0.clone()
        } else {
            format!("{ENCODED_PREFIX}{}", to_hex(self.0.as_bytes()))
        };
        if key.len() <= MAX_KEY_LEN {
            return key;
        }
        format!("{HASHED_PREFIX}{}", to_hex(&Sha256::digest(self.0.as_bytes())))
    }

    /// Inverse of `storage_key`. Returns `None` for hashed keys, which are
    /// one-way, and for keys this crate never produces.
    pub fn from_storage_key(key: &str) -> Option<Self> {
        if is_hashed_key(key) {
            return None;
        }
        match key.strip_prefix(ENCODED_PREFIX) {
            Some(encoded) => {
                let bytes = from_hex(encoded)?;
                let value = String::from_utf8(bytes).ok()?;
                Self::new(value).ok()
            }
            None if !key.is_empty() && key.chars().all(is_key_safe) => Some(Self(key.to_owned())),
            None => None,
        }
    }
}

/// Whether `key` is the hashed form produced for over-long identities.
pub fn is_hashed_key(key: &str) -> bool {
    key.strip_prefix(HASHED_PREFIX)
        .is_some_and(|hex| hex.len() == 64 && hex.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')))
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn from_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 || !hex.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}

fn is_key_safe(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_'
}

impl fmt::Display for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for UserIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
