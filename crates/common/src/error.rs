//! Configuration error types shared by the gateway and its libraries

use std::path::PathBuf;

use thiserror::Error;

/// Startup configuration errors.
///
/// Every variant is fatal: the process refuses to start rather than serve
/// requests with a partial configuration.
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration file not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Read a configuration artifact, mapping "does not exist" to `Missing`.
pub fn read_config_file(path: &std::path::Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::Missing(path.to_path_buf()),
        _ => Error::Io(e),
    })
}

/// Result alias using common Error
pub type Result<T> = std::result::Result<T, Error>;
