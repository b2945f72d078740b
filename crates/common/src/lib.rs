//! Shared types for the check-in gateway crates

mod error;
mod secret;

pub use error::{Error, Result, read_config_file};
pub use secret::Secret;
