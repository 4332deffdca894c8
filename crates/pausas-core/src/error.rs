//! Core error type for config loading and worker plumbing.

use thiserror::Error;

/// Errors raised by the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuration file could not be read or written.
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file is present but not valid TOML.
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Configuration could not be serialized back to TOML.
    #[error("config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Convenience alias used across the core crate.
pub type Result<T> = std::result::Result<T, CoreError>;
