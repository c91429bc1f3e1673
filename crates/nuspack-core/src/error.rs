//! Domain-specific errors for package builds.

use nuspack_schema::KeyError;
use thiserror::Error;

/// Fatal build errors. Every variant aborts the current build; the only
/// recoverable failure class (app.xml descriptor parsing) has its own
/// error type in [`crate::app_xml`] and never reaches this enum.
#[derive(Error, Debug)]
pub enum PackError {
    /// Missing input directories, malformed keys, or a mandatory content
    /// rule with no source file. Raised before any output is written.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Key material of the wrong shape or a failing random source.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Read/write failure on a content or output file. Not retried;
    /// partial output is discarded by the orchestrator.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal digest/result-aggregation failure. This is a producer-side
    /// stream error, not a verification mismatch.
    #[error("integrity error: {0}")]
    Integrity(String),
}

impl From<KeyError> for PackError {
    fn from(err: KeyError) -> Self {
        Self::Crypto(err.to_string())
    }
}
