//! Error types for TLS credential loading

use std::path::PathBuf;
use thiserror::Error;

/// Result type for TLS credential operations
pub type TlsResult<T> = std::result::Result<T, TlsError>;

/// Errors that can occur while building server transport credentials
#[derive(Debug, Error)]
pub enum TlsError {
    /// Certificate file could not be read from disk
    #[error("failed to read certificate from {path}: {source}")]
    CertificateRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Private key file could not be read from disk
    #[error("failed to read private key from {path}: {source}")]
    KeyRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// CA bundle file could not be read from disk
    #[error("failed to read CA bundle from {path}: {source}")]
    CaBundleRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// CA bundle was readable but held no parseable certificates
    #[error("CA bundle at {path} contains no valid PEM certificates")]
    EmptyCaBundle { path: PathBuf },

    /// CA bundle could not be parsed as PEM
    #[error("failed to parse CA bundle at {path}: {source}")]
    CaBundleParse {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Certificate generation failed (dev/test certificates)
    #[error("certificate generation failed: {0}")]
    Generation(String),
}
