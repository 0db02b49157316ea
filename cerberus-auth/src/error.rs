//! Error types for adapter startup and serving

use grpc_tls::TlsError;
use thiserror::Error;

/// Errors surfaced by the serve path. Credential and configuration failures
/// happen before any socket is bound; transport errors come from the serve
/// loop itself.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Invalid or inconsistent configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// TLS credential loading failed
    #[error("credential setup failed: {0}")]
    Credentials(#[from] TlsError),

    /// The underlying gRPC transport failed
    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// Listener setup failed
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
