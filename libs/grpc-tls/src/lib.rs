//! Server transport credentials for the gRPC auth adapter.
//!
//! Loads a PEM certificate/key pair plus an optional client-CA bundle from
//! disk and turns them into a tonic [`ServerTlsConfig`]. The transport floor
//! is TLS 1.2: tonic's rustls backend refuses anything older, so no weaker
//! protocol can be negotiated regardless of peer configuration.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use tonic::transport::{Certificate, ClientTlsConfig, Identity, ServerTlsConfig};
use tracing::info;

pub mod cert_generation;
pub mod error;

pub use cert_generation::{generate_dev_certificates, CertificateBundle};
pub use error::{TlsError, TlsResult};

/// Server-side transport credentials loaded from PEM files.
///
/// Created once at startup and treated as immutable process-wide
/// configuration afterwards.
#[derive(Debug, Clone)]
pub struct ServerCredentials {
    cert_pem: String,
    key_pem: String,
    client_ca_pem: Option<String>,
}

impl ServerCredentials {
    /// Load server credentials from a certificate file, a private key file
    /// and an optional CA bundle used as the trust pool for verifying
    /// client certificates (mTLS).
    ///
    /// Any read failure is fatal. A CA bundle that reads successfully but
    /// holds zero parseable certificates is rejected with
    /// [`TlsError::EmptyCaBundle`] rather than silently producing a server
    /// with no trust anchors.
    pub fn load(
        cert_path: impl AsRef<Path>,
        key_path: impl AsRef<Path>,
        ca_path: Option<impl AsRef<Path>>,
    ) -> TlsResult<Self> {
        let cert_path = cert_path.as_ref();
        let key_path = key_path.as_ref();

        let cert_pem = fs::read_to_string(cert_path).map_err(|e| TlsError::CertificateRead {
            path: cert_path.to_path_buf(),
            source: e,
        })?;
        let key_pem = fs::read_to_string(key_path).map_err(|e| TlsError::KeyRead {
            path: key_path.to_path_buf(),
            source: e,
        })?;

        let client_ca_pem = match ca_path {
            Some(path) => Some(read_ca_bundle(path.as_ref())?),
            None => None,
        };

        info!(
            cert_path = %cert_path.display(),
            mtls_enabled = client_ca_pem.is_some(),
            "server TLS credentials loaded"
        );

        Ok(Self {
            cert_pem,
            key_pem,
            client_ca_pem,
        })
    }

    /// Build the tonic [`ServerTlsConfig`] for these credentials.
    ///
    /// When a CA bundle was loaded it becomes the client-certificate trust
    /// root, enabling mutual TLS; otherwise client verification is left to
    /// the transport defaults.
    pub fn build_server_tls(&self) -> ServerTlsConfig {
        let identity = Identity::from_pem(&self.cert_pem, &self.key_pem);
        let mut tls_config = ServerTlsConfig::new().identity(identity);

        if let Some(ref ca_pem) = self.client_ca_pem {
            tls_config = tls_config.client_ca_root(Certificate::from_pem(ca_pem));
            info!("mTLS enabled, client certificates verified against CA bundle");
        }

        tls_config
    }
}

/// Read a CA bundle and verify it contains at least one PEM certificate.
fn read_ca_bundle(path: &Path) -> TlsResult<String> {
    let ca_pem = fs::read_to_string(path).map_err(|e| TlsError::CaBundleRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let certs: Vec<_> = rustls_pemfile::certs(&mut Cursor::new(ca_pem.as_bytes()))
        .collect::<Result<_, _>>()
        .map_err(|e| TlsError::CaBundleParse {
            path: path.to_path_buf(),
            source: e,
        })?;

    if certs.is_empty() {
        return Err(TlsError::EmptyCaBundle {
            path: path.to_path_buf(),
        });
    }

    Ok(ca_pem)
}

/// Client-side credentials, used by tests and tooling that dial a server
/// built from [`ServerCredentials`].
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    server_ca_pem: String,
    identity_pem: Option<(String, String)>,
    domain_name: String,
}

impl ClientCredentials {
    /// Trust the given server CA and validate the server certificate
    /// against `domain_name`.
    pub fn new(server_ca_pem: impl Into<String>, domain_name: impl Into<String>) -> Self {
        Self {
            server_ca_pem: server_ca_pem.into(),
            identity_pem: None,
            domain_name: domain_name.into(),
        }
    }

    /// Attach a client certificate/key pair for mutual TLS.
    pub fn with_identity(mut self, cert_pem: impl Into<String>, key_pem: impl Into<String>) -> Self {
        self.identity_pem = Some((cert_pem.into(), key_pem.into()));
        self
    }

    /// Build the tonic [`ClientTlsConfig`].
    pub fn build_client_tls(&self) -> ClientTlsConfig {
        let mut tls_config = ClientTlsConfig::new()
            .ca_certificate(Certificate::from_pem(&self.server_ca_pem))
            .domain_name(&self.domain_name);

        if let Some((cert, key)) = &self.identity_pem {
            tls_config = tls_config.identity(Identity::from_pem(cert, key));
        }

        tls_config
    }
}

/// Paths to the PEM files backing [`ServerCredentials::load`].
#[derive(Debug, Clone)]
pub struct CredentialPaths {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub ca_path: Option<PathBuf>,
}

impl CredentialPaths {
    /// Load server credentials from these paths.
    pub fn load(&self) -> TlsResult<ServerCredentials> {
        ServerCredentials::load(&self.cert_path, &self.key_path, self.ca_path.as_ref())
    }
}
