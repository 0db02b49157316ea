use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use grpc_tls::CredentialPaths;
use serde::Deserialize;

use crate::error::ServerError;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// gRPC server configuration
    pub server: ServerConfig,
    /// TLS credential paths; optional in development
    pub tls: TlsSettings,
    /// Reason header value emitted by the built-in static checker
    pub static_checker_reason: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address, defaults to 0.0.0.0
    pub bind_address: String,
    /// gRPC port, defaults to 50051 when not set
    pub grpc_port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.grpc_port)
    }

    pub fn parse_socket_addr(&self) -> Result<SocketAddr, ServerError> {
        self.socket_addr()
            .parse()
            .map_err(|e| ServerError::Config(format!("invalid bind address: {e}")))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TlsSettings {
    /// Server certificate PEM path
    pub cert_path: Option<PathBuf>,
    /// Server private key PEM path
    pub key_path: Option<PathBuf>,
    /// Optional client CA bundle for mTLS
    pub ca_path: Option<PathBuf>,
}

impl TlsSettings {
    /// Resolve the configured paths, if any.
    ///
    /// TLS is all-or-nothing: a certificate without a key (or vice versa)
    /// is a configuration error, not a silent plaintext fallback.
    pub fn credential_paths(&self) -> Result<Option<CredentialPaths>, ServerError> {
        match (&self.cert_path, &self.key_path) {
            (Some(cert_path), Some(key_path)) => Ok(Some(CredentialPaths {
                cert_path: cert_path.clone(),
                key_path: key_path.clone(),
                ca_path: self.ca_path.clone(),
            })),
            (None, None) => Ok(None),
            _ => Err(ServerError::Config(
                "TLS_CERT_PATH and TLS_KEY_PATH must both be set to enable TLS".to_string(),
            )),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ServerError> {
        // SERVER_GRPC_PORT is optional; default to 50051
        let grpc_port = env::var("SERVER_GRPC_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(50051);

        let bind_address =
            env::var("SERVER_BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0".to_string());

        let tls = TlsSettings {
            cert_path: env::var("TLS_CERT_PATH").ok().map(PathBuf::from),
            key_path: env::var("TLS_KEY_PATH").ok().map(PathBuf::from),
            ca_path: env::var("TLS_CA_PATH").ok().map(PathBuf::from),
        };

        let static_checker_reason =
            env::var("STATIC_CHECKER_REASON").unwrap_or_else(|_| "static_allow".to_string());

        Ok(Self {
            server: ServerConfig {
                bind_address,
                grpc_port,
            },
            tls,
            static_checker_reason,
        })
    }
}
