//! Self-signed certificate generation for development and tests.
//!
//! Produces a throwaway CA plus server and client certificates so the auth
//! adapter can be exercised over real TLS without provisioned secrets.
//! Never use these in production.

use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair, SanType,
};

use crate::error::{TlsError, TlsResult};

/// PEM bundle of development certificates.
#[derive(Clone)]
pub struct CertificateBundle {
    /// CA certificate (PEM)
    pub ca_cert: String,
    /// CA private key (PEM)
    pub ca_key: String,
    /// Server certificate signed by the CA (PEM)
    pub server_cert: String,
    /// Server private key (PEM)
    pub server_key: String,
    /// Client certificate for mTLS (PEM)
    pub client_cert: String,
    /// Client private key (PEM)
    pub client_key: String,
}

fn generation_err(e: impl std::fmt::Display) -> TlsError {
    TlsError::Generation(e.to_string())
}

/// Generate a development CA, server and client certificate.
///
/// The server certificate carries SANs for `localhost` and `127.0.0.1` so
/// tonic clients can validate it when dialing loopback listeners.
pub fn generate_dev_certificates() -> TlsResult<CertificateBundle> {
    let mut ca_params = CertificateParams::default();
    ca_params.distinguished_name = DistinguishedName::new();
    ca_params
        .distinguished_name
        .push(DnType::CommonName, "Cerberus Development CA");
    ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);

    let ca_keypair = KeyPair::generate().map_err(generation_err)?;
    let ca_cert = ca_params.self_signed(&ca_keypair).map_err(generation_err)?;

    let mut server_params = CertificateParams::default();
    server_params.distinguished_name = DistinguishedName::new();
    server_params
        .distinguished_name
        .push(DnType::CommonName, "localhost");
    server_params.subject_alt_names.push(SanType::DnsName(
        "localhost".try_into().map_err(generation_err)?,
    ));
    server_params
        .subject_alt_names
        .push(SanType::IpAddress(std::net::IpAddr::V4(
            std::net::Ipv4Addr::new(127, 0, 0, 1),
        )));

    let server_keypair = KeyPair::generate().map_err(generation_err)?;
    let server_cert = server_params
        .signed_by(&server_keypair, &ca_cert, &ca_keypair)
        .map_err(generation_err)?;

    let mut client_params = CertificateParams::default();
    client_params.distinguished_name = DistinguishedName::new();
    client_params
        .distinguished_name
        .push(DnType::CommonName, "cerberus-client");

    let client_keypair = KeyPair::generate().map_err(generation_err)?;
    let client_cert = client_params
        .signed_by(&client_keypair, &ca_cert, &ca_keypair)
        .map_err(generation_err)?;

    Ok(CertificateBundle {
        ca_cert: ca_cert.pem(),
        ca_key: ca_keypair.serialize_pem(),
        server_cert: server_cert.pem(),
        server_key: server_keypair.serialize_pem(),
        client_cert: client_cert.pem(),
        client_key: client_keypair.serialize_pem(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_pem_bundle() {
        let bundle = generate_dev_certificates().unwrap();

        assert!(bundle.ca_cert.contains("BEGIN CERTIFICATE"));
        assert!(bundle.server_cert.contains("BEGIN CERTIFICATE"));
        assert!(bundle.client_cert.contains("BEGIN CERTIFICATE"));
        assert!(bundle.server_key.contains("PRIVATE KEY"));
    }
}
