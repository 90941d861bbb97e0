//! Certificate retrieval over TLS
//!
//! Connects to `https://host[:port]`, completes a handshake while accepting whatever
//! the peer presents, and returns the peer's end-entity certificate. The certificate is
//! captured for trust configuration and is not validated.

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, ClientConnection, DigitallySignedStruct, SignatureScheme};
use std::net::TcpStream;
use std::sync::Arc;
use tracing::{debug, instrument};
use url::Url;

use crate::core::error::{BundleError, BundleResult};

#[derive(Debug)]
struct AcceptAnyCertificate;

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ED25519,
        ]
    }
}

/// Host and port to connect to for a certificate URL
pub fn endpoint(url: &str) -> BundleResult<(String, u16)> {
    let parsed = Url::parse(url).map_err(|e| BundleError::Tls {
        message: format!("invalid certificate url '{}': {}", url, e),
    })?;
    let host = parsed.host_str().ok_or_else(|| BundleError::Tls {
        message: format!("certificate url '{}' has no host", url),
    })?;
    let port = parsed.port_or_known_default().unwrap_or(443);
    Ok((host.to_string(), port))
}

/// End-entity certificate presented by the server at `url`, DER encoded
#[instrument]
pub fn fetch_peer_certificate(url: &str) -> BundleResult<Vec<u8>> {
    let (host, port) = endpoint(url)?;
    let server_name = ServerName::try_from(host.as_str())
        .map_err(|e| BundleError::Tls {
            message: format!("invalid server name '{}': {}", host, e),
        })?
        .to_owned();

    let config = ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate))
        .with_no_client_auth();
    let mut connection = ClientConnection::new(Arc::new(config), server_name)?;

    let mut socket = TcpStream::connect((host.as_str(), port)).map_err(|e| BundleError::Tls {
        message: format!("could not connect to {}:{}: {}", host, port, e),
    })?;
    while connection.is_handshaking() {
        connection.complete_io(&mut socket).map_err(|e| BundleError::Tls {
            message: format!("TLS handshake with {}:{} failed: {}", host, port, e),
        })?;
    }

    let certificates = connection.peer_certificates().unwrap_or_default();
    debug!(host = %host, port, certificates = certificates.len(), "Completed TLS handshake");
    certificates
        .first()
        .map(|certificate| certificate.as_ref().to_vec())
        .ok_or_else(|| BundleError::Tls {
            message: format!("{}:{} presented no certificates", host, port),
        })
}
