//! # Certificate Resolution
//!
//! Supplies the encoded bytes and identifying fields of a trusted certificate.
//!
//! ## Sources
//! Tried in order, the first available one wins:
//! 1. A certificate file shipped with the bundle sources (PEM or DER)
//! 2. The certificate's `url`, by TLS handshake with the server
//! 3. Inline `encodedData` (base64 DER, or PEM)
//!
//! A certificate with none of these, or whose data cannot be decoded, fails the build.

pub mod tls;
pub mod x509;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::bundle::TrustedCert;
use crate::core::error::{BundleError, BundleResult};

/// Identifying fields and encoding of one certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateData {
    pub issuer_name: String,
    pub serial_number: String,
    pub subject_name: String,
    /// DER encoding
    pub encoded: Vec<u8>,
}

impl CertificateData {
    /// Read the identifying fields from a DER encoded certificate
    pub fn from_der(name: &str, der: Vec<u8>) -> BundleResult<Self> {
        let info = x509::parse_certificate(&der)
            .map_err(|e| BundleError::certificate(name, format!("malformed certificate: {}", e)))?;
        Ok(Self {
            issuer_name: info.issuer_name,
            serial_number: info.serial_number,
            subject_name: info.subject_name,
            encoded: der,
        })
    }
}

/// Where a certificate's bytes come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateSource<'a> {
    File(&'a Path),
    Url(&'a str),
    Inline(&'a str),
}

impl<'a> CertificateSource<'a> {
    /// Highest precedence source available for `cert`
    pub fn select(cert: &'a TrustedCert, file: Option<&'a Path>) -> Option<Self> {
        file.map(Self::File)
            .or_else(|| cert.url.as_deref().map(Self::Url))
            .or_else(|| cert.encoded_data.as_deref().map(Self::Inline))
    }
}

pub trait CertificateResolver: Send + Sync {
    /// Certificate data for `cert`; `file` is the certificate file shipped with the sources
    fn resolve(&self, cert: &TrustedCert, file: Option<&Path>) -> BundleResult<CertificateData>;
}

/// Reads files, performs TLS handshakes and decodes inline data
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardCertificateResolver;

impl CertificateResolver for StandardCertificateResolver {
    fn resolve(&self, cert: &TrustedCert, file: Option<&Path>) -> BundleResult<CertificateData> {
        let name = cert.name.as_str();
        let source = CertificateSource::select(cert, file).ok_or_else(|| {
            BundleError::certificate(name, "no certificate file, url or encodedData available")
        })?;
        debug!(certificate = %name, source = ?source, "Resolving certificate");

        let der = match source {
            CertificateSource::File(path) => read_file(name, path)?,
            CertificateSource::Url(url) => tls::fetch_peer_certificate(url)
                .map_err(|e| BundleError::certificate(name, e.to_string()))?,
            CertificateSource::Inline(data) => decode_inline(name, data)?,
        };
        CertificateData::from_der(name, der)
    }
}

/// Remembers certificates retrieved by URL, so each server is contacted once per run
#[derive(Debug, Default)]
pub struct CachingCertificateResolver<R> {
    inner: R,
    by_url: Mutex<HashMap<String, CertificateData>>,
}

impl<R: CertificateResolver> CachingCertificateResolver<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            by_url: Mutex::new(HashMap::new()),
        }
    }
}

impl<R: CertificateResolver> CertificateResolver for CachingCertificateResolver<R> {
    fn resolve(&self, cert: &TrustedCert, file: Option<&Path>) -> BundleResult<CertificateData> {
        let Some(CertificateSource::Url(url)) = CertificateSource::select(cert, file) else {
            return self.inner.resolve(cert, file);
        };
        if let Some(cached) = self.by_url.lock().get(url).cloned() {
            debug!(certificate = %cert.name, url = %url, "Using cached certificate");
            return Ok(cached);
        }
        let data = self.inner.resolve(cert, file)?;
        self.by_url.lock().insert(url.to_string(), data.clone());
        Ok(data)
    }
}

fn read_file(name: &str, path: &Path) -> BundleResult<Vec<u8>> {
    let bytes = std::fs::read(path).map_err(|e| {
        BundleError::certificate(name, format!("cannot read {}: {}", path.display(), e))
    })?;
    if is_pem(&bytes) {
        first_pem_certificate(name, &bytes)
    } else {
        Ok(bytes)
    }
}

fn decode_inline(name: &str, data: &str) -> BundleResult<Vec<u8>> {
    if is_pem(data.as_bytes()) {
        return first_pem_certificate(name, data.as_bytes());
    }
    let compact: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(compact)
        .map_err(|e| BundleError::certificate(name, format!("invalid base64 encodedData: {}", e)))
}

fn is_pem(bytes: &[u8]) -> bool {
    bytes
        .windows(b"-----BEGIN".len())
        .any(|window| window == b"-----BEGIN")
}

fn first_pem_certificate(name: &str, mut pem: &[u8]) -> BundleResult<Vec<u8>> {
    let certificates = rustls_pemfile::certs(&mut pem)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| BundleError::certificate(name, format!("failed to parse PEM: {}", e)))?;
    certificates
        .first()
        .map(|certificate| certificate.as_ref().to_vec())
        .ok_or_else(|| BundleError::certificate(name, "PEM data contains no certificate"))
}
