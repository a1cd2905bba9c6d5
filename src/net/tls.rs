//! TLS credentials and certificate loading.
//!
//! The credential is an explicit value: it is loaded once during startup and
//! passed to whichever listener needs it.

use std::path::{Path, PathBuf};

use axum_server::tls_rustls::RustlsConfig;
use thiserror::Error;
use tokio_rustls::TlsAcceptor;

/// Errors raised while loading credentials.
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("Certificate file not found: {0:?}")]
    CertificateNotFound(PathBuf),

    #[error("Private key file not found: {0:?}")]
    KeyNotFound(PathBuf),

    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No certificates in {0:?}")]
    NoCertificates(PathBuf),

    #[error("No private key in {0:?}")]
    NoPrivateKey(PathBuf),

    #[error("Rejected certificate/key pair: {0}")]
    Config(#[source] std::io::Error),
}

/// A certificate chain and private key ready for serving.
#[derive(Clone)]
pub struct TlsCredentials {
    config: RustlsConfig,
}

impl TlsCredentials {
    /// Load a PEM certificate chain and PEM private key.
    pub async fn load(cert_path: &Path, key_path: &Path) -> Result<Self, TlsError> {
        // Basic validation
        if !exists(cert_path).await {
            return Err(TlsError::CertificateNotFound(cert_path.to_path_buf()));
        }
        if !exists(key_path).await {
            return Err(TlsError::KeyNotFound(key_path.to_path_buf()));
        }

        let certs = read_certificates(cert_path).await?;
        let key = read_private_key(key_path).await?;

        let config = RustlsConfig::from_der(certs, key)
            .await
            .map_err(TlsError::Config)?;

        tracing::info!(
            cert_path = %cert_path.display(),
            key_path = %key_path.display(),
            "TLS credentials loaded"
        );

        Ok(Self { config })
    }

    /// Acceptor performing the server side of the handshake.
    pub fn acceptor(&self) -> TlsAcceptor {
        TlsAcceptor::from(self.config.get_inner())
    }
}

impl std::fmt::Debug for TlsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsCredentials").finish_non_exhaustive()
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

async fn read_pem(path: &Path) -> Result<Vec<u8>, TlsError> {
    tokio::fs::read(path).await.map_err(|source| TlsError::Read {
        path: path.to_path_buf(),
        source,
    })
}

async fn read_certificates(path: &Path) -> Result<Vec<Vec<u8>>, TlsError> {
    let pem = read_pem(path).await?;
    let certs = rustls_pemfile::certs(&mut pem.as_slice())
        .map(|cert| cert.map(|der| der.to_vec()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    if certs.is_empty() {
        return Err(TlsError::NoCertificates(path.to_path_buf()));
    }
    Ok(certs)
}

async fn read_private_key(path: &Path) -> Result<Vec<u8>, TlsError> {
    let pem = read_pem(path).await?;
    let key = rustls_pemfile::private_key(&mut pem.as_slice()).map_err(|source| TlsError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    key.map(|key| key.secret_der().to_vec())
        .ok_or_else(|| TlsError::NoPrivateKey(path.to_path_buf()))
}
