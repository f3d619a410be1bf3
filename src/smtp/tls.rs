//! TLS client configuration for STARTTLS.

use super::client::Io;
use crate::error::SmtpError;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use std::sync::Arc;
use tokio_rustls::TlsConnector;

/// Build a connector trusting the webpki roots, or any certificate when
/// `skip_verify` is set.
pub(crate) fn connector(skip_verify: bool) -> Result<TlsConnector, SmtpError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(|e| SmtpError::Tls(format!("invalid TLS configuration: {}", e)))?;

    let config = if skip_verify {
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoCertVerifier { provider }))
            .with_no_client_auth()
    } else {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        builder.with_root_certificates(roots).with_no_client_auth()
    };

    Ok(TlsConnector::from(Arc::new(config)))
}

/// Run the client handshake over an already connected stream.
pub(crate) async fn handshake(
    stream: Box<dyn Io>,
    host: &str,
    skip_verify: bool,
) -> Result<Box<dyn Io>, SmtpError> {
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|e| SmtpError::Tls(format!("invalid server name '{}': {}", host, e)))?;

    let tls = connector(skip_verify)?
        .connect(server_name, stream)
        .await
        .map_err(|e| SmtpError::Tls(format!("TLS handshake failed: {}", e)))?;
    Ok(Box::new(tls))
}

/// Accepts any server certificate.
#[derive(Debug)]
struct NoCertVerifier {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for NoCertVerifier {
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
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connector_builds_with_and_without_verification() {
        assert!(connector(false).is_ok());
        assert!(connector(true).is_ok());
    }

    #[test]
    fn no_cert_verifier_lists_schemes() {
        let verifier = NoCertVerifier {
            provider: Arc::new(rustls::crypto::ring::default_provider()),
        };
        assert!(!verifier.supported_verify_schemes().is_empty());
    }

    #[tokio::test]
    async fn handshake_rejects_invalid_server_name() {
        let (client, _server) = tokio::io::duplex(64);
        let result = handshake(Box::new(client), "bad host name", false).await;
        assert!(matches!(result, Err(SmtpError::Tls(_))));
    }
}
