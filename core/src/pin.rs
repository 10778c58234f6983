//! Certificate pinning for the management API's TLS endpoint.
//!
//! Outline servers present a self-signed certificate whose SHA-256
//! fingerprint is handed out together with the API URL. The verifier accepts
//! a peer only when the SHA-256 of its end-entity DER certificate equals that
//! fingerprint. With TLS verification enabled the WebPKI chain must also
//! validate; with it disabled the pin alone authenticates the peer.
//! Handshake signatures are always checked against the presented key.

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::WebPkiServerVerifier;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, Error as TlsError, RootCertStore, SignatureScheme};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

/// SHA-256 of a DER certificate.
pub fn certificate_fingerprint(cert: &CertificateDer<'_>) -> [u8; 32] {
    let hash = Sha256::digest(cert.as_ref());
    let mut out = [0u8; 32];
    out.copy_from_slice(&hash);
    out
}

#[derive(Debug)]
pub struct FingerprintVerifier {
    expected: [u8; 32],
    provider: Arc<CryptoProvider>,
    /// Present only when TLS verification is enabled.
    chain: Option<Arc<WebPkiServerVerifier>>,
}

impl FingerprintVerifier {
    pub fn new(
        expected: [u8; 32],
        provider: Arc<CryptoProvider>,
        verify_chain: bool,
    ) -> Result<Self, TlsError> {
        let chain = if verify_chain {
            let roots = RootCertStore {
                roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
            };
            let verifier = WebPkiServerVerifier::builder_with_provider(Arc::new(roots), provider.clone())
                .build()
                .map_err(|e| TlsError::General(e.to_string()))?;
            Some(verifier)
        } else {
            None
        };

        Ok(Self {
            expected,
            provider,
            chain,
        })
    }

    fn check_pin(&self, end_entity: &CertificateDer<'_>) -> Result<(), TlsError> {
        let presented = certificate_fingerprint(end_entity);
        if presented == self.expected {
            debug!("server certificate matches pinned fingerprint");
            Ok(())
        } else {
            warn!(
                presented = %hex::encode(&presented[..8]),
                expected = %hex::encode(&self.expected[..8]),
                "server certificate does not match pinned fingerprint"
            );
            Err(TlsError::General(format!(
                "certificate fingerprint mismatch: presented {}",
                hex::encode_upper(presented)
            )))
        }
    }
}

impl ServerCertVerifier for FingerprintVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, TlsError> {
        self.check_pin(end_entity)?;
        match &self.chain {
            Some(chain) => {
                chain.verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)
            }
            None => Ok(ServerCertVerified::assertion()),
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider.signature_verification_algorithms.supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> Arc<CryptoProvider> {
        Arc::new(rustls::crypto::ring::default_provider())
    }

    fn verify(verifier: &FingerprintVerifier, cert: &CertificateDer<'_>) -> Result<ServerCertVerified, TlsError> {
        let name = ServerName::try_from("vpn.example").unwrap();
        verifier.verify_server_cert(cert, &[], &name, &[], UnixTime::now())
    }

    #[test]
    fn accepts_matching_fingerprint_without_chain() {
        let cert = CertificateDer::from(vec![0x30, 0x03, 0x02, 0x01, 0x01]);
        let verifier = FingerprintVerifier::new(certificate_fingerprint(&cert), provider(), false).unwrap();
        assert!(verify(&verifier, &cert).is_ok());
    }

    #[test]
    fn rejects_other_certificate() {
        let pinned = CertificateDer::from(vec![1, 2, 3]);
        let presented = CertificateDer::from(vec![4, 5, 6]);
        let verifier = FingerprintVerifier::new(certificate_fingerprint(&pinned), provider(), false).unwrap();
        let err = verify(&verifier, &presented).unwrap_err();
        assert!(err.to_string().contains("fingerprint mismatch"));
    }

    #[test]
    fn pin_is_checked_before_chain() {
        let pinned = CertificateDer::from(vec![1, 2, 3]);
        let presented = CertificateDer::from(vec![9, 9, 9]);
        let verifier = FingerprintVerifier::new(certificate_fingerprint(&pinned), provider(), true).unwrap();
        let err = verify(&verifier, &presented).unwrap_err();
        assert!(err.to_string().contains("fingerprint mismatch"));
    }

    #[test]
    fn chain_failure_rejects_pinned_garbage_certificate() {
        let cert = CertificateDer::from(vec![1, 2, 3]);
        let verifier = FingerprintVerifier::new(certificate_fingerprint(&cert), provider(), true).unwrap();
        assert!(verify(&verifier, &cert).is_err());
    }

    #[test]
    fn fingerprint_is_sha256_of_der() {
        let cert = CertificateDer::from(b"test".to_vec());
        assert_eq!(
            hex::encode(certificate_fingerprint(&cert)),
            "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
        );
    }
}
