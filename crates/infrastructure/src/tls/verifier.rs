use ferrous_doh_application::services::{
    classify_certificate, CertificatePinValidator, CertificateStatusTracker,
};
use ferrous_doh_domain::{CertificateStatus, DomainError};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::WebPkiServerVerifier;
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{
    CertificateError, ClientConfig, DigitallySignedStruct, Error as RustlsError, OtherError,
    RootCertStore, SignatureScheme,
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::certificate::remaining_validity;

/// Carried inside the rustls error when the presented certificate does not
/// match the stored pin.
#[derive(Debug)]
pub struct PinMismatch {
    pub hostname: String,
}

impl fmt::Display for PinMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "certificate pin mismatch for {}", self.hostname)
    }
}

impl std::error::Error for PinMismatch {}

/// Reports every certificate the verifier accepts or rejects.
#[derive(Clone)]
pub struct CertificateObserver {
    pub tracker: Arc<CertificateStatusTracker>,
    pub expiry_warning: Duration,
}

/// rustls verifier for the DoH endpoint: optional webpki chain validation,
/// then the trust-on-first-use pin check. Any failure aborts the handshake
/// before a single request byte is sent.
pub struct PinningVerifier {
    hostname: Arc<str>,
    chain: Option<Arc<WebPkiServerVerifier>>,
    pins: Option<CertificatePinValidator>,
    observer: Option<CertificateObserver>,
    provider: Arc<CryptoProvider>,
}

impl PinningVerifier {
    pub fn new(
        hostname: Arc<str>,
        verify_chain: bool,
        pins: Option<CertificatePinValidator>,
        observer: Option<CertificateObserver>,
    ) -> Result<Self, DomainError> {
        let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());

        let chain = if verify_chain {
            let roots = RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            let verifier =
                WebPkiServerVerifier::builder_with_provider(Arc::new(roots), Arc::clone(&provider))
                    .build()
                    .map_err(|e| {
                        DomainError::ResolutionFailed(format!("Failed to build TLS verifier: {}", e))
                    })?;
            Some(verifier)
        } else {
            None
        };

        Ok(Self {
            hostname,
            chain,
            pins,
            observer,
            provider,
        })
    }

    /// A client config that trusts only what this verifier accepts.
    pub fn into_client_config(self) -> Result<Arc<ClientConfig>, DomainError> {
        let provider = Arc::clone(&self.provider);
        let mut config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| DomainError::ResolutionFailed(format!("TLS configuration: {}", e)))?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(self))
            .with_no_client_auth();
        config.alpn_protocols = vec![b"http/1.1".to_vec()];
        Ok(Arc::new(config))
    }

    fn report(&self, status: CertificateStatus) {
        if let Some(observer) = &self.observer {
            observer.tracker.report(&self.hostname, status);
        }
    }

    fn check_pin(&self, end_entity: &[u8]) -> Result<(), RustlsError> {
        let Some(pins) = &self.pins else {
            return Ok(());
        };

        match pins.verify(end_entity, &self.hostname) {
            Ok(true) => Ok(()),
            Ok(false) => Err(RustlsError::InvalidCertificate(CertificateError::Other(
                OtherError(Arc::new(PinMismatch {
                    hostname: self.hostname.to_string(),
                })),
            ))),
            Err(e) => Err(RustlsError::General(e.to_string())),
        }
    }
}

impl fmt::Debug for PinningVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinningVerifier")
            .field("hostname", &self.hostname)
            .field("verify_chain", &self.chain.is_some())
            .field("pinning", &self.pins.is_some())
            .finish()
    }
}

impl ServerCertVerifier for PinningVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, RustlsError> {
        if let Some(chain) = &self.chain {
            if let Err(e) =
                chain.verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)
            {
                warn!(hostname = %self.hostname, error = %e, "Certificate chain rejected");
                self.report(CertificateStatus::Invalid);
                return Err(e);
            }
        }

        if let Err(e) = self.check_pin(end_entity.as_ref()) {
            self.report(CertificateStatus::Invalid);
            return Err(e);
        }

        if let Some(observer) = &self.observer {
            let status = classify_certificate(
                true,
                remaining_validity(end_entity.as_ref()),
                observer.expiry_warning,
            );
            debug!(hostname = %self.hostname, status = %status, "Certificate accepted");
            observer.tracker.report(&self.hostname, status);
        }

        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, RustlsError> {
        verify_tls12_signature(
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
    ) -> Result<HandshakeSignatureValid, RustlsError> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Maps a failed TLS handshake to the domain taxonomy: certificate
/// rejections are trust failures, everything else is a transport error.
pub fn classify_handshake_error(error: &std::io::Error, hostname: &str) -> DomainError {
    let rejected = error
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<RustlsError>())
        .is_some_and(|e| matches!(e, RustlsError::InvalidCertificate(_)));

    if rejected {
        DomainError::TrustFailure {
            hostname: hostname.to_string(),
        }
    } else {
        DomainError::ResolutionFailed(format!("TLS handshake with {} failed: {}", hostname, error))
    }
}
