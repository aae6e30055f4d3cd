use async_trait::async_trait;
use ferrous_doh_application::ports::{SocketProtector, TrustChecker};
use ferrous_doh_application::services::classify_certificate;
use ferrous_doh_domain::{CertificateStatus, DomainError, ResolverConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tracing::{debug, warn};

use super::connector::DohConnector;
use crate::tls::{remaining_validity, PinningVerifier};

/// Handshake-only probe of the DoH endpoint certificate. Never sends a query.
pub struct TlsCertificateProbe {
    connector: Arc<DohConnector>,
    expiry_warning: Duration,
    timeout: Duration,
}

impl TlsCertificateProbe {
    pub fn new(connector: Arc<DohConnector>, expiry_warning: Duration, timeout: Duration) -> Self {
        Self {
            connector,
            expiry_warning,
            timeout,
        }
    }

    /// Returns the end-entity certificate (DER) presented by the endpoint.
    /// Stored pins are not enforced, so this works for a host whose
    /// certificate has rotated.
    pub async fn fetch(
        config: &ResolverConfig,
        protector: Arc<dyn SocketProtector>,
    ) -> Result<Vec<u8>, DomainError> {
        let verifier =
            PinningVerifier::new(Arc::clone(&config.hostname), config.verify_chain, None, None)?;
        let connector = DohConnector::new(config, verifier.into_client_config()?, protector).await?;

        let stream = handshake(&connector, config.timeout).await?;
        end_entity(&stream).ok_or_else(|| {
            DomainError::ResolutionFailed(format!(
                "{} presented no certificate",
                config.hostname
            ))
        })
    }
}

async fn handshake(
    connector: &DohConnector,
    timeout: Duration,
) -> Result<TlsStream<TcpStream>, DomainError> {
    tokio::time::timeout(timeout, connector.connect())
        .await
        .map_err(|_| DomainError::TransportTimeout {
            server: connector.hostname().to_string(),
        })?
}

fn end_entity(stream: &TlsStream<TcpStream>) -> Option<Vec<u8>> {
    let (_, connection) = stream.get_ref();
    connection
        .peer_certificates()
        .and_then(|chain| chain.first())
        .map(|der| der.as_ref().to_vec())
}

#[async_trait]
impl TrustChecker for TlsCertificateProbe {
    async fn check(&self) -> Result<CertificateStatus, DomainError> {
        let stream = match handshake(&self.connector, self.timeout).await {
            Ok(stream) => stream,
            Err(e) if e.is_trust_failure() => return Ok(CertificateStatus::Invalid),
            Err(e) => return Err(e),
        };

        let Some(der) = end_entity(&stream) else {
            warn!(hostname = %self.connector.hostname(), "Handshake completed without a certificate");
            return Ok(CertificateStatus::Warning);
        };

        let status = classify_certificate(true, remaining_validity(&der), self.expiry_warning);
        debug!(hostname = %self.connector.hostname(), status = %status, "Certificate probed");
        Ok(status)
    }
}
