use async_trait::async_trait;
use ferrous_doh_application::ports::{DohClient, DohClientFactory, SocketProtector};
use ferrous_doh_application::services::{CertificatePinValidator, CertificateStatusTracker};
use ferrous_doh_domain::{DomainError, ResolverConfig};
use std::sync::Arc;
use tracing::info;

use super::connector::DohConnector;
use super::forwarder::DohForwarder;
use super::probe::TlsCertificateProbe;
use crate::tls::{CertificateObserver, PinningVerifier};

/// Builds the HTTPS forwarder and certificate probe for a session. Both
/// share one pinning TLS configuration and one protected connector.
pub struct HttpsDohClientFactory {
    pins: CertificatePinValidator,
    protector: Arc<dyn SocketProtector>,
}

impl HttpsDohClientFactory {
    pub fn new(pins: CertificatePinValidator, protector: Arc<dyn SocketProtector>) -> Self {
        Self { pins, protector }
    }
}

#[async_trait]
impl DohClientFactory for HttpsDohClientFactory {
    async fn create(
        &self,
        config: &ResolverConfig,
        certificates: Arc<CertificateStatusTracker>,
    ) -> Result<DohClient, DomainError> {
        let verifier = PinningVerifier::new(
            Arc::clone(&config.hostname),
            config.verify_chain,
            Some(self.pins.clone()),
            Some(CertificateObserver {
                tracker: certificates,
                expiry_warning: config.expiry_warning,
            }),
        )?;

        let connector = Arc::new(
            DohConnector::new(
                config,
                verifier.into_client_config()?,
                Arc::clone(&self.protector),
            )
            .await?,
        );

        let forwarder = DohForwarder::new(config, Arc::clone(&connector))?;
        let probe = TlsCertificateProbe::new(connector, config.expiry_warning, config.timeout);

        info!(
            endpoint = %config.endpoint,
            verify_chain = config.verify_chain,
            "DoH client ready"
        );

        Ok(DohClient {
            resolver: Arc::new(forwarder),
            trust_checker: Arc::new(probe),
        })
    }
}
