use async_trait::async_trait;
use ferrous_doh_domain::{CertificateStatus, DomainError, ResolverConfig};
use std::net::Ipv4Addr;
use std::sync::Arc;

use crate::services::CertificateStatusTracker;

#[async_trait]
pub trait DohResolver: Send + Sync {
    /// Resolves the A records of `domain` over DNS-over-HTTPS.
    ///
    /// An empty list and an error are both answered with SERVFAIL.
    /// `DomainError::TrustFailure` means the pinned certificate did not match
    /// and no query was sent.
    async fn resolve(&self, domain: &str) -> Result<Vec<Ipv4Addr>, DomainError>;
}

#[async_trait]
pub trait TrustChecker: Send + Sync {
    /// Handshakes with the resolver and classifies its certificate without
    /// sending a query.
    async fn check(&self) -> Result<CertificateStatus, DomainError>;
}

/// The DoH transport pair built for one session.
#[derive(Clone)]
pub struct DohClient {
    pub resolver: Arc<dyn DohResolver>,
    pub trust_checker: Arc<dyn TrustChecker>,
}

/// Builds a fresh [`DohClient`] from the configuration resolved at session
/// start. Runs before the tunnel is established, so it may still use the
/// system resolver. Certificate observations are reported through
/// `certificates`.
#[async_trait]
pub trait DohClientFactory: Send + Sync {
    async fn create(
        &self,
        config: &ResolverConfig,
        certificates: Arc<CertificateStatusTracker>,
    ) -> Result<DohClient, DomainError>;
}
