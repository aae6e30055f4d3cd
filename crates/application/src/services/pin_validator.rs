use ferrous_doh_domain::{pin_key, DomainError, Fingerprint};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::ports::PinStore;

/// Trust-on-first-use certificate pinning keyed by hostname.
///
/// `save` and `remove` are the only operations that change trust state and
/// are only reached from explicit user commands.
#[derive(Clone)]
pub struct CertificatePinValidator {
    store: Arc<dyn PinStore>,
}

impl CertificatePinValidator {
    pub fn new(store: Arc<dyn PinStore>) -> Self {
        Self { store }
    }

    /// SHA-256 of the DER encoding, as `AB:CD:...`.
    pub fn compute_fingerprint(certificate_der: &[u8]) -> Fingerprint {
        Fingerprint::from_digest(&Sha256::digest(certificate_der))
    }

    /// Returns `true` if no pin is stored for `hostname`, or if the stored
    /// pin equals the certificate's fingerprint.
    pub fn verify(&self, certificate_der: &[u8], hostname: &str) -> Result<bool, DomainError> {
        let Some(stored) = self.store.get(&pin_key(hostname))? else {
            debug!(hostname = %hostname, "No certificate pin stored, trusting on first use");
            return Ok(true);
        };

        let presented = Self::compute_fingerprint(certificate_der);
        let matches = presented.matches(&stored);
        if !matches {
            warn!(
                hostname = %hostname,
                expected = %stored,
                presented = %presented,
                "Certificate pin mismatch"
            );
        }
        Ok(matches)
    }

    /// Pins the certificate for `hostname`, replacing any previous pin.
    pub fn save(&self, certificate_der: &[u8], hostname: &str) -> Result<Fingerprint, DomainError> {
        let fingerprint = Self::compute_fingerprint(certificate_der);
        self.store.put(&pin_key(hostname), fingerprint.as_str())?;
        info!(hostname = %hostname, fingerprint = %fingerprint, "Certificate pinned");
        Ok(fingerprint)
    }

    /// Drops the pin for `hostname`; the next handshake is trust-on-first-use.
    pub fn remove(&self, hostname: &str) -> Result<bool, DomainError> {
        let removed = self.store.remove(&pin_key(hostname))?;
        if removed {
            info!(hostname = %hostname, "Certificate pin removed");
        }
        Ok(removed)
    }

    pub fn stored_pin(&self, hostname: &str) -> Result<Option<String>, DomainError> {
        self.store.get(&pin_key(hostname))
    }
}
