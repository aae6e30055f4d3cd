use ferrous_doh_domain::{CertificateStatus, SessionEvent};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::info;

use super::event_bus::SessionEventBus;

/// Classifies a presented certificate: a pin mismatch is `Invalid`, a
/// certificate expiring within `warning_window` (or already expired) is
/// `Warning`, anything else is `Valid`.
pub fn classify_certificate(
    pin_matches: bool,
    remaining_validity: Option<Duration>,
    warning_window: Duration,
) -> CertificateStatus {
    if !pin_matches {
        return CertificateStatus::Invalid;
    }
    match remaining_validity {
        Some(remaining) if remaining >= warning_window => CertificateStatus::Valid,
        _ => CertificateStatus::Warning,
    }
}

/// Last known certificate status per hostname. Publishes an event only when
/// a host's status changes.
pub struct CertificateStatusTracker {
    bus: Arc<SessionEventBus>,
    last: Mutex<HashMap<String, CertificateStatus>>,
}

impl CertificateStatusTracker {
    pub fn new(bus: Arc<SessionEventBus>) -> Self {
        Self {
            bus,
            last: Mutex::new(HashMap::new()),
        }
    }

    /// Records `status` for `hostname`; returns whether an event was published.
    pub fn report(&self, hostname: &str, status: CertificateStatus) -> bool {
        let changed = {
            let mut last = self.last.lock().unwrap_or_else(|p| p.into_inner());
            let previous = last.insert(hostname.to_string(), status);
            previous.unwrap_or_default() != status
        };

        if changed {
            info!(hostname = %hostname, status = %status, "Certificate status changed");
            self.bus
                .publish(SessionEvent::certificate(hostname, status));
        }
        changed
    }

    pub fn status(&self, hostname: &str) -> CertificateStatus {
        self.last
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(hostname)
            .copied()
            .unwrap_or_default()
    }

    /// Forgets all statuses. Called on every session stop so the next
    /// session announces its first verdict again.
    pub fn reset(&self) {
        self.last.lock().unwrap_or_else(|p| p.into_inner()).clear();
    }
}
