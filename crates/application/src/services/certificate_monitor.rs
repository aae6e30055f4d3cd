use ferrous_doh_domain::CertificateStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::certificate_status::CertificateStatusTracker;
use crate::ports::TrustChecker;

/// Periodically re-checks the resolver certificate while a session runs.
pub struct CertificateMonitor {
    checker: Arc<dyn TrustChecker>,
    tracker: Arc<CertificateStatusTracker>,
    hostname: Arc<str>,
    interval: Duration,
}

impl CertificateMonitor {
    pub fn new(
        checker: Arc<dyn TrustChecker>,
        tracker: Arc<CertificateStatusTracker>,
        hostname: Arc<str>,
        interval: Duration,
    ) -> Self {
        Self {
            checker,
            tracker,
            hostname,
            interval,
        }
    }

    /// One probe. A probe that cannot complete is a `Warning`, a pin
    /// mismatch is `Invalid`.
    pub async fn check_once(&self) -> CertificateStatus {
        let status = match self.checker.check().await {
            Ok(status) => status,
            Err(e) if e.is_trust_failure() => CertificateStatus::Invalid,
            Err(e) => {
                warn!(hostname = %self.hostname, error = %e, "Certificate probe failed");
                CertificateStatus::Warning
            }
        };
        self.tracker.report(&self.hostname, status);
        status
    }

    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(
            hostname = %self.hostname,
            interval_secs = self.interval.as_secs(),
            "Certificate monitor started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.check_once().await;
                }
            }
        }

        debug!(hostname = %self.hostname, "Certificate monitor stopped");
    }
}
