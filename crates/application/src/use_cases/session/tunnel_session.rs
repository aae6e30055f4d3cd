use ferrous_doh_domain::dns_message::{build_error_response, build_response};
use ferrous_doh_domain::{CertificateStatus, DnsQuery, DomainError, ResolverConfig, SessionState};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::classifier::{classify_packet, PacketAction};
use super::writer::PacketWriter;
use crate::ports::{DohResolver, TunnelDevice};
use crate::services::{CertificateStatusTracker, SessionEventBus};

const READ_BUFFER_LEN: usize = 65_535;

/// One running interception session: the device handle, its read loop and
/// the per-query workers it spawns.
///
/// The read loop is the only reader. Every write goes through the shared
/// [`PacketWriter`].
pub struct TunnelSession {
    config: Arc<ResolverConfig>,
    device: Arc<dyn TunnelDevice>,
    writer: PacketWriter,
    resolver: Arc<dyn DohResolver>,
    bus: Arc<SessionEventBus>,
    certificates: Arc<CertificateStatusTracker>,
    cancel: CancellationToken,
    trust_failures: AtomicU32,
}

impl TunnelSession {
    pub fn new(
        config: Arc<ResolverConfig>,
        device: Arc<dyn TunnelDevice>,
        resolver: Arc<dyn DohResolver>,
        bus: Arc<SessionEventBus>,
        certificates: Arc<CertificateStatusTracker>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            writer: PacketWriter::new(Arc::clone(&device), cancel.clone()),
            config,
            device,
            resolver,
            bus,
            certificates,
            cancel,
            trust_failures: AtomicU32::new(0),
        }
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Reads packets until the session is cancelled or the device fails.
    pub async fn run(self: Arc<Self>) {
        let mut buf = vec![0u8; READ_BUFFER_LEN];
        info!(
            resolver = %self.config.interface.resolver_address,
            endpoint = %self.config.endpoint,
            "Tunnel read loop started"
        );

        while !self.cancel.is_cancelled() {
            let read = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                read = self.device.read_packet(&mut buf) => read,
            };

            let len = match read {
                Ok(0) => {
                    self.fail(DomainError::DeviceFailure("tunnel device closed".to_string()));
                    break;
                }
                Ok(len) => len,
                Err(e) => {
                    self.fail(DomainError::DeviceFailure(format!("tunnel read failed: {}", e)));
                    break;
                }
            };

            let packet = &buf[..len];
            match classify_packet(packet, &self.config) {
                PacketAction::Resolve(query) => self.dispatch(packet.to_vec(), query),
                PacketAction::Passthrough => {
                    if let Err(e) = self.writer.write(packet).await {
                        self.fail(write_failure(e));
                        break;
                    }
                }
                PacketAction::Drop(reason) => {
                    debug!(?reason, len, "Packet dropped");
                }
            }
        }

        info!("Tunnel read loop stopped");
    }

    fn dispatch(self: &Arc<Self>, packet: Vec<u8>, query: DnsQuery) {
        debug!(domain = %query.domain, id = query.id, "Dispatching DNS query");
        let session = Arc::clone(self);
        tokio::spawn(async move {
            session.answer(&packet, &query).await;
        });
    }

    /// Resolves `query` and writes the response for `packet`. Every failure
    /// becomes SERVFAIL; nothing is retried.
    pub async fn answer(&self, packet: &[u8], query: &DnsQuery) {
        let response = match self.resolver.resolve(&query.domain).await {
            Ok(addresses) => {
                self.trust_failures.store(0, Ordering::Relaxed);
                if addresses.is_empty() {
                    debug!(domain = %query.domain, "No A records, answering SERVFAIL");
                    build_error_response(packet)
                } else {
                    debug!(
                        domain = %query.domain,
                        id = query.id,
                        answers = addresses.len(),
                        "Resolved over DoH"
                    );
                    build_response(packet, &addresses)
                }
            }
            Err(e) => {
                if e.is_trust_failure() {
                    self.record_trust_failure(&e);
                } else {
                    warn!(domain = %query.domain, error = %e, "DoH resolution failed");
                }
                build_error_response(packet)
            }
        };

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                debug!(domain = %query.domain, error = %e, "Could not build DNS response");
                return;
            }
        };

        if let Err(e) = self.writer.write(&response).await {
            self.fail(write_failure(e));
        }
    }

    fn record_trust_failure(&self, error: &DomainError) {
        let failures = self.trust_failures.fetch_add(1, Ordering::Relaxed) + 1;
        self.certificates
            .report(&self.config.hostname, CertificateStatus::Invalid);
        warn!(
            error = %error,
            failures,
            limit = self.config.max_trust_failures,
            "Certificate trust failure"
        );

        if failures >= self.config.max_trust_failures {
            self.fail(DomainError::TrustFailure {
                hostname: self.config.hostname.to_string(),
            });
        }
    }

    /// Moves the session to ERROR and tears the loop down. A no-op once the
    /// session has been stopped.
    pub fn fail(&self, error: DomainError) {
        if self.cancel.is_cancelled() {
            return;
        }
        let message = error.to_string();
        if self.bus.transition(SessionState::Error, Some(message.clone())) {
            error!(error = %message, "Tunnel session failed");
        }
        self.shutdown();
    }

    /// Stops the read loop and closes the device. Idempotent.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        self.device.close();
    }
}

fn write_failure(e: std::io::Error) -> DomainError {
    DomainError::DeviceFailure(format!("tunnel write failed: {}", e))
}
