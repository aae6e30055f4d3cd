use async_trait::async_trait;
use ferrous_doh_domain::{DomainError, InterfaceConfig};
use std::io;
use std::sync::Arc;

/// A packet-oriented handle to the tunnel interface.
///
/// Every call moves exactly one IP packet. Implementations must be safe to
/// share: the read loop and the response writer hold the same handle.
#[async_trait]
pub trait TunnelDevice: Send + Sync {
    /// Reads one packet into `buf`, returning its length.
    async fn read_packet(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Writes one whole packet. Callers serialize writes themselves.
    async fn write_packet(&self, packet: &[u8]) -> io::Result<()>;

    /// Closes the handle. A pending or later read or write fails.
    fn close(&self);
}

/// The platform collaborator that hands out configured tunnel devices.
#[async_trait]
pub trait TunnelEstablisher: Send + Sync {
    async fn establish(&self, config: &InterfaceConfig)
        -> Result<Arc<dyn TunnelDevice>, DomainError>;
}
