use std::io;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::ports::TunnelDevice;

/// The single write path to the tunnel device.
///
/// Responses from query workers and passthrough writes from the read loop
/// all go through one lock, so packets are never interleaved. Once the
/// session is cancelled, writes are discarded instead of failing.
pub struct PacketWriter {
    device: Arc<dyn TunnelDevice>,
    lock: Mutex<()>,
    cancel: CancellationToken,
}

impl PacketWriter {
    pub fn new(device: Arc<dyn TunnelDevice>, cancel: CancellationToken) -> Self {
        Self {
            device,
            lock: Mutex::new(()),
            cancel,
        }
    }

    pub async fn write(&self, packet: &[u8]) -> io::Result<()> {
        let _guard = self.lock.lock().await;
        if self.cancel.is_cancelled() {
            debug!(len = packet.len(), "Session stopped, discarding packet");
            return Ok(());
        }

        match self.device.write_packet(packet).await {
            Err(e) if self.cancel.is_cancelled() => {
                debug!(error = %e, "Write failed after stop, ignoring");
                Ok(())
            }
            result => result,
        }
    }
}
