use async_trait::async_trait;
use ferrous_doh_application::ports::TunnelDevice;
use std::io;
use std::os::fd::{AsRawFd, OwnedFd};
use tokio::io::unix::AsyncFd;
use tokio::io::Interest;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A tunnel device backed by a packet-oriented file descriptor (a TUN fd or
/// a host-provided VPN fd). One `read(2)` yields one packet and one
/// `write(2)` submits one packet.
pub struct FdTunnelDevice {
    fd: AsyncFd<OwnedFd>,
    name: String,
    closed: CancellationToken,
}

impl FdTunnelDevice {
    /// Takes ownership of `fd` and switches it to non-blocking mode.
    pub fn new(fd: OwnedFd, name: impl Into<String>) -> io::Result<Self> {
        set_nonblocking(&fd)?;
        Ok(Self {
            fd: AsyncFd::with_interest(fd, Interest::READABLE | Interest::WRITABLE)?,
            name: name.into(),
            closed: CancellationToken::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    fn check_open(&self) -> io::Result<()> {
        if self.closed.is_cancelled() {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                format!("tunnel device {} is closed", self.name),
            ));
        }
        Ok(())
    }

    async fn read_ready(&self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let mut guard = self.fd.readable().await?;
            match guard.try_io(|inner| sys_read(inner.get_ref(), buf)) {
                Ok(result) => return result,
                Err(_would_block) => continue,
            }
        }
    }

    async fn write_ready(&self, packet: &[u8]) -> io::Result<()> {
        loop {
            let mut guard = self.fd.writable().await?;
            match guard.try_io(|inner| sys_write(inner.get_ref(), packet)) {
                Ok(Ok(n)) if n == packet.len() => return Ok(()),
                Ok(Ok(n)) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        format!("short packet write: {} of {} bytes", n, packet.len()),
                    ))
                }
                Ok(Err(e)) => return Err(e),
                Err(_would_block) => continue,
            }
        }
    }
}

#[async_trait]
impl TunnelDevice for FdTunnelDevice {
    async fn read_packet(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.check_open()?;
        tokio::select! {
            _ = self.closed.cancelled() => {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "tunnel device closed"))
            }
            result = self.read_ready(buf) => result,
        }
    }

    async fn write_packet(&self, packet: &[u8]) -> io::Result<()> {
        self.check_open()?;
        self.write_ready(packet).await
    }

    fn close(&self) {
        if !self.closed.is_cancelled() {
            debug!(device = %self.name, "Closing tunnel device");
            self.closed.cancel();
        }
    }
}

fn set_nonblocking(fd: &OwnedFd) -> io::Result<()> {
    // SAFETY: fcntl on an fd we own; no memory is passed.
    unsafe {
        let flags = libc::fcntl(fd.as_raw_fd(), libc::F_GETFL);
        if flags < 0 {
            return Err(io::Error::last_os_error());
        }
        if libc::fcntl(fd.as_raw_fd(), libc::F_SETFL, flags | libc::O_NONBLOCK) < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

fn sys_read(fd: &OwnedFd, buf: &mut [u8]) -> io::Result<usize> {
    // SAFETY: `buf` is valid for `buf.len()` writable bytes.
    let n = unsafe { libc::read(fd.as_raw_fd(), buf.as_mut_ptr().cast(), buf.len()) };
    if n < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(n as usize)
}

fn sys_write(fd: &OwnedFd, packet: &[u8]) -> io::Result<usize> {
    // SAFETY: `packet` is valid for `packet.len()` readable bytes.
    let n = unsafe { libc::write(fd.as_raw_fd(), packet.as_ptr().cast(), packet.len()) };
    if n < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(n as usize)
}
