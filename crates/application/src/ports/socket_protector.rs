use std::io;
use std::os::fd::RawFd;

/// Exempts a socket from the tunnel's own capture so DoH traffic egresses
/// through the physical network. Called on every socket before `connect`.
pub trait SocketProtector: Send + Sync {
    fn protect(&self, fd: RawFd) -> io::Result<()>;
}
