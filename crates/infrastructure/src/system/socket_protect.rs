use ferrous_doh_application::ports::SocketProtector;
use std::io;
use std::os::fd::RawFd;

/// Leaves sockets untouched. Suitable when the tunnel only captures the
/// resolver address, so DoH traffic never enters it.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProtector;

impl SocketProtector for NoopProtector {
    fn protect(&self, _fd: RawFd) -> io::Result<()> {
        Ok(())
    }
}

/// Tags sockets with `SO_MARK` so a policy-routing rule can send them
/// around the tunnel. Needs `CAP_NET_ADMIN`.
#[derive(Debug, Clone, Copy)]
pub struct FwmarkProtector {
    mark: u32,
}

impl FwmarkProtector {
    pub fn new(mark: u32) -> Self {
        Self { mark }
    }

    pub fn mark(&self) -> u32 {
        self.mark
    }
}

impl SocketProtector for FwmarkProtector {
    #[cfg(target_os = "linux")]
    fn protect(&self, fd: RawFd) -> io::Result<()> {
        let val = self.mark as libc::c_uint;
        let ret = unsafe {
            libc::setsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_MARK,
                &val as *const libc::c_uint as *const libc::c_void,
                std::mem::size_of::<libc::c_uint>() as libc::socklen_t,
            )
        };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    fn protect(&self, _fd: RawFd) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "SO_MARK is only available on Linux",
        ))
    }
}

/// Delegates to a host-supplied function, e.g. a mobile VPN service's
/// `protect(fd)`. Returning `false` fails the connection attempt.
pub struct CallbackProtector {
    callback: Box<dyn Fn(RawFd) -> bool + Send + Sync>,
}

impl CallbackProtector {
    pub fn new(callback: impl Fn(RawFd) -> bool + Send + Sync + 'static) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }
}

impl SocketProtector for CallbackProtector {
    fn protect(&self, fd: RawFd) -> io::Result<()> {
        if (self.callback)(fd) {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("host refused to protect socket {}", fd),
            ))
        }
    }
}

impl std::fmt::Debug for CallbackProtector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackProtector").finish_non_exhaustive()
    }
}
