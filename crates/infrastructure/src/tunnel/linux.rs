//! Linux TUN device creation and interface configuration.

use std::ffi::CStr;
use std::io;
use std::net::Ipv4Addr;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::process::Command;

use libc::{c_char, c_int, c_short, c_ulong, c_void, sockaddr_in};
use tracing::{debug, info, warn};

const TUN_CLONE_DEVICE: &CStr = c"/dev/net/tun";

const TUNSETIFF: c_ulong = 0x400454ca;
const SIOCGIFFLAGS: c_ulong = 0x8913;
const SIOCSIFFLAGS: c_ulong = 0x8914;
const SIOCSIFADDR: c_ulong = 0x8916;
const SIOCSIFNETMASK: c_ulong = 0x891c;
const SIOCSIFMTU: c_ulong = 0x8922;

const IFF_UP: c_short = 0x1;
const IFF_RUNNING: c_short = 0x40;

const IFNAMSIZ: usize = 16;

#[repr(C)]
struct IfReqFlags {
    ifr_name: [c_char; IFNAMSIZ],
    ifr_flags: c_short,
    _pad: [u8; 22],
}

#[repr(C)]
struct IfReqAddr {
    ifr_name: [c_char; IFNAMSIZ],
    ifr_addr: sockaddr_in,
    _pad: [u8; 8],
}

#[repr(C)]
struct IfReqMtu {
    ifr_name: [c_char; IFNAMSIZ],
    ifr_mtu: c_int,
    _pad: [u8; 20],
}

fn name_buf(name: &str) -> [c_char; IFNAMSIZ] {
    let mut buf = [0 as c_char; IFNAMSIZ];
    for (slot, byte) in buf.iter_mut().zip(name.bytes().take(IFNAMSIZ - 1)) {
        *slot = byte as c_char;
    }
    buf
}

fn check(ret: c_int) -> io::Result<()> {
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Opens `/dev/net/tun` as an `IFF_TUN | IFF_NO_PI` interface. An empty
/// name lets the kernel pick one (`tun0`, `tun1`, ...).
pub fn open_tun(name: &str) -> io::Result<(OwnedFd, String)> {
    // SAFETY: path is NUL-terminated; the fd is owned immediately after.
    let raw = unsafe { libc::open(TUN_CLONE_DEVICE.as_ptr(), libc::O_RDWR | libc::O_CLOEXEC) };
    if raw < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: `raw` was just returned by open(2) and is not shared.
    let fd = unsafe { OwnedFd::from_raw_fd(raw) };

    let mut ifr = IfReqFlags {
        ifr_name: name_buf(name),
        ifr_flags: (libc::IFF_TUN | libc::IFF_NO_PI) as c_short,
        _pad: [0; 22],
    };
    // SAFETY: `ifr` matches the kernel's `struct ifreq` layout for TUNSETIFF.
    check(unsafe { libc::ioctl(fd.as_raw_fd(), TUNSETIFF, &mut ifr as *mut _ as *mut c_void) })?;

    // SAFETY: the kernel writes back a NUL-terminated name.
    let assigned = unsafe { CStr::from_ptr(ifr.ifr_name.as_ptr()) }
        .to_string_lossy()
        .into_owned();

    info!(device = %assigned, "Created TUN device");
    Ok((fd, assigned))
}

fn control_socket() -> io::Result<OwnedFd> {
    // SAFETY: plain socket(2) call; ownership taken immediately.
    let raw: RawFd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_DGRAM | libc::SOCK_CLOEXEC, 0) };
    if raw < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: `raw` is a fresh descriptor.
    Ok(unsafe { OwnedFd::from_raw_fd(raw) })
}

fn addr_request(name: &str, addr: Ipv4Addr) -> IfReqAddr {
    // SAFETY: sockaddr_in is plain data; all-zero is a valid value.
    let mut sin: sockaddr_in = unsafe { std::mem::zeroed() };
    sin.sin_family = libc::AF_INET as libc::sa_family_t;
    sin.sin_addr.s_addr = u32::from_ne_bytes(addr.octets());
    IfReqAddr {
        ifr_name: name_buf(name),
        ifr_addr: sin,
        _pad: [0; 8],
    }
}

pub fn prefix_to_netmask(prefix_len: u8) -> Ipv4Addr {
    let bits = match prefix_len {
        0 => 0,
        n => u32::MAX << (32 - u32::from(n.min(32))),
    };
    Ipv4Addr::from(bits)
}

/// Sets MTU, address and netmask, then brings the interface up.
pub fn configure_interface(
    name: &str,
    address: Ipv4Addr,
    prefix_len: u8,
    mtu: u16,
) -> io::Result<()> {
    let sock = control_socket()?;
    let fd = sock.as_raw_fd();

    let mut ifr_mtu = IfReqMtu {
        ifr_name: name_buf(name),
        ifr_mtu: c_int::from(mtu),
        _pad: [0; 20],
    };
    // SAFETY: each request struct matches `struct ifreq` for its ioctl.
    unsafe {
        check(libc::ioctl(fd, SIOCSIFMTU, &mut ifr_mtu as *mut _ as *mut c_void))?;

        let mut ifr_addr = addr_request(name, address);
        check(libc::ioctl(fd, SIOCSIFADDR, &mut ifr_addr as *mut _ as *mut c_void))?;

        let netmask = prefix_to_netmask(prefix_len);
        let mut ifr_mask = addr_request(name, netmask);
        check(libc::ioctl(fd, SIOCSIFNETMASK, &mut ifr_mask as *mut _ as *mut c_void))?;

        let mut ifr_flags = IfReqFlags {
            ifr_name: name_buf(name),
            ifr_flags: 0,
            _pad: [0; 22],
        };
        check(libc::ioctl(fd, SIOCGIFFLAGS, &mut ifr_flags as *mut _ as *mut c_void))?;
        ifr_flags.ifr_flags |= IFF_UP | IFF_RUNNING;
        check(libc::ioctl(fd, SIOCSIFFLAGS, &mut ifr_flags as *mut _ as *mut c_void))?;
    }

    info!(device = %name, address = %address, prefix_len, mtu, "Interface is up");
    Ok(())
}

/// Routes `destination` through the interface. A route that already exists
/// is only logged.
pub fn add_route(name: &str, destination: &str) -> io::Result<()> {
    let status = Command::new("ip")
        .args(["route", "add", destination, "dev", name])
        .status()?;

    if status.success() {
        debug!(device = %name, route = %destination, "Added route");
    } else {
        warn!(device = %name, route = %destination, "Failed to add route");
    }
    Ok(())
}
