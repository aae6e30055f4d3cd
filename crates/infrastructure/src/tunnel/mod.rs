mod establisher;
mod fd_device;
#[cfg(target_os = "linux")]
mod linux;

pub use establisher::{DeviceSpec, FdTunnelEstablisher};
pub use fd_device::FdTunnelDevice;
