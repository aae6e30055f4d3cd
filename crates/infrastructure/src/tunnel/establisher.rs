use async_trait::async_trait;
use ferrous_doh_application::ports::{TunnelDevice, TunnelEstablisher};
use ferrous_doh_domain::{DomainError, InterfaceConfig};
use std::os::fd::{BorrowedFd, OwnedFd, RawFd};
use std::sync::Arc;
use tracing::{debug, info};

use super::fd_device::FdTunnelDevice;

const FD_PREFIX: &str = "fd:";

/// Where the tunnel packets come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSpec {
    /// A descriptor handed over by the host (e.g. a mobile VPN service).
    Fd(RawFd),
    /// A Linux TUN interface to create; empty means kernel-assigned.
    Tun(String),
}

impl DeviceSpec {
    pub fn parse(device: Option<&str>) -> Result<Self, DomainError> {
        let Some(device) = device.map(str::trim).filter(|d| !d.is_empty()) else {
            return Ok(Self::Tun(String::new()));
        };

        match device.strip_prefix(FD_PREFIX) {
            Some(raw) => raw
                .parse::<RawFd>()
                .ok()
                .filter(|fd| *fd >= 0)
                .map(Self::Fd)
                .ok_or_else(|| {
                    DomainError::TunnelEstablish(format!("Invalid descriptor '{}'", device))
                }),
            None => Ok(Self::Tun(device.to_string())),
        }
    }
}

/// Establishes the tunnel from `InterfaceConfig::device`.
///
/// A host-provided descriptor is duplicated, so every session owns its own
/// copy and a restart can adopt the same descriptor again.
#[derive(Debug, Default)]
pub struct FdTunnelEstablisher;

impl FdTunnelEstablisher {
    pub fn new() -> Self {
        Self
    }

    fn adopt(&self, raw: RawFd, config: &InterfaceConfig) -> Result<FdTunnelDevice, DomainError> {
        // SAFETY: the host guarantees `raw` stays open for the call; we only
        // duplicate it here.
        let borrowed = unsafe { BorrowedFd::borrow_raw(raw) };
        let owned: OwnedFd = borrowed.try_clone_to_owned().map_err(|e| {
            DomainError::TunnelEstablish(format!("Cannot adopt descriptor {}: {}", raw, e))
        })?;

        info!(fd = raw, session = %config.session_name, "Adopted tunnel descriptor");
        FdTunnelDevice::new(owned, format!("{}{}", FD_PREFIX, raw))
            .map_err(|e| DomainError::TunnelEstablish(e.to_string()))
    }

    #[cfg(target_os = "linux")]
    fn create_tun(&self, name: &str, config: &InterfaceConfig) -> Result<FdTunnelDevice, DomainError> {
        use super::linux::{add_route, configure_interface, open_tun};

        let establish_error =
            |e: std::io::Error| DomainError::TunnelEstablish(format!("TUN setup failed: {}", e));

        let (fd, name) = open_tun(name).map_err(establish_error)?;
        configure_interface(&name, config.address, config.prefix_len, config.mtu)
            .map_err(establish_error)?;

        add_route(&name, &format!("{}/32", config.resolver_address)).map_err(establish_error)?;
        if config.full_capture {
            for half in ["0.0.0.0/1", "128.0.0.0/1"] {
                add_route(&name, half).map_err(establish_error)?;
            }
        }

        info!(
            device = %name,
            session = %config.session_name,
            resolver = %config.resolver_address,
            dns_servers = ?config.dns_servers,
            full_capture = config.full_capture,
            "Tunnel interface configured"
        );

        FdTunnelDevice::new(fd, name).map_err(establish_error)
    }

    #[cfg(not(target_os = "linux"))]
    fn create_tun(&self, name: &str, _config: &InterfaceConfig) -> Result<FdTunnelDevice, DomainError> {
        Err(DomainError::TunnelEstablish(format!(
            "Creating TUN interface '{}' is only supported on Linux; pass fd:<n>",
            name
        )))
    }
}

#[async_trait]
impl TunnelEstablisher for FdTunnelEstablisher {
    async fn establish(
        &self,
        config: &InterfaceConfig,
    ) -> Result<Arc<dyn TunnelDevice>, DomainError> {
        let device = match DeviceSpec::parse(config.device.as_deref())? {
            DeviceSpec::Fd(raw) => self.adopt(raw, config)?,
            DeviceSpec::Tun(name) => self.create_tun(&name, config)?,
        };
        debug!(device = %device.name(), "Tunnel device ready");
        Ok(Arc::new(device))
    }
}
