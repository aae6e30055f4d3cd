use ferrous_doh_application::ports::SocketProtector;
use ferrous_doh_domain::{DomainError, ResolverConfig};
use rustls::pki_types::ServerName;
use rustls::ClientConfig;
use std::net::{IpAddr, SocketAddr};
use std::os::fd::AsRawFd;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpSocket, TcpStream};
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tracing::debug;

use crate::tls::classify_handshake_error;

/// Resolves the DoH host to socket addresses: configured bootstrap
/// addresses first, then an IP literal, then the system resolver.
pub async fn resolve_endpoint(
    hostname: &str,
    port: u16,
    bootstrap: &[IpAddr],
    timeout: Duration,
) -> Result<Vec<SocketAddr>, DomainError> {
    if !bootstrap.is_empty() {
        return Ok(bootstrap.iter().map(|ip| SocketAddr::new(*ip, port)).collect());
    }

    if let Ok(ip) = hostname.parse::<IpAddr>() {
        return Ok(vec![SocketAddr::new(ip, port)]);
    }

    let target = format!("{}:{}", hostname, port);
    let addrs: Vec<SocketAddr> = tokio::time::timeout(timeout, tokio::net::lookup_host(&target))
        .await
        .map_err(|_| DomainError::TransportTimeout {
            server: target.clone(),
        })?
        .map_err(|e| DomainError::ResolutionFailed(format!("Lookup of {} failed: {}", target, e)))?
        .collect();

    if addrs.is_empty() {
        return Err(DomainError::ResolutionFailed(format!(
            "No addresses found for {}",
            target
        )));
    }

    Ok(addrs)
}

/// Opens protected TCP connections to the DoH endpoint and runs the TLS
/// handshake on them.
pub struct DohConnector {
    hostname: Arc<str>,
    server_name: ServerName<'static>,
    addresses: Vec<SocketAddr>,
    tls: TlsConnector,
    protector: Arc<dyn SocketProtector>,
}

impl DohConnector {
    /// Resolves the endpoint once. The tunnel is not up yet at this point,
    /// so the lookup cannot loop back into it.
    pub async fn new(
        config: &ResolverConfig,
        tls_config: Arc<ClientConfig>,
        protector: Arc<dyn SocketProtector>,
    ) -> Result<Self, DomainError> {
        let server_name = ServerName::try_from(config.hostname.to_string()).map_err(|e| {
            DomainError::InvalidEndpoint(format!(
                "Invalid TLS hostname '{}': {}",
                config.hostname, e
            ))
        })?;

        let addresses = resolve_endpoint(
            &config.hostname,
            config.port,
            &config.bootstrap_addresses,
            config.timeout,
        )
        .await?;

        debug!(hostname = %config.hostname, addresses = ?addresses, "DoH endpoint resolved");

        Ok(Self {
            hostname: Arc::clone(&config.hostname),
            server_name,
            addresses,
            tls: TlsConnector::from(tls_config),
            protector,
        })
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Connects to the first reachable address and completes the handshake.
    /// A rejected certificate is returned as `TrustFailure` without trying
    /// the remaining addresses.
    pub async fn connect(&self) -> Result<TlsStream<TcpStream>, DomainError> {
        let tcp = self.connect_tcp().await?;
        self.tls
            .connect(self.server_name.clone(), tcp)
            .await
            .map_err(|e| classify_handshake_error(&e, &self.hostname))
    }

    async fn connect_tcp(&self) -> Result<TcpStream, DomainError> {
        let mut last_error = None;

        for addr in &self.addresses {
            match self.connect_protected(*addr).await {
                Ok(stream) => {
                    debug!(server = %addr, "Connected to DoH server");
                    return Ok(stream);
                }
                Err(e) => {
                    debug!(server = %addr, error = %e, "DoH connect attempt failed");
                    last_error = Some(e);
                }
            }
        }

        Err(DomainError::ResolutionFailed(match last_error {
            Some(e) => format!("Cannot reach {}: {}", self.hostname, e),
            None => format!("No addresses for {}", self.hostname),
        }))
    }

    async fn connect_protected(&self, addr: SocketAddr) -> std::io::Result<TcpStream> {
        let socket = match addr {
            SocketAddr::V4(_) => TcpSocket::new_v4()?,
            SocketAddr::V6(_) => TcpSocket::new_v6()?,
        };
        self.protector.protect(socket.as_raw_fd())?;
        socket.set_nodelay(true)?;
        socket.connect(addr).await
    }
}
