use super::errors::ConfigError;
use super::tunnel::UnmatchedPolicy;
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

/// Parameters handed to the platform when the tunnel device is established.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceConfig {
    pub session_name: String,
    pub address: Ipv4Addr,
    pub prefix_len: u8,
    pub resolver_address: Ipv4Addr,
    pub mtu: u16,
    pub dns_servers: Vec<String>,
    pub full_capture: bool,
    pub device: Option<String>,
}

/// Snapshot of everything a session needs, resolved once at start. Changing
/// any of it requires a restart.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub endpoint: Arc<str>,
    pub hostname: Arc<str>,
    pub port: u16,
    pub timeout: Duration,
    pub bootstrap_addresses: Vec<IpAddr>,
    pub verify_chain: bool,
    pub interface: InterfaceConfig,
    pub block_list: HashSet<Ipv4Addr>,
    pub unmatched_policy: UnmatchedPolicy,
    pub verify_on_start: bool,
    pub max_trust_failures: u32,
    pub monitor_interval: Option<Duration>,
    pub expiry_warning: Duration,
}

impl ResolverConfig {
    pub fn is_blocked(&self, addr: Ipv4Addr) -> bool {
        self.block_list.contains(&addr)
    }
}

/// Splits an `https://host[:port]/path` endpoint into host and port.
pub fn parse_endpoint(url: &str) -> Result<(Arc<str>, u16), ConfigError> {
    let rest = url.strip_prefix("https://").ok_or_else(|| {
        ConfigError::Validation(format!("DoH endpoint must use https://: '{}'", url))
    })?;
    let authority = rest.split(['/', '?']).next().unwrap_or_default();
    if authority.is_empty() {
        return Err(ConfigError::Validation(format!(
            "DoH endpoint has no host: '{}'",
            url
        )));
    }

    let (host, port) = if let Some(bracketed) = authority.strip_prefix('[') {
        let end = bracketed.find(']').ok_or_else(|| {
            ConfigError::Validation(format!("Unterminated IPv6 literal in '{}'", url))
        })?;
        let port = match bracketed[end + 1..].strip_prefix(':') {
            Some(p) => parse_port(p, url)?,
            None => 443,
        };
        (&bracketed[..end], port)
    } else if let Some((host, port)) = authority.rsplit_once(':') {
        (host, parse_port(port, url)?)
    } else {
        (authority, 443)
    };

    Ok((host.into(), port))
}

fn parse_port(port: &str, url: &str) -> Result<u16, ConfigError> {
    port.parse::<u16>()
        .map_err(|e| ConfigError::Validation(format!("Invalid port in '{}': {}", url, e)))
}
