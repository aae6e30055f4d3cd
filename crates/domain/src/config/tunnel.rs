use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// What the read loop does with well-formed packets that are neither our own
/// DNS traffic nor on the leak-protection block list.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnmatchedPolicy {
    #[default]
    Drop,
    Passthrough,
}

impl UnmatchedPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Drop => "drop",
            Self::Passthrough => "passthrough",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TunnelConfig {
    #[serde(default = "default_session_name")]
    pub session_name: String,

    /// Local address assigned to the tunnel interface.
    #[serde(default = "default_address")]
    pub address: Ipv4Addr,

    #[serde(default = "default_prefix_len")]
    pub prefix_len: u8,

    /// Reserved in-tunnel resolver address; DNS sent here is answered via DoH.
    #[serde(default = "default_resolver_address")]
    pub resolver_address: Ipv4Addr,

    #[serde(default = "default_mtu")]
    pub mtu: u16,

    /// Interface DNS configuration only; never used for forwarding.
    #[serde(default)]
    pub primary_dns: Option<String>,

    #[serde(default)]
    pub secondary_dns: Option<String>,

    /// Route everything into the tunnel instead of only the resolver address.
    #[serde(default)]
    pub full_capture: bool,

    #[serde(default)]
    pub unmatched_policy: UnmatchedPolicy,

    /// `fd:<n>` to adopt a descriptor handed over by the platform, or a TUN
    /// interface name to open.
    #[serde(default)]
    pub device: Option<String>,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            session_name: default_session_name(),
            address: default_address(),
            prefix_len: default_prefix_len(),
            resolver_address: default_resolver_address(),
            mtu: default_mtu(),
            primary_dns: None,
            secondary_dns: None,
            full_capture: false,
            unmatched_policy: UnmatchedPolicy::default(),
            device: None,
        }
    }
}

fn default_session_name() -> String {
    "ferrous-doh".to_string()
}

fn default_address() -> Ipv4Addr {
    Ipv4Addr::new(10, 0, 0, 2)
}

fn default_prefix_len() -> u8 {
    32
}

fn default_resolver_address() -> Ipv4Addr {
    Ipv4Addr::new(10, 0, 0, 1)
}

fn default_mtu() -> u16 {
    1500
}
