use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::Ipv4Addr;

/// Well-known public resolvers whose traffic is dropped inside the tunnel.
pub const PUBLIC_DNS_SERVERS: [Ipv4Addr; 8] = [
    Ipv4Addr::new(8, 8, 8, 8),
    Ipv4Addr::new(8, 8, 4, 4),
    Ipv4Addr::new(1, 1, 1, 1),
    Ipv4Addr::new(1, 0, 0, 1),
    Ipv4Addr::new(9, 9, 9, 9),
    Ipv4Addr::new(149, 112, 112, 112),
    Ipv4Addr::new(208, 67, 222, 222),
    Ipv4Addr::new(208, 67, 220, 220),
];

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LeakProtectionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_blocked_servers")]
    pub blocked_servers: Vec<Ipv4Addr>,
}

impl LeakProtectionConfig {
    /// The set actually enforced: empty when protection is disabled.
    pub fn block_list(&self) -> HashSet<Ipv4Addr> {
        if self.enabled {
            self.blocked_servers.iter().copied().collect()
        } else {
            HashSet::new()
        }
    }
}

impl Default for LeakProtectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            blocked_servers: default_blocked_servers(),
        }
    }
}

fn default_blocked_servers() -> Vec<Ipv4Addr> {
    PUBLIC_DNS_SERVERS.to_vec()
}

fn default_true() -> bool {
    true
}
