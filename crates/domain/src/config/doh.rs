use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DohConfig {
    /// RFC 8484 endpoint queried with POST.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Addresses used to reach the endpoint host. When empty the host is
    /// looked up with the system resolver, which must not route through the
    /// tunnel.
    #[serde(default)]
    pub bootstrap_addresses: Vec<IpAddr>,

    /// Validate the certificate chain against the webpki roots in addition to
    /// the pin check.
    #[serde(default = "default_true")]
    pub verify_chain: bool,
}

impl DohConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for DohConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
            bootstrap_addresses: Vec::new(),
            verify_chain: true,
        }
    }
}

fn default_endpoint() -> String {
    "https://cloudflare-dns.com/dns-query".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_true() -> bool {
    true
}
