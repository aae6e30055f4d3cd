use serde::{Deserialize, Serialize};

use super::doh::DohConfig;
use super::errors::ConfigError;
use super::leak_protection::LeakProtectionConfig;
use super::logging::LoggingConfig;
use super::pinning::PinningConfig;
use super::resolver::{parse_endpoint, InterfaceConfig, ResolverConfig};
use super::tunnel::TunnelConfig;

const LOCAL_CONFIG_PATH: &str = "ferrous-doh.toml";
const SYSTEM_CONFIG_PATH: &str = "/etc/ferrous-doh/config.toml";

/// Main configuration structure for Ferrous DoH
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// DNS-over-HTTPS upstream
    #[serde(default)]
    pub doh: DohConfig,

    /// Tunnel interface and packet policy
    #[serde(default)]
    pub tunnel: TunnelConfig,

    #[serde(default)]
    pub leak_protection: LeakProtectionConfig,

    /// Certificate pinning and monitoring
    #[serde(default)]
    pub pinning: PinningConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file or use defaults
    ///
    /// Priority order:
    /// 1. Explicitly provided path
    /// 2. ferrous-doh.toml in current directory
    /// 3. /etc/ferrous-doh/config.toml
    /// 4. Default configuration
    pub fn load(path: Option<&str>, cli_overrides: CliOverrides) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = path {
            Self::from_file(path)?
        } else if let Some(path) = Self::get_config_path() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };

        config.apply_cli_overrides(cli_overrides);
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_string(), e.to_string()))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    fn apply_cli_overrides(&mut self, overrides: CliOverrides) {
        if let Some(endpoint) = overrides.endpoint {
            self.doh.endpoint = endpoint;
        }
        if let Some(device) = overrides.device {
            self.tunnel.device = Some(device);
        }
        if let Some(path) = overrides.pin_store_path {
            self.pinning.store_path = path;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_endpoint(&self.doh.endpoint)?;

        if self.doh.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "DoH timeout cannot be 0".to_string(),
            ));
        }

        if self.tunnel.prefix_len > 32 {
            return Err(ConfigError::Validation(format!(
                "Invalid tunnel prefix length /{}",
                self.tunnel.prefix_len
            )));
        }

        if self.tunnel.address == self.tunnel.resolver_address {
            return Err(ConfigError::Validation(
                "Tunnel address and resolver address must differ".to_string(),
            ));
        }

        if self.tunnel.mtu < 576 {
            return Err(ConfigError::Validation(format!(
                "Tunnel MTU {} is below the IPv4 minimum of 576",
                self.tunnel.mtu
            )));
        }

        if self.pinning.max_trust_failures == 0 {
            return Err(ConfigError::Validation(
                "pinning.max_trust_failures must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Resolves the per-session snapshot. Called once for every session start.
    pub fn resolver_config(&self) -> Result<ResolverConfig, ConfigError> {
        self.validate()?;
        let (hostname, port) = parse_endpoint(&self.doh.endpoint)?;

        let dns_servers = [&self.tunnel.primary_dns, &self.tunnel.secondary_dns]
            .into_iter()
            .flatten()
            .cloned()
            .collect();

        Ok(ResolverConfig {
            endpoint: self.doh.endpoint.as_str().into(),
            hostname,
            port,
            timeout: self.doh.timeout(),
            bootstrap_addresses: self.doh.bootstrap_addresses.clone(),
            verify_chain: self.doh.verify_chain,
            interface: InterfaceConfig {
                session_name: self.tunnel.session_name.clone(),
                address: self.tunnel.address,
                prefix_len: self.tunnel.prefix_len,
                resolver_address: self.tunnel.resolver_address,
                mtu: self.tunnel.mtu,
                dns_servers,
                full_capture: self.tunnel.full_capture,
                device: self.tunnel.device.clone(),
            },
            block_list: self.leak_protection.block_list(),
            unmatched_policy: self.tunnel.unmatched_policy,
            verify_on_start: self.pinning.verify_on_start,
            max_trust_failures: self.pinning.max_trust_failures,
            monitor_interval: self.pinning.monitor_interval(),
            expiry_warning: self.pinning.expiry_warning(),
        })
    }

    /// Get the path to the configuration file being used
    pub fn get_config_path() -> Option<String> {
        [LOCAL_CONFIG_PATH, SYSTEM_CONFIG_PATH]
            .into_iter()
            .find(|p| std::path::Path::new(p).exists())
            .map(str::to_string)
    }
}

/// Command-line overrides for configuration
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub endpoint: Option<String>,
    pub device: Option<String>,
    pub pin_store_path: Option<String>,
    pub log_level: Option<String>,
}
