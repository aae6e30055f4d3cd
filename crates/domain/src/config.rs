pub mod doh;
pub mod errors;
pub mod leak_protection;
pub mod logging;
pub mod pinning;
pub mod resolver;
pub mod root;
pub mod tunnel;

pub use doh::DohConfig;
pub use errors::ConfigError;
pub use leak_protection::LeakProtectionConfig;
pub use logging::LoggingConfig;
pub use pinning::PinningConfig;
pub use resolver::{InterfaceConfig, ResolverConfig};
pub use root::{CliOverrides, Config};
pub use tunnel::{TunnelConfig, UnmatchedPolicy};
