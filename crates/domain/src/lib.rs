//! Ferrous DoH Domain Layer
pub mod certificate;
pub mod config;
pub mod dns_message;
pub mod dns_query;
pub mod errors;
pub mod packet;
pub mod session;

pub use certificate::{pin_key, CertificateStatus, Fingerprint, CERT_PIN_PREFIX};
pub use config::{
    CliOverrides, Config, ConfigError, DohConfig, InterfaceConfig, LeakProtectionConfig,
    LoggingConfig, PinningConfig, ResolverConfig, TunnelConfig, UnmatchedPolicy,
};
pub use dns_query::DnsQuery;
pub use errors::{DomainError, PacketError};
pub use packet::{Ipv4Header, UdpHeader, UdpPacket};
pub use session::{SessionEvent, SessionState};
