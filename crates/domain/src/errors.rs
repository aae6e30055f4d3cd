use thiserror::Error;

/// Decoding failures for raw tunnel packets and DNS payloads.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    #[error("Packet truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("Not an IPv4 packet (version {0})")]
    NotIpv4(u8),

    #[error("Invalid IPv4 header length: {0}")]
    BadHeaderLength(usize),

    #[error("Malformed DNS message: {0}")]
    MalformedDns(String),

    #[error("Packet of {0} bytes exceeds the IPv4 maximum")]
    Oversized(usize),
}

impl PacketError {
    pub fn truncated(needed: usize, available: usize) -> Self {
        Self::Truncated { needed, available }
    }

    pub fn is_dns(&self) -> bool {
        matches!(self, Self::MalformedDns(_))
    }
}

#[derive(Error, Debug, Clone)]
pub enum DomainError {
    #[error("Invalid DoH endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("DNS resolution failed: {0}")]
    ResolutionFailed(String),

    #[error("Transport timeout connecting to {server}")]
    TransportTimeout { server: String },

    #[error("Certificate pin mismatch for {hostname}")]
    TrustFailure { hostname: String },

    #[error("Tunnel device error: {0}")]
    DeviceFailure(String),

    #[error("Failed to establish tunnel: {0}")]
    TunnelEstablish(String),

    #[error("Pin store error: {0}")]
    PinStore(String),

    #[error("Invalid session state: {0}")]
    InvalidState(String),

    #[error(transparent)]
    Packet(#[from] PacketError),
}

impl DomainError {
    pub fn is_trust_failure(&self) -> bool {
        matches!(self, Self::TrustFailure { .. })
    }
}
