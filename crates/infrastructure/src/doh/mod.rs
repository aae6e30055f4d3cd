mod client_factory;
mod connector;
mod forwarder;
mod probe;

pub use client_factory::HttpsDohClientFactory;
pub use connector::{resolve_endpoint, DohConnector};
pub use forwarder::{DohForwarder, DNS_MESSAGE_CONTENT_TYPE};
pub use probe::TlsCertificateProbe;
