mod doh_resolver;
mod pin_store;
mod session_listener;
mod socket_protector;
mod tunnel_device;

pub use doh_resolver::{DohClient, DohClientFactory, DohResolver, TrustChecker};
pub use pin_store::PinStore;
pub use session_listener::SessionListener;
pub use socket_protector::SocketProtector;
pub use tunnel_device::{TunnelDevice, TunnelEstablisher};
