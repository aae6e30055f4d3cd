pub mod socket_protect;

pub use socket_protect::{CallbackProtector, FwmarkProtector, NoopProtector};
