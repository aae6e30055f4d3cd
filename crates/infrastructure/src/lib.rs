//! Ferrous DoH Infrastructure Layer
pub mod doh;
pub mod events;
pub mod repositories;
pub mod system;
pub mod tls;
pub mod tunnel;
