#![allow(dead_code)]
pub mod doh_server_mock;

pub use doh_server_mock::{MockDohServer, MockReply, TEST_HOSTNAME};

use ferrous_doh_application::ports::PinStore;
use ferrous_doh_application::services::{
    CertificatePinValidator, CertificateStatusTracker, SessionEventBus,
};
use ferrous_doh_domain::{pin_key, Config, ResolverConfig};
use std::net::{IpAddr, Ipv4Addr};
use ferrous_doh_infrastructure::repositories::FilePinStore;
use std::sync::Arc;
use tempfile::TempDir;

/// Session config pointing at `server`, reached through its loopback
/// address without chain validation.
pub fn resolver_config_for(server: &MockDohServer) -> ResolverConfig {
    loopback_config(server.addr().port())
}

pub fn loopback_config(port: u16) -> ResolverConfig {
    let mut config = Config::default();
    config.doh.endpoint = format!("https://{}:{}/dns-query", TEST_HOSTNAME, port);
    config.doh.bootstrap_addresses = vec![IpAddr::V4(Ipv4Addr::LOCALHOST)];
    config.doh.verify_chain = false;
    config.doh.timeout_secs = 5;
    config.resolver_config().unwrap()
}

pub struct PinFixture {
    pub dir: TempDir,
    pub store: Arc<FilePinStore>,
    pub validator: CertificatePinValidator,
}

impl PinFixture {
    pub fn store_pin(&self, fingerprint: &str) {
        self.store.put(&pin_key(TEST_HOSTNAME), fingerprint).unwrap();
    }
}

/// A loopback port with nothing listening on it.
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

pub fn pin_fixture() -> PinFixture {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FilePinStore::open(dir.path().join("pins.toml")).unwrap());
    let validator = CertificatePinValidator::new(store.clone());
    PinFixture {
        dir,
        store,
        validator,
    }
}

pub fn tracker() -> Arc<CertificateStatusTracker> {
    Arc::new(CertificateStatusTracker::new(Arc::new(SessionEventBus::new())))
}
