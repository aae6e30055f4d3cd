use ferrous_doh_application::ports::SocketProtector;
use ferrous_doh_application::services::{CertificatePinValidator, SessionEventBus};
use ferrous_doh_application::use_cases::SessionController;
use ferrous_doh_domain::Config;
use ferrous_doh_infrastructure::doh::HttpsDohClientFactory;
use ferrous_doh_infrastructure::repositories::FilePinStore;
use ferrous_doh_infrastructure::system::{FwmarkProtector, NoopProtector};
use ferrous_doh_infrastructure::tunnel::FdTunnelEstablisher;
use std::sync::Arc;
use tracing::info;

pub struct Services {
    pub controller: Arc<SessionController>,
    pub pins: CertificatePinValidator,
    pub protector: Arc<dyn SocketProtector>,
}

impl Services {
    pub fn new(config: &Config, fwmark: Option<u32>) -> anyhow::Result<Self> {
        let store = Arc::new(FilePinStore::open(&config.pinning.store_path)?);
        let pins = CertificatePinValidator::new(store);

        let protector: Arc<dyn SocketProtector> = match fwmark {
            Some(mark) => {
                info!(mark, "Protecting DoH sockets with SO_MARK");
                Arc::new(FwmarkProtector::new(mark))
            }
            None => Arc::new(NoopProtector),
        };

        let clients = Arc::new(HttpsDohClientFactory::new(
            pins.clone(),
            Arc::clone(&protector),
        ));
        let controller = Arc::new(SessionController::new(
            Arc::new(FdTunnelEstablisher::new()),
            clients,
            Arc::new(SessionEventBus::new()),
        ));

        Ok(Self {
            controller,
            pins,
            protector,
        })
    }
}
