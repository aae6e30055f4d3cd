use ferrous_doh_domain::{CertificateStatus, DomainError, ResolverConfig, SessionState};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::tunnel_session::TunnelSession;
use crate::ports::{DohClient, DohClientFactory, SessionListener, TunnelEstablisher};
use crate::services::{
    CertificateMonitor, CertificateStatusTracker, ListenerId, SessionEventBus,
};

struct RunningSession {
    session: Arc<TunnelSession>,
    read_loop: JoinHandle<()>,
    monitor: Option<JoinHandle<()>>,
}

/// Accepts start / stop / reload commands from the host. At most one
/// [`TunnelSession`] exists at a time.
pub struct SessionController {
    establisher: Arc<dyn TunnelEstablisher>,
    clients: Arc<dyn DohClientFactory>,
    bus: Arc<SessionEventBus>,
    certificates: Arc<CertificateStatusTracker>,
    running: Mutex<Option<RunningSession>>,
}

impl SessionController {
    pub fn new(
        establisher: Arc<dyn TunnelEstablisher>,
        clients: Arc<dyn DohClientFactory>,
        bus: Arc<SessionEventBus>,
    ) -> Self {
        Self {
            certificates: Arc::new(CertificateStatusTracker::new(Arc::clone(&bus))),
            establisher,
            clients,
            bus,
            running: Mutex::new(None),
        }
    }

    pub fn current_state(&self) -> SessionState {
        self.bus.current_state()
    }

    pub fn certificates(&self) -> &Arc<CertificateStatusTracker> {
        &self.certificates
    }

    pub fn add_listener(&self, listener: Arc<dyn SessionListener>) -> ListenerId {
        self.bus.add_listener(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.bus.remove_listener(id)
    }

    pub async fn is_running(&self) -> bool {
        self.running
            .lock()
            .await
            .as_ref()
            .is_some_and(|r| r.session.is_running())
    }

    /// DISCONNECTED -> CONNECTING -> CONNECTED. Any failure moves to ERROR
    /// and releases whatever was created.
    pub async fn start(&self, config: ResolverConfig) -> Result<(), DomainError> {
        let mut running = self.running.lock().await;
        if running.is_some() || !self.bus.transition(SessionState::Connecting, None) {
            return Err(DomainError::InvalidState(format!(
                "cannot start a session while {}",
                self.bus.current_state()
            )));
        }

        info!(
            endpoint = %config.endpoint,
            session = %config.interface.session_name,
            "Starting tunnel session"
        );

        match self.launch(config).await {
            Ok(session) => {
                *running = Some(session);
                Ok(())
            }
            Err(e) => {
                self.bus
                    .transition(SessionState::Error, Some(e.to_string()));
                Err(e)
            }
        }
    }

    async fn launch(&self, config: ResolverConfig) -> Result<RunningSession, DomainError> {
        let config = Arc::new(config);
        let client = self
            .clients
            .create(&config, Arc::clone(&self.certificates))
            .await?;
        let device = self.establisher.establish(&config.interface).await?;

        if config.verify_on_start {
            if let Err(e) = self.verify_trust(&config, &client).await {
                device.close();
                return Err(e);
            }
        }

        if !self.bus.transition(SessionState::Connected, None) {
            device.close();
            return Err(DomainError::InvalidState(
                "session left CONNECTING before the device was ready".to_string(),
            ));
        }

        let cancel = CancellationToken::new();
        let session = Arc::new(TunnelSession::new(
            Arc::clone(&config),
            device,
            Arc::clone(&client.resolver),
            Arc::clone(&self.bus),
            Arc::clone(&self.certificates),
            cancel.clone(),
        ));
        let read_loop = tokio::spawn(Arc::clone(&session).run());

        let monitor = config.monitor_interval.map(|interval| {
            let monitor = CertificateMonitor::new(
                Arc::clone(&client.trust_checker),
                Arc::clone(&self.certificates),
                Arc::clone(&config.hostname),
                interval,
            );
            tokio::spawn(monitor.run(cancel.child_token()))
        });

        info!("Tunnel session connected");
        Ok(RunningSession {
            session,
            read_loop,
            monitor,
        })
    }

    async fn verify_trust(
        &self,
        config: &ResolverConfig,
        client: &DohClient,
    ) -> Result<(), DomainError> {
        let hostname = &config.hostname;
        match client.trust_checker.check().await {
            Ok(CertificateStatus::Invalid) => {
                self.certificates.report(hostname, CertificateStatus::Invalid);
                Err(DomainError::TrustFailure {
                    hostname: hostname.to_string(),
                })
            }
            Err(e) if e.is_trust_failure() => {
                self.certificates.report(hostname, CertificateStatus::Invalid);
                Err(e)
            }
            Ok(status) => {
                self.certificates.report(hostname, status);
                Ok(())
            }
            Err(e) => {
                // Unreachable resolver is not a trust verdict.
                warn!(hostname = %hostname, error = %e, "Initial certificate check failed");
                self.certificates.report(hostname, CertificateStatus::Warning);
                Ok(())
            }
        }
    }

    /// Idempotent. Safe from any state; always ends in DISCONNECTED.
    pub async fn stop(&self) {
        let mut running = self.running.lock().await;
        if let Some(RunningSession {
            session,
            read_loop,
            monitor,
        }) = running.take()
        {
            session.shutdown();
            if let Err(e) = read_loop.await {
                warn!(error = %e, "Read loop task ended abnormally");
            }
            if let Some(monitor) = monitor {
                // The probe may still be in flight.
                monitor.abort();
            }
        }
        self.certificates.reset();

        if self.bus.transition(SessionState::Disconnected, None) {
            info!("Tunnel session stopped");
        }
    }

    /// Stops the current session and starts a new one from `config`.
    pub async fn reload_and_restart(&self, config: ResolverConfig) -> Result<(), DomainError> {
        info!("Restarting tunnel session with reloaded configuration");
        self.stop().await;
        self.start(config).await
    }
}
