use ferrous_doh_application::ports::SessionListener;
use ferrous_doh_domain::{CertificateStatus, SessionEvent, SessionState};
use tracing::{error, info, warn};

/// Logs every session and certificate event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingListener;

impl SessionListener for TracingListener {
    fn on_event(&self, event: &SessionEvent) {
        match event {
            SessionEvent::StateChanged {
                state: SessionState::Error,
                message,
            } => {
                error!(
                    state = %SessionState::Error,
                    message = message.as_deref().unwrap_or("unknown error"),
                    "Session failed"
                );
            }
            SessionEvent::StateChanged { state, .. } => {
                info!(state = %state, "Session state changed");
            }
            SessionEvent::CertificateStatus { hostname, status } => match status {
                CertificateStatus::Invalid | CertificateStatus::Warning => {
                    warn!(hostname = %hostname, status = %status, "Resolver certificate status");
                }
                _ => {
                    info!(hostname = %hostname, status = %status, "Resolver certificate status");
                }
            },
        }
    }
}
