mod certificate_monitor;
mod certificate_status;
mod event_bus;
mod pin_validator;

pub use certificate_monitor::CertificateMonitor;
pub use certificate_status::{classify_certificate, CertificateStatusTracker};
pub use event_bus::{ListenerId, SessionEventBus};
pub use pin_validator::CertificatePinValidator;
