pub mod certificate;
pub mod verifier;

pub use certificate::remaining_validity;
pub use verifier::{classify_handshake_error, CertificateObserver, PinMismatch, PinningVerifier};
