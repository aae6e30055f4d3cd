use std::fmt;

/// Key-value store prefix for persisted certificate pins.
pub const CERT_PIN_PREFIX: &str = "CERT_PIN_";

pub fn pin_key(hostname: &str) -> String {
    format!("{}{}", CERT_PIN_PREFIX, hostname)
}

/// SHA-256 certificate fingerprint as colon-separated uppercase hex pairs,
/// e.g. `AB:01:...`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn from_digest(digest: &[u8]) -> Self {
        let hex = digest
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(":");
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compares against a stored pin ignoring case and separators, so pins
    /// written as `ab01...` or `AB-01-...` still match.
    pub fn matches(&self, stored: &str) -> bool {
        normalize(&self.0) == normalize(stored)
    }
}

fn normalize(fingerprint: &str) -> String {
    fingerprint
        .chars()
        .filter(char::is_ascii_hexdigit)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trust status of the resolver certificate as shown to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CertificateStatus {
    #[default]
    NotVerified,
    Valid,
    Invalid,
    /// Certificate close to expiry, or the probe could not complete.
    Warning,
}

impl CertificateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotVerified => "not_verified",
            Self::Valid => "valid",
            Self::Invalid => "invalid",
            Self::Warning => "warning",
        }
    }
}

impl fmt::Display for CertificateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
