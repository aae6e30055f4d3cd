use ferrous_doh_domain::DomainError;

/// Key-value persistence for certificate pins (`CERT_PIN_<host>` keys).
///
/// Synchronous on purpose: it is read from inside the TLS certificate
/// verification callback.
pub trait PinStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, DomainError>;
    fn put(&self, key: &str, value: &str) -> Result<(), DomainError>;
    /// Returns whether a value was present.
    fn remove(&self, key: &str) -> Result<bool, DomainError>;
}
