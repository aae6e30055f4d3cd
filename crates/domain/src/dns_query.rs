use std::sync::Arc;

/// A query intercepted from the tunnel. Only A/IN questions are answered, so
/// the record type and class are implicit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsQuery {
    pub id: u16,
    pub domain: Arc<str>,
}

impl DnsQuery {
    pub fn new(id: u16, domain: impl Into<Arc<str>>) -> Self {
        Self {
            id,
            domain: domain.into(),
        }
    }
}
