use std::time::{Duration, SystemTime, UNIX_EPOCH};
use x509_parser::parse_x509_certificate;

/// Time left until `notAfter`, or `None` if the certificate is expired or
/// cannot be parsed.
pub fn remaining_validity(certificate_der: &[u8]) -> Option<Duration> {
    let (_, certificate) = parse_x509_certificate(certificate_der).ok()?;
    let not_after = certificate.validity().not_after.timestamp();
    let now = SystemTime::now().duration_since(UNIX_EPOCH).ok()?.as_secs() as i64;
    u64::try_from(not_after - now).ok().map(Duration::from_secs)
}
