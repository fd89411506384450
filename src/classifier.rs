//! Outcome classification
//!
//! Maps the raw outcome of a check (transport error text and/or HTTP status)
//! to exactly one [`Classification`]. Error text is matched case-insensitively,
//! first matching family wins.

use crate::types::Classification;

const DNS_SIGNATURES: &[&str] = &["name or service not known", "nodename nor servname", "dns"];
const TIMEOUT_SIGNATURES: &[&str] = &["timed out", "timeout"];
const TLS_SIGNATURES: &[&str] = &["ssl", "tls", "certificate"];

/// Classify a check outcome
pub fn classify(transport_error: Option<&str>, http_status: Option<u16>) -> Classification {
    if let Some(error) = transport_error {
        let error = error.to_lowercase();
        let matches = |signatures: &[&str]| signatures.iter().any(|s| error.contains(s));

        return if matches(DNS_SIGNATURES) {
            Classification::DnsError
        } else if matches(TIMEOUT_SIGNATURES) {
            Classification::Timeout
        } else if matches(TLS_SIGNATURES) {
            Classification::TlsError
        } else {
            Classification::ConnectError
        };
    }

    match http_status {
        None => Classification::ConnectError,
        Some(200..=399) => Classification::Success,
        Some(400..=599) => Classification::HttpError,
        // 1xx and out-of-range codes are not a usable answer either
        Some(_) => Classification::HttpError,
    }
}
