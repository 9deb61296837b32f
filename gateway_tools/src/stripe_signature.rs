//! Stripe webhook signatures.
//!
//! Stripe signs `"{timestamp}.{raw body}"` with HMAC-SHA256 using the endpoint's signing secret and sends the result in
//! the `Stripe-Signature` header: `t=1700000000,v1=5257a8...,v0=...`. More than one `v1` entry can be present while a
//! secret is being rolled; any one of them matching is enough.
use hmac::{Hmac, Mac};
use log::*;
use sha2::Sha256;
use thiserror::Error;

pub const STRIPE_SIGNATURE_HEADER: &str = "Stripe-Signature";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("The signature header is malformed: {0}")]
    Malformed(String),
    #[error("The signature timestamp is outside the tolerance window")]
    Expired,
    #[error("No signature matches the payload")]
    Mismatch,
    #[error("The signing secret cannot be used as an HMAC key")]
    InvalidKey,
}

pub fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String, SignatureError> {
    let mut mac = mac_for(secret, timestamp)?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn mac_for(secret: &str, timestamp: i64) -> Result<HmacSha256, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::InvalidKey)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    Ok(mac)
}

/// Builds a header value the way Stripe does. Handy for tests and local tooling.
pub fn signature_header(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String, SignatureError> {
    Ok(format!("t={timestamp},v1={}", compute_signature(secret, timestamp, payload)?))
}

/// Verifies a `Stripe-Signature` header against the raw request body.
///
/// `now` is the current unix time in seconds. The comparison of the MAC is constant-time.
pub fn verify_signature(
    header: &str,
    payload: &[u8],
    secret: &str,
    tolerance: i64,
    now: i64,
) -> Result<(), SignatureError> {
    if secret.is_empty() {
        return Err(SignatureError::InvalidKey);
    }
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            return Err(SignatureError::Malformed(format!("'{part}' is not a key=value pair")));
        };
        match key {
            "t" => {
                let ts = value.parse::<i64>().map_err(|e| SignatureError::Malformed(format!("bad timestamp: {e}")))?;
                timestamp = Some(ts);
            },
            "v1" => signatures.push(value),
            _ => trace!("🔐️ Ignoring signature scheme {key}"),
        }
    }
    let timestamp = timestamp.ok_or_else(|| SignatureError::Malformed("no timestamp".into()))?;
    if signatures.is_empty() {
        return Err(SignatureError::Malformed("no v1 signature".into()));
    }
    if (now - timestamp).abs() > tolerance {
        return Err(SignatureError::Expired);
    }
    let mut matched = false;
    for expected in signatures.iter().filter_map(|s| hex::decode(s).ok()) {
        let mut mac = mac_for(secret, timestamp)?;
        mac.update(payload);
        if mac.verify_slice(&expected).is_ok() {
            matched = true;
            break;
        }
    }
    if matched {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const SECRET: &str = "whsec_test_secret";
    const BODY: &[u8] = br#"{"id":"evt_1","type":"payment_intent.succeeded"}"#;

    #[test]
    fn valid_signature() {
        let header = signature_header(SECRET, 1_700_000_000, BODY).unwrap();
        assert_eq!(verify_signature(&header, BODY, SECRET, 300, 1_700_000_100), Ok(()));
    }

    #[test]
    fn any_v1_entry_may_match() {
        let good = compute_signature(SECRET, 1_700_000_000, BODY).unwrap();
        let header = format!("t=1700000000,v1={},v1={good},v0=abc", "00".repeat(32));
        assert_eq!(verify_signature(&header, BODY, SECRET, 300, 1_700_000_000), Ok(()));
    }

    #[test]
    fn tampered_payloads_fail() {
        let header = signature_header(SECRET, 1_700_000_000, BODY).unwrap();
        let tampered = br#"{"id":"evt_1","type":"payment_intent.canceled"}"#;
        assert_eq!(verify_signature(&header, tampered, SECRET, 300, 1_700_000_000), Err(SignatureError::Mismatch));
        assert_eq!(verify_signature(&header, BODY, "whsec_other", 300, 1_700_000_000), Err(SignatureError::Mismatch));
    }

    #[test]
    fn stale_signatures_fail() {
        let header = signature_header(SECRET, 1_700_000_000, BODY).unwrap();
        assert_eq!(verify_signature(&header, BODY, SECRET, 300, 1_700_000_301), Err(SignatureError::Expired));
        assert_eq!(verify_signature(&header, BODY, SECRET, 300, 1_699_999_000), Err(SignatureError::Expired));
    }

    #[test]
    fn malformed_headers_fail() {
        for header in ["", "t=abc,v1=00", "v1=00", "t=1700000000", "garbage"] {
            assert!(
                matches!(verify_signature(header, BODY, SECRET, 300, 1_700_000_000), Err(SignatureError::Malformed(_))),
                "{header}"
            );
        }
    }

    #[test]
    fn empty_secrets_never_verify() {
        let header = signature_header("", 1_700_000_000, BODY).unwrap();
        assert_eq!(verify_signature(&header, BODY, "", 300, 1_700_000_000), Err(SignatureError::InvalidKey));
    }
}
