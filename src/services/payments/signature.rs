use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Stripe rejects events signed more than five minutes ago by default.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("missing or malformed signature header")]
    Malformed,

    #[error("signature timestamp outside tolerance")]
    Expired,

    #[error("signature does not match payload")]
    Mismatch,
}

fn sign(secret: &str, timestamp: i64, payload: &[u8]) -> Option<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);

    let digest = mac.finalize().into_bytes();
    Some(digest.iter().map(|b| format!("{b:02x}")).collect())
}

/// Checks a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=...]`) against
/// the raw request body.
pub fn verify_stripe_signature(
    secret: &str,
    header: &str,
    payload: &[u8],
    now: i64,
    tolerance_secs: i64,
) -> Result<(), SignatureError> {
    let mut timestamp = None;
    let mut candidates = vec![];
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if candidates.is_empty() {
        return Err(SignatureError::Malformed);
    }
    if (now - timestamp).abs() > tolerance_secs {
        return Err(SignatureError::Expired);
    }

    let expected = sign(secret, timestamp, payload).ok_or(SignatureError::Malformed)?;
    if candidates
        .iter()
        .any(|c| constant_time_eq::constant_time_eq(c.as_bytes(), expected.as_bytes()))
    {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Builds a header value the way Stripe does. Used by tests and local tooling.
pub fn stripe_signature_header(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let signature = sign(secret, timestamp, payload).unwrap_or_default();
    format!("t={timestamp},v1={signature}")
}
