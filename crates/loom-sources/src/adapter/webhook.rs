//! Webhook signature verification (§4.11), grounded on the HMAC-SHA256
//! scheme GitHub and similar platforms use: `sha256=<hex digest>` over the
//! raw request body, keyed by a shared secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// Verifies `signature` (expected form `sha256=<hex>`) against `payload`
/// using `secret`. A malformed signature or HMAC key failure is treated
/// as a verification failure, not an error.
pub fn verify_signature(secret: &str, payload: &[u8], signature: &str) -> bool {
    let Some(provided) = signature.strip_prefix("sha256=") else {
        debug!("webhook signature missing sha256= prefix");
        return false;
    };

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(error) => {
            debug!(%error, "failed to initialize HMAC with configured secret");
            return false;
        }
    };
    mac.update(payload);
    let computed = hex::encode(mac.finalize().into_bytes());

    computed == provided
}
