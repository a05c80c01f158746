//! HMAC-SHA256 helpers for gateway signatures.
//!
//! Both signature schemes the gateway uses are hex-encoded HMAC-SHA256
//! digests: checkout signatures sign `"{order_id}|{payment_id}"`, webhook
//! signatures sign the raw request body bytes. Comparison is constant-time.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Compute the hex-encoded HMAC-SHA256 of `payload` under `secret`.
pub fn compute_hmac(secret: &str, payload: &[u8]) -> Result<String, anyhow::Error> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("Invalid key length: {}", e))?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify a hex-encoded HMAC-SHA256 signature in constant time.
pub fn verify_hmac(secret: &str, payload: &[u8], signature: &str) -> Result<bool, anyhow::Error> {
    let expected = compute_hmac(secret, payload)?;

    let expected_bytes = expected.as_bytes();
    let signature_bytes = signature.as_bytes();
    if expected_bytes.len() != signature_bytes.len() {
        return Ok(false);
    }

    Ok(expected_bytes.ct_eq(signature_bytes).into())
}

/// Compute the checkout signature over `"{order_id}|{payment_id}"`.
pub fn payment_signature_payload(gateway_order_id: &str, gateway_payment_id: &str) -> String {
    format!("{}|{}", gateway_order_id, gateway_payment_id)
}
