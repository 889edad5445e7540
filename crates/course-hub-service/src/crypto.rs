//! HMAC helpers for webhook signatures.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn mac_for(secret: &str, message: &str) -> HmacSha256 {
    // INVARIANT: HMAC accepts keys of any length (RFC 2104), so
    // `new_from_slice` cannot fail for SHA-256.
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC-SHA256 accepts any key size");
    mac.update(message.as_bytes());
    mac
}

/// Compute HMAC-SHA256 of `message` and hex-encode it (64 characters).
#[must_use]
pub fn hmac_sha256_hex(secret: &str, message: &str) -> String {
    hex::encode(mac_for(secret, message).finalize().into_bytes())
}

/// Check a hex-encoded HMAC-SHA256 signature in constant time.
///
/// Malformed hex is treated as a mismatch.
#[must_use]
pub fn verify_hmac_sha256_hex(secret: &str, message: &str, signature_hex: &str) -> bool {
    let Ok(signature) = hex::decode(signature_hex) else {
        return false;
    };
    mac_for(secret, message).verify_slice(&signature).is_ok()
}
