//! Shopify webhook signature verification.
//!
//! Shopify signs every delivery with `X-Shopify-Hmac-Sha256`, the
//! base64-encoded HMAC-SHA256 of the raw request body under the app's
//! shared secret. Verification must run on the exact bytes received,
//! before any JSON parsing.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Check a delivery's signature against the shared webhook secret.
///
/// Comparison happens inside `verify_slice`, which is constant-time.
/// Any malformed input (undecodable base64, wrong length) fails closed.
#[must_use]
pub fn verify_signature(secret: &SecretString, body: &[u8], provided: &str) -> bool {
    let Ok(signature) = BASE64.decode(provided) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.expose_secret().as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&signature).is_ok()
}

/// Compute the signature Shopify would send for a body.
///
/// Used by integration tests to forge valid deliveries.
#[must_use]
pub fn sign_payload(secret: &SecretString, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
        .expect("HMAC accepts any key length");
    mac.update(body);
    BASE64.encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret() -> SecretString {
        SecretString::from("shpss_test_webhook_secret")
    }

    #[test]
    fn valid_signature_is_accepted() {
        let body = br#"{"id":5001234,"total_price":"149.99"}"#;
        let signature = sign_payload(&secret(), body);
        assert!(verify_signature(&secret(), body, &signature));
    }

    #[test]
    fn tampered_body_is_rejected() {
        let body = br#"{"id":5001234,"total_price":"149.99"}"#;
        let signature = sign_payload(&secret(), body);
        let tampered = br#"{"id":5001234,"total_price":"9149.99"}"#;
        assert!(!verify_signature(&secret(), tampered, &signature));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let body = b"payload";
        let signature = sign_payload(&secret(), body);
        let other = SecretString::from("shpss_other_secret");
        assert!(!verify_signature(&other, body, &signature));
    }

    #[test]
    fn undecodable_base64_is_rejected() {
        assert!(!verify_signature(&secret(), b"payload", "!!! not base64 !!!"));
    }

    #[test]
    fn empty_signature_is_rejected() {
        assert!(!verify_signature(&secret(), b"payload", ""));
    }
}
