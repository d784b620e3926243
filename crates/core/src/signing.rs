//! Webhook HMAC signing utilities.
//!
//! This module lives in `core` (zero internal deps) so both the events
//! crate and any future CLI tooling can verify or produce signatures.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the payload signature on webhook deliveries.
pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

/// Compute an HMAC-SHA256 signature for a webhook payload.
///
/// The signature is computed over the exact serialized payload bytes
/// that go on the wire, so receivers can verify integrity with a plain
/// recompute-and-compare. Returns the hex-encoded digest.
pub fn compute_webhook_hmac(secret: &str, payload: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

// ---------------------------------------------------------------------------
// hex encoding helper (no extra dep)
// ---------------------------------------------------------------------------

mod hex {
    /// Encode bytes as a lowercase hex string.
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes
            .as_ref()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector() {
        // HMAC-SHA256("test-secret", '{"hello":"world"}')
        let sig = compute_webhook_hmac("test-secret", br#"{"hello":"world"}"#);
        assert_eq!(
            sig,
            "84cc33df716ed0b0598f07437c94069ace3730358778a592bd6bbd1423d111f3"
        );
    }

    #[test]
    fn empty_key_and_message() {
        let sig = compute_webhook_hmac("", b"");
        assert_eq!(
            sig,
            "b613679a0814d9ec772f95d778c35fc5ff1697c493715653c6c712144292c5ad"
        );
    }

    #[test]
    fn signature_depends_on_payload_bytes() {
        let a = compute_webhook_hmac("secret", b"payload-a");
        let b = compute_webhook_hmac("secret", b"payload-b");
        assert_ne!(a, b);
    }

    #[test]
    fn signature_is_lowercase_hex() {
        let sig = compute_webhook_hmac("secret", b"payload");
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
