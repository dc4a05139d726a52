//! API key generation and hashing, HMAC signing for webhooks and gateway callbacks.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

pub const API_KEY_PREFIX: &str = "sk_";
pub const WEBHOOK_SECRET_PREFIX: &str = "whsec_";

/// Generates a new API key: `sk_` followed by 32 random bytes as hex.
pub fn generate_api_key() -> String {
    let bytes: [u8; 32] = rand::random();
    format!("{API_KEY_PREFIX}{}", hex::encode(bytes))
}

/// Generates a signing secret for a webhook endpoint.
pub fn generate_webhook_secret() -> String {
    let bytes: [u8; 24] = rand::random();
    format!("{WEBHOOK_SECRET_PREFIX}{}", hex::encode(bytes))
}

/// Hashes an API key using SHA-256.
pub fn hash_api_key(key: &str) -> String {
    let hash = Sha256::digest(key.as_bytes());
    hex::encode(hash)
}

/// Verifies an API key against a stored hash using constant-time comparison.
pub fn verify_api_key(input: &str, stored_hash: &str) -> bool {
    let input_hash = hash_api_key(input);
    input_hash.as_bytes().ct_eq(stored_hash.as_bytes()).into()
}

fn mac(secret: &str) -> Option<HmacSha256> {
    HmacSha256::new_from_slice(secret.as_bytes()).ok()
}

/// Hex HMAC-SHA256 of `payload` keyed by `secret`.
pub fn sign_payload(payload: &[u8], secret: &str) -> String {
    match mac(secret) {
        Some(mut mac) => {
            mac.update(payload);
            hex::encode(mac.finalize().into_bytes())
        }
        None => String::new(),
    }
}

/// Verifies a hex HMAC-SHA256 signature in constant time.
pub fn verify_signature(payload: &[u8], signature: &str, secret: &str) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    let Some(mut mac) = mac(secret) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}

/// The string a gateway signs when a checkout completes.
pub fn checkout_payload(order_id: &str, payment_id: &str) -> String {
    format!("{order_id}|{payment_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_key_hashing() {
        let key = "sk_test_abc123";
        let hash = hash_api_key(key);

        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_api_key(key));
    }

    #[test]
    fn test_api_key_verification() {
        let key = generate_api_key();
        let hash = hash_api_key(&key);

        assert!(verify_api_key(&key, &hash));
        assert!(!verify_api_key("wrong_key", &hash));
    }

    #[test]
    fn test_generated_keys_are_unique_and_prefixed() {
        let a = generate_api_key();
        let b = generate_api_key();
        assert!(a.starts_with("sk_"));
        assert_eq!(a.len(), 3 + 64);
        assert_ne!(a, b);
        assert!(generate_webhook_secret().starts_with("whsec_"));
    }

    #[test]
    fn test_webhook_signing() {
        let payload = br#"{"event":"payment.completed"}"#;
        let secret = "webhook_secret_123";

        let signature = sign_payload(payload, secret);
        assert_eq!(signature.len(), 64);
        assert!(verify_signature(payload, &signature, secret));
        assert!(!verify_signature(payload, &signature, "wrong_secret"));
        assert!(!verify_signature(b"tampered", &signature, secret));
        assert!(!verify_signature(payload, "not-hex", secret));
    }

    #[test]
    fn test_known_hmac_vector() {
        // RFC 4231 test case 2
        let signature = sign_payload(b"what do ya want for nothing?", "Jefe");
        assert_eq!(
            signature,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_checkout_payload_format() {
        assert_eq!(checkout_payload("order_1", "pay_2"), "order_1|pay_2");
    }
}
