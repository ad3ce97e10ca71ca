//! Password hashing and session token helpers for the local identity backend.
//!
//! Stored hash format: `pbkdf2-sha256$<rounds>$<salt hex>$<digest hex>`.

use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

const SCHEME: &str = "pbkdf2-sha256";
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;
const TOKEN_LEN: usize = 32;

pub fn hash_password(password: &str, iterations: u32) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let digest = stretch(password.as_bytes(), &salt, iterations);
    format!("{}${}${}${}", SCHEME, iterations, hex::encode(salt), hex::encode(digest))
}

/// Check a password against a stored hash; malformed hashes never match
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut fields = stored.split('$');
    let (Some(scheme), Some(iterations), Some(salt), Some(expected), None) = (
        fields.next(),
        fields.next(),
        fields.next(),
        fields.next(),
        fields.next(),
    ) else {
        return false;
    };

    if scheme != SCHEME {
        return false;
    }
    let (Ok(iterations), Ok(salt), Ok(expected)) =
        (iterations.parse::<u32>(), hex::decode(salt), hex::decode(expected))
    else {
        return false;
    };

    if iterations == 0 {
        return false;
    }
    let actual = stretch(password.as_bytes(), &salt, iterations);
    actual[..].ct_eq(&expected[..]).into()
}

fn stretch(password: &[u8], salt: &[u8], iterations: u32) -> [u8; HASH_LEN] {
    let mut digest = [0u8; HASH_LEN];
    pbkdf2_hmac::<Sha256>(password, salt, iterations.max(1), &mut digest);
    digest
}

/// New random session token (hex, 256 bits)
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Tokens are stored only as digests
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Mask a token for logging (show first 8 chars only)
pub fn mask_token(token: &str) -> String {
    if token.len() > 8 {
        format!("{}...", &token[..8])
    } else {
        "***".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let stored = hash_password("secret1", 1_000);
        assert!(stored.starts_with("pbkdf2-sha256$1000$"));
        assert!(verify_password("secret1", &stored));
        assert!(!verify_password("secret2", &stored));
    }

    #[test]
    fn test_known_pbkdf2_vector() {
        // RFC 7914 section 11, first 32 bytes
        let digest = stretch(b"passwd", b"salt", 1);
        assert_eq!(
            hex::encode(digest),
            "55ac046e56e3089fec1691c22544b605f94185216dde0465e68b9d57c20dacbc"
        );
        let stored = format!("{}$1${}${}", SCHEME, hex::encode(b"salt"), hex::encode(digest));
        assert!(verify_password("passwd", &stored));
    }

    #[test]
    fn test_truncated_digest_never_matches() {
        let stored = hash_password("secret1", 10);
        let truncated = &stored[..stored.len() - 2];
        assert!(!verify_password("secret1", truncated));
    }

    #[test]
    fn test_hashes_are_salted() {
        assert_ne!(hash_password("secret1", 10), hash_password("secret1", 10));
    }

    #[test]
    fn test_malformed_hash_never_matches() {
        assert!(!verify_password("x", ""));
        assert!(!verify_password("x", "md5$1$00$00"));
        assert!(!verify_password("x", "sha256$1$00$00"));
        assert!(!verify_password("x", "pbkdf2-sha256$abc$00$00"));
        assert!(!verify_password("x", "pbkdf2-sha256$0$00$00"));
        assert!(!verify_password("x", "pbkdf2-sha256$1$zz$00"));
        assert!(!verify_password("x", "pbkdf2-sha256$1$00$00$extra"));
    }

    #[test]
    fn test_tokens_are_random_hex() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
        assert_eq!(hash_token(&a), hash_token(&a));
        assert_ne!(hash_token(&a), a);
    }

    #[test]
    fn test_mask_token() {
        assert_eq!(mask_token("short"), "***");
        assert_eq!(mask_token("12345678"), "***");
        assert_eq!(mask_token("1234567890abcdef"), "12345678...");
    }
}
