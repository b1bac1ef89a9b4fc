//! Personal access token helpers
//!
//! A token is 32 random bytes rendered as lowercase hex. Only its SHA-256
//! digest is ever stored.

use argon2::password_hash::rand_core::{OsRng, RngCore};
use data_encoding::HEXLOWER;
use sha2::{Digest, Sha256};

const TOKEN_BYTES: usize = 32;

/// Name given to tokens issued by login and registration
pub const AUTH_TOKEN_NAME: &str = "auth_token";

/// Generate a new plain token
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    HEXLOWER.encode(&bytes)
}

/// Hash a plain token for storage and lookup
pub fn hash_token(token: &str) -> String {
    HEXLOWER.encode(&Sha256::digest(token.as_bytes()))
}

/// Pull the token out of an `Authorization: Bearer <token>` header value
pub fn parse_bearer(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_generated_token_shape() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(token, generate_token());
    }

    #[test]
    fn test_hash_token_known_value() {
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_parse_bearer() {
        assert_eq!(parse_bearer("Bearer abc123"), Some("abc123"));
        assert_eq!(parse_bearer("bearer  abc123 "), Some("abc123"));
        assert_eq!(parse_bearer("Basic abc123"), None);
        assert_eq!(parse_bearer("Bearer "), None);
        assert_eq!(parse_bearer("abc123"), None);
    }

    proptest! {
        #[test]
        fn hash_is_deterministic_hex(token in "[a-f0-9]{1,64}") {
            let hash = hash_token(&token);
            prop_assert_eq!(hash.len(), 64);
            prop_assert_eq!(&hash, &hash_token(&token));
            prop_assert_ne!(hash, token);
        }
    }
}
