//! Bearer tokens. Only the SHA-256 digest is ever stored.

use rand::RngCore;
use sha2::{Digest, Sha256};

const TOKEN_PREFIX: &str = "cq_";
const TOKEN_BYTES: usize = 32;

pub fn generate_token<R: RngCore + ?Sized>(rng: &mut R) -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rng.fill_bytes(&mut bytes);
    format!("{TOKEN_PREFIX}{}", hex(&bytes))
}

pub fn hash_token(token: &str) -> String {
    let digest = Sha256::digest(token.trim().as_bytes());
    hex(&digest)
}

/// Extracts the token from an `Authorization` header value.
pub fn parse_bearer(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
